// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, span, warn, Level};

use crate::audio::Waveform;
use crate::samples::SampleBank;
use crate::source::SoundMode;
use crate::trigger::{InputEvent, TriggerController};

pub mod keyboard;

/// The number of events that may be queued before senders wait.
const EVENT_BUFFER: usize = 64;

/// Controller events that will trigger behavior in the piano.
#[derive(Debug)]
pub enum Event {
    /// A press or release.
    Input(InputEvent),

    /// Presses the key for the character and releases it after the tap hold.
    Tap(char),

    /// Stops every voice and switches the active row.
    SelectRow(usize),

    /// Sets the master volume.
    SetVolume(f32),

    /// Sets the waveform for new voices.
    SetWaveform(Waveform),

    /// Sets the voice source for new voices.
    SetSoundMode(SoundMode),

    /// Samples finished loading.
    SamplesLoaded(SampleBank),

    /// Redraws the key listing.
    ShowNotes,

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Feeds events from a driver, and from anything else holding a sender, into the
/// piano. The piano is driven from the task that runs the controller.
pub struct Controller {
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    tap_hold: Duration,
}

impl Controller {
    /// Creates a new controller. Taps hold their key for the given duration.
    pub fn new(tap_hold: Duration) -> Controller {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Controller {
            events_tx,
            events_rx,
            tap_hold,
        }
    }

    /// Returns a sender for events from outside the driver.
    pub fn sender(&self) -> Sender<Event> {
        self.events_tx.clone()
    }

    /// Runs until the driver quits, or until every sender is gone.
    pub async fn run(self, piano: &mut TriggerController, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let Controller {
            events_tx,
            mut events_rx,
            tap_hold,
        } = self;
        // Pending tap releases must not keep the channel open on their own.
        let taps_tx = events_tx.downgrade();
        let join_handle = driver.monitor_events(events_tx);

        info!(
            row = piano.table().active_row(),
            waveform = %piano.waveform(),
            sound_mode = %piano.sound_mode(),
            "Controller started."
        );

        while let Some(event) = events_rx.recv().await {
            debug!(event = ?event, "Received event.");

            match event {
                Event::Input(input) => {
                    piano.dispatch(input);
                }
                Event::Tap(input) => {
                    if !piano.dispatch(InputEvent::KeyDown(input)) {
                        continue;
                    }
                    match taps_tx.upgrade() {
                        Some(tx) => {
                            tokio::spawn(async move {
                                tokio::time::sleep(tap_hold).await;
                                // The controller may already be gone.
                                let _ = tx.send(Event::Input(InputEvent::KeyUp(input))).await;
                            });
                        }
                        None => {
                            piano.dispatch(InputEvent::KeyUp(input));
                        }
                    }
                }
                Event::SelectRow(row) => {
                    if let Err(e) = piano.select_row(row) {
                        warn!(err = %e, "Unable to switch rows");
                    }
                }
                Event::SetVolume(volume) => piano.set_volume(volume),
                Event::SetWaveform(waveform) => piano.set_waveform(waveform),
                Event::SetSoundMode(sound_mode) => piano.set_sound_mode(sound_mode),
                Event::SamplesLoaded(samples) => piano.install_samples(samples),
                Event::ShowNotes => piano.redraw(),
                Event::Quit => break,
            }
        }

        info!("Controller closing.");
        match join_handle.await {
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
            Ok(Ok(())) => {}
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::audio::{mock, Engine, Waveform};
    use crate::notes::{KeyId, NoteTable};
    use crate::playback::{EngineFactory, Playback};
    use crate::samples::{SampleBank, SampleBuffer};
    use crate::source::SoundMode;
    use crate::surface::NullSurface;
    use crate::trigger::{InputEvent, KeyState, TriggerController};
    use crate::voice::VoiceKind;

    use super::{Controller, Driver, Event};

    /// A step in a scripted driver.
    enum Step {
        Send(Event),
        Wait(Duration),
    }

    /// Sends a fixed script of events, then stops.
    struct TestDriver {
        script: Mutex<Vec<Step>>,
    }

    impl TestDriver {
        fn new(script: Vec<Step>) -> TestDriver {
            TestDriver {
                script: Mutex::new(script),
            }
        }
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let script = std::mem::take(&mut *self.script.lock());
            tokio::task::spawn_blocking(move || {
                for step in script {
                    match step {
                        Step::Send(event) => events_tx
                            .blocking_send(event)
                            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
                        Step::Wait(duration) => std::thread::sleep(duration),
                    }
                }
                Ok(())
            })
        }
    }

    fn piano() -> (TriggerController, mock::Engine) {
        let engine = mock::Engine::new("mock-engine", 1000, 1);
        let factory: EngineFactory = {
            let engine = engine.clone();
            Box::new(move || -> Result<Box<dyn Engine>, Box<dyn Error>> {
                Ok(Box::new(engine.clone()))
            })
        };
        let piano = TriggerController::new(
            NoteTable::builtin(),
            Playback::new(factory, 0.5),
            Box::new(NullSurface::new()),
        );
        (piano, engine)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() {
        let (mut piano, engine) = piano();
        let mut samples = SampleBank::new();
        samples.insert("C", SampleBuffer::new(vec![0.5; 1000], 1000));

        let driver = Arc::new(TestDriver::new(vec![
            Step::Send(Event::Input(InputEvent::KeyDown('s'))),
            Step::Send(Event::Tap('a')),
            Step::Wait(Duration::from_millis(250)),
            Step::Send(Event::SetVolume(0.25)),
            Step::Send(Event::SetWaveform(Waveform::Sine)),
            Step::Send(Event::SamplesLoaded(samples)),
            Step::Send(Event::SetSoundMode(SoundMode::Sample)),
            Step::Send(Event::Input(InputEvent::KeyDown('A'))),
            Step::Send(Event::SelectRow(7)),
            Step::Send(Event::Quit),
        ]));

        Controller::new(Duration::from_millis(10))
            .run(&mut piano, driver)
            .await;

        // The tapped key was released by the time it was pressed again.
        assert_eq!(piano.registry().releasing_count(), 1);
        assert_eq!(
            piano.registry().get(KeyId::new('a')).unwrap().kind(),
            VoiceKind::Sample
        );
        assert_eq!(
            piano.registry().get(KeyId::new('s')).unwrap().kind(),
            VoiceKind::Synth
        );
        assert_eq!(piano.playback().volume(), 0.25);
        assert_eq!(engine.master_volume(), 0.25);
        assert_eq!(piano.waveform(), Waveform::Sine);
        assert_eq!(piano.table().active_row(), 0);
        assert_eq!(engine.nodes().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_closes_with_driver() {
        let (mut piano, _) = piano();
        let driver = Arc::new(TestDriver::new(vec![
            Step::Send(Event::Tap('a')),
            Step::Send(Event::SelectRow(1)),
            Step::Send(Event::Tap('g')),
        ]));

        let controller = Controller::new(Duration::from_millis(10));
        controller.run(&mut piano, driver).await;

        assert_eq!(piano.table().active_row(), 1);
        assert_eq!(piano.registry().active_count(), 0);
        assert_eq!(piano.key_state(KeyId::new('a')), KeyState::Idle);
        assert_eq!(piano.key_state(KeyId::new('g')), KeyState::Releasing);
    }
}
