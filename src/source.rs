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

//! Voice sources: how a note becomes sound, and how that sound is released.

use std::{error::Error, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::{Engine, Waveform};
use crate::notes::NoteDefinition;
use crate::samples::SampleBank;
use crate::voice::{Voice, VoiceKind};

/// Default length of the release fade.
pub const DEFAULT_RELEASE: Duration = Duration::from_millis(100);

/// Default level the release fade ends at, relative to peak.
pub const DEFAULT_RELEASE_FLOOR: f32 = 0.01;

/// Which voice source new voices are started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundMode {
    #[default]
    Synth,
    Sample,
}

impl FromStr for SoundMode {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        match s.to_lowercase().as_str() {
            "synth" | "synthesis" => Ok(SoundMode::Synth),
            "sample" | "samples" => Ok(SoundMode::Sample),
            _ => Err(format!("Unsupported sound mode: {}", s).into()),
        }
    }
}

impl fmt::Display for SoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundMode::Synth => write!(f, "synth"),
            SoundMode::Sample => write!(f, "sample"),
        }
    }
}

/// Produces a started voice for a note.
pub trait VoiceSource {
    /// Starts a voice for the note. The voice sounds immediately at full level.
    fn start(&self, engine: &dyn Engine, note: &NoteDefinition) -> Voice;
}

/// Starts an oscillator at the note's exact frequency.
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    waveform: Waveform,
}

impl Synthesizer {
    pub fn new(waveform: Waveform) -> Synthesizer {
        Synthesizer { waveform }
    }
}

impl VoiceSource for Synthesizer {
    fn start(&self, engine: &dyn Engine, note: &NoteDefinition) -> Voice {
        let node = engine.create_oscillator(self.waveform, note.frequency());
        Voice::new(note, VoiceKind::Synth, node, engine.current_time())
    }
}

/// Plays the recorded sample for the note's base pitch from its start. Octave
/// variants play the same sample without pitch shifting. Pitches without a sample
/// fall back to synthesis.
pub struct SamplePlayer<'a> {
    bank: &'a SampleBank,
    fallback: Synthesizer,
}

impl<'a> SamplePlayer<'a> {
    pub fn new(bank: &'a SampleBank, fallback: Synthesizer) -> SamplePlayer<'a> {
        SamplePlayer { bank, fallback }
    }
}

impl VoiceSource for SamplePlayer<'_> {
    fn start(&self, engine: &dyn Engine, note: &NoteDefinition) -> Voice {
        match self.bank.get(note.pitch()) {
            Some(buffer) => {
                let node = engine.create_buffer_player(buffer);
                Voice::new(note, VoiceKind::Sample, node, engine.current_time())
            }
            None => {
                debug!(
                    note = note.name(),
                    pitch = note.pitch(),
                    "No sample for pitch, using synthesis"
                );
                self.fallback.start(engine, note)
            }
        }
    }
}

/// The amplitude fade applied when a voice is released. Applies to synthesized and
/// sampled voices alike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReleaseFade {
    duration: Duration,
    floor: f32,
}

impl ReleaseFade {
    /// Creates a new fade. The floor is clamped into (0, 1] since an exponential
    /// ramp cannot reach zero.
    pub fn new(duration: Duration, floor: f32) -> ReleaseFade {
        ReleaseFade {
            duration,
            floor: floor.clamp(f32::MIN_POSITIVE, 1.0),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Starts the fade on the voice's node and schedules the node to stop, and be
    /// freed, at the end of the fade.
    pub fn apply(&self, engine: &dyn Engine, voice: &mut Voice) {
        let stop_at = engine.current_time() + self.duration;
        engine.ramp_gain(voice.node(), 1.0, self.floor, self.duration);
        engine.stop_at(voice.node(), stop_at);
        voice.mark_releasing(stop_at);
    }
}

impl Default for ReleaseFade {
    fn default() -> Self {
        ReleaseFade::new(DEFAULT_RELEASE, DEFAULT_RELEASE_FLOOR)
    }
}

/// Stops the voice immediately, without a fade.
pub fn stop_now(engine: &dyn Engine, voice: &mut Voice) {
    engine.disconnect(voice.node());
    voice.mark_stopped();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mixer::NodeKind;
    use crate::audio::mock;
    use crate::notes::NoteTable;
    use crate::samples::SampleBuffer;
    use crate::voice::VoiceState;

    #[test]
    fn test_synth_starts_at_note_frequency() {
        let engine = mock::Engine::new("mock-engine", 44100, 2);
        let table = NoteTable::builtin();
        let note = table.resolve('a').unwrap();

        let voice = Synthesizer::new(Waveform::Triangle).start(&engine, note);
        assert_eq!(voice.kind(), VoiceKind::Synth);
        assert_eq!(voice.state(), VoiceState::Sounding);

        let nodes = engine.nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, voice.node());
        assert_eq!(
            nodes[0].kind,
            NodeKind::Oscillator {
                waveform: Waveform::Triangle,
                frequency: 261.63
            }
        );
        assert_eq!(nodes[0].gain, 1.0);
    }

    #[test]
    fn test_sample_player_uses_base_pitch() {
        let engine = mock::Engine::new("mock-engine", 44100, 2);
        let mut table = NoteTable::builtin();
        table.select(1).unwrap();

        let mut bank = SampleBank::new();
        bank.insert("C", SampleBuffer::new(vec![0.5; 100], 44100));

        let player = SamplePlayer::new(&bank, Synthesizer::new(Waveform::Sine));
        let voice = player.start(&engine, table.resolve('a').unwrap());
        assert_eq!(voice.kind(), VoiceKind::Sample);
        assert_eq!(voice.note(), "C2");
        assert_eq!(engine.nodes()[0].kind, NodeKind::Buffer { frames: 100 });
    }

    #[test]
    fn test_sample_player_falls_back() {
        let engine = mock::Engine::new("mock-engine", 44100, 2);
        let table = NoteTable::builtin();
        let bank = SampleBank::new();

        let player = SamplePlayer::new(&bank, Synthesizer::new(Waveform::Sine));
        let voice = player.start(&engine, table.resolve('w').unwrap());
        assert_eq!(voice.kind(), VoiceKind::Synth);
        assert_eq!(
            engine.nodes()[0].kind,
            NodeKind::Oscillator {
                waveform: Waveform::Sine,
                frequency: 277.18
            }
        );
    }

    #[test]
    fn test_release_fade_silences_and_frees() {
        let engine = mock::Engine::new("mock-engine", 1000, 1);
        let table = NoteTable::builtin();
        let mut voice = Synthesizer::new(Waveform::Square).start(&engine, table.resolve('a').unwrap());

        engine.render(Duration::from_millis(10));
        ReleaseFade::default().apply(&engine, &mut voice);
        assert_eq!(voice.state(), VoiceState::Releasing);
        assert_eq!(voice.stop_at(), Some(Duration::from_millis(110)));

        let fading = engine.render(Duration::from_millis(50));
        let peak = fading.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak <= 1.0 && peak > 0.01);
        // Halfway through the fade the level is the geometric mean of peak and floor.
        assert!((engine.nodes()[0].gain - 0.1).abs() < 0.01);

        engine.render(Duration::from_millis(60));
        assert!(engine.nodes().is_empty());
        assert!(voice.is_finished(engine.current_time()));
    }

    #[test]
    fn test_stop_now() {
        let engine = mock::Engine::new("mock-engine", 1000, 1);
        let table = NoteTable::builtin();
        let mut voice = Synthesizer::new(Waveform::Sine).start(&engine, table.resolve('a').unwrap());

        stop_now(&engine, &mut voice);
        assert_eq!(voice.state(), VoiceState::Stopped);
        assert!(engine.nodes().is_empty());
    }

    #[test]
    fn test_sound_mode_from_str() {
        assert_eq!(SoundMode::from_str("synth").unwrap(), SoundMode::Synth);
        assert_eq!(SoundMode::from_str("Sample").unwrap(), SoundMode::Sample);
        assert!(SoundMode::from_str("midi").is_err());
    }

    #[test]
    fn test_release_floor_clamped() {
        assert!(ReleaseFade::new(DEFAULT_RELEASE, 0.0).floor() > 0.0);
        assert_eq!(ReleaseFade::new(DEFAULT_RELEASE, 2.0).floor(), 1.0);
    }
}
