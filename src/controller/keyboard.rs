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

use std::error::Error;
use std::io;
use std::str::FromStr;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::audio::Waveform;
use crate::source::SoundMode;
use crate::trigger::InputEvent;

const ROW: &str = "row";
const VOLUME: &str = "volume";
const WAVEFORM: &str = "waveform";
const MODE: &str = "mode";
const NOTES: &str = "notes";
const QUIT: &str = "quit";

/// A driver that plays the piano from lines typed on stdin.
///
/// A line is either a command or a list of key tokens. `+a` presses a key, `-a`
/// releases it, and a bare token taps each of its characters in turn.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and handles one line. Returns false once input is exhausted or the
    /// user quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Keys (+key, -key, keys) or command ({} N, {} X, {} W, {} M, {}, {}): ",
            ROW, VOLUME, WAVEFORM, MODE, NOTES, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let events = match parse(input.trim()) {
            Ok(events) => events,
            Err(e) => {
                warn!(input = input.trim(), err = %e, "Unrecognized input");
                return Ok(true);
            }
        };

        let mut running = true;
        for event in events {
            if matches!(event, Event::Quit) {
                running = false;
            }
            events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(running)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Parses a line into events.
fn parse(line: &str) -> Result<Vec<Event>, Box<dyn Error>> {
    let mut parts = line.split_whitespace();
    let Some(first) = parts.next() else {
        return Ok(Vec::new());
    };
    let argument = parts.next();
    if parts.next().is_some() && is_command(first) {
        return Err(format!("too many arguments for {}", first).into());
    }

    let event = match (first.to_lowercase().as_str(), argument) {
        (QUIT, None) => Event::Quit,
        (NOTES, None) => Event::ShowNotes,
        (ROW, Some(row)) => Event::SelectRow(row.parse()?),
        (VOLUME, Some(volume)) => Event::SetVolume(volume.parse()?),
        (WAVEFORM, Some(waveform)) => Event::SetWaveform(Waveform::from_str(waveform)?),
        (MODE, Some(mode)) => Event::SetSoundMode(SoundMode::from_str(mode)?),
        _ if is_command(first) => return Err(format!("invalid arguments for {}", first).into()),
        _ => return Ok(parse_keys(line)),
    };
    Ok(vec![event])
}

fn is_command(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        ROW | VOLUME | WAVEFORM | MODE | NOTES | QUIT
    )
}

fn parse_keys(line: &str) -> Vec<Event> {
    let mut events = Vec::new();
    for token in line.split_whitespace() {
        if let Some(keys) = token.strip_prefix('+') {
            events.extend(keys.chars().map(|c| Event::Input(InputEvent::KeyDown(c))));
        } else if let Some(keys) = token.strip_prefix('-') {
            events.extend(keys.chars().map(|c| Event::Input(InputEvent::KeyUp(c))));
        } else {
            events.extend(token.chars().map(Event::Tap));
        }
    }
    events
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
