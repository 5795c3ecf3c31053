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

//! The rendering surface the trigger controller drives.
//!
//! The surface owns presentation only. It is told which notes are playable and
//! which keys are held, and never reports back.

use std::collections::HashSet;
use std::io;

use tracing::warn;

use crate::notes::{KeyId, KeyKind, NoteDefinition};

/// Something that displays the playable keys.
pub trait Surface {
    /// Replaces every displayed key with the given notes, in order. All keys
    /// start inactive.
    fn rebuild(&mut self, notes: &[NoteDefinition]);

    /// Marks a key as held or not held.
    fn set_active(&mut self, key: KeyId, active: bool);
}

/// A surface that displays nothing.
#[derive(Debug, Default)]
pub struct NullSurface {}

impl NullSurface {
    pub fn new() -> NullSurface {
        NullSurface {}
    }
}

impl Surface for NullSurface {
    fn rebuild(&mut self, _: &[NoteDefinition]) {}

    fn set_active(&mut self, _: KeyId, _: bool) {}
}

/// Writes the shortcut listing and key changes to a text stream.
pub struct Terminal<W: io::Write> {
    writer: W,
    active: HashSet<KeyId>,
}

impl<W: io::Write> Terminal<W> {
    pub fn new(writer: W) -> Terminal<W> {
        Terminal {
            writer,
            active: HashSet::new(),
        }
    }

    /// Returns the keys currently marked active.
    pub fn active(&self) -> &HashSet<KeyId> {
        &self.active
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_listing(&mut self, notes: &[NoteDefinition]) -> Result<(), io::Error> {
        writeln!(self.writer, "Keys:")?;
        for note in notes {
            let marker = match note.kind() {
                KeyKind::Natural => ' ',
                KeyKind::Accidental => '#',
            };
            writeln!(
                self.writer,
                "  {} -> {:<4}{} {:.2} Hz",
                note.key(),
                note.name(),
                marker,
                note.frequency()
            )?;
        }
        self.writer.flush()
    }
}

impl<W: io::Write> Surface for Terminal<W> {
    fn rebuild(&mut self, notes: &[NoteDefinition]) {
        self.active.clear();
        if let Err(e) = self.write_listing(notes) {
            warn!(err = %e, "Unable to write key listing");
        }
    }

    fn set_active(&mut self, key: KeyId, active: bool) {
        let changed = if active {
            self.active.insert(key)
        } else {
            self.active.remove(&key)
        };
        if !changed {
            return;
        }

        let symbol = if active { '+' } else { '-' };
        if let Err(e) = writeln!(self.writer, "{}{}", symbol, key).and_then(|_| self.writer.flush()) {
            warn!(err = %e, "Unable to write key state");
        }
    }
}
