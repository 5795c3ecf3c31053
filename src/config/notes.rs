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

use serde::{Deserialize, Serialize};

use crate::notes::{KeyKind, NoteDefinition, NoteTableError};

/// A YAML representation of a playable note.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Note {
    /// Display name, e.g. "C#2". Samples are looked up by the name without
    /// octave digits.
    name: String,

    /// The single character that triggers the note.
    key: String,

    /// Frequency in Hz.
    frequency: f32,

    /// Natural or accidental. Inferred from the name when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<KeyKind>,
}

impl Note {
    /// Converts to a validated note definition.
    pub fn to_definition(&self) -> Result<NoteDefinition, NoteTableError> {
        let mut chars = self.key.chars();
        let key = match (chars.next(), chars.next()) {
            (Some(key), None) => key,
            _ => {
                return Err(NoteTableError::InvalidKey {
                    name: self.name.clone(),
                    key: self.key.clone(),
                })
            }
        };

        NoteDefinition::new(
            &self.name,
            key,
            self.frequency,
            self.kind.unwrap_or_else(|| KeyKind::from_name(&self.name)),
        )
    }
}

impl From<&NoteDefinition> for Note {
    fn from(note: &NoteDefinition) -> Self {
        Note {
            name: note.name().to_string(),
            key: note.key().to_string(),
            frequency: note.frequency(),
            kind: Some(note.kind()),
        }
    }
}
