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

//! The static note table.
//!
//! A table is made of one or more rows (octaves). Exactly one row is active at a
//! time, and only the active row is consulted when resolving input.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced while building or switching a note table.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NoteTableError {
    #[error("note table must contain at least one row")]
    NoRows,

    #[error("row {0} contains no notes")]
    EmptyRow(usize),

    #[error("row {row}: trigger key '{key}' is bound to both {first} and {second}")]
    DuplicateKey {
        row: usize,
        key: char,
        first: String,
        second: String,
    },

    #[error("note {0}: frequency must be a positive number of Hz")]
    InvalidFrequency(String),

    #[error("note {name}: trigger key '{key}' must be a single character")]
    InvalidKey { name: String, key: String },

    #[error("row {row} is out of range (table has {rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },
}

/// Whether a key is rendered as a natural (white) or accidental (black) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Natural,
    Accidental,
}

impl KeyKind {
    /// Infers the kind from a note name: anything with a sharp is an accidental.
    pub fn from_name(name: &str) -> KeyKind {
        if name.contains('#') {
            KeyKind::Accidental
        } else {
            KeyKind::Natural
        }
    }
}

/// The identity of a held key. Trigger keys are matched case-insensitively, so the
/// identity is always the uppercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(char);

impl KeyId {
    pub fn new(key: char) -> KeyId {
        KeyId(normalize(key))
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize(key: char) -> char {
    // Characters with multi-character uppercase forms keep their original form.
    let mut upper = key.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(c), None) => c,
        _ => key,
    }
}

/// A single playable note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDefinition {
    name: String,
    key: KeyId,
    frequency: f32,
    kind: KeyKind,
}

impl NoteDefinition {
    /// Creates a new note definition. The frequency must be positive and finite.
    pub fn new(
        name: &str,
        key: char,
        frequency: f32,
        kind: KeyKind,
    ) -> Result<NoteDefinition, NoteTableError> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(NoteTableError::InvalidFrequency(name.to_string()));
        }

        Ok(NoteDefinition {
            name: name.to_string(),
            key: KeyId::new(key),
            frequency,
            kind,
        })
    }

    /// Gets the display name of the note, e.g. "C#2".
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the trigger key identity.
    pub fn key(&self) -> KeyId {
        self.key
    }

    /// Gets the frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Gets the visual kind of the key.
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Gets the base pitch name with any octave digits stripped: "C#2" -> "C#".
    /// Sample sets are indexed by this name.
    pub fn pitch(&self) -> &str {
        self.name.trim_end_matches(|c: char| c.is_ascii_digit())
    }
}

impl fmt::Display for NoteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:.2} Hz)", self.name, self.key, self.frequency)
    }
}

/// The note table: rows of notes with a single active row.
#[derive(Debug, Clone)]
pub struct NoteTable {
    rows: Vec<Vec<NoteDefinition>>,
    active: usize,
}

impl NoteTable {
    /// Creates a new note table. Row 0 is active. Every row must be non-empty and
    /// must not bind the same trigger key twice.
    pub fn new(rows: Vec<Vec<NoteDefinition>>) -> Result<NoteTable, NoteTableError> {
        if rows.is_empty() {
            return Err(NoteTableError::NoRows);
        }

        for (index, row) in rows.iter().enumerate() {
            if row.is_empty() {
                return Err(NoteTableError::EmptyRow(index));
            }

            let mut seen: HashSet<KeyId> = HashSet::new();
            for note in row.iter() {
                if !seen.insert(note.key) {
                    let first = row
                        .iter()
                        .find(|n| n.key == note.key)
                        .map(|n| n.name.clone())
                        .unwrap_or_default();
                    return Err(NoteTableError::DuplicateKey {
                        row: index,
                        key: note.key.as_char(),
                        first,
                        second: note.name.clone(),
                    });
                }
            }
        }

        Ok(NoteTable { rows, active: 0 })
    }

    /// The built-in table: two rows of twelve semitones starting at C4 and C5,
    /// bound to the home and upper letter rows of a QWERTY keyboard.
    pub fn builtin() -> NoteTable {
        const KEYS: [char; 12] = ['A', 'W', 'S', 'E', 'D', 'F', 'T', 'G', 'Y', 'H', 'U', 'J'];
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        const ROW_0: [f32; 12] = [
            261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00,
            466.16, 493.88,
        ];
        const ROW_1: [f32; 12] = [
            523.25, 554.37, 587.33, 622.25, 659.25, 698.46, 739.99, 783.99, 830.61, 880.00,
            932.33, 987.77,
        ];

        let row = |frequencies: &[f32; 12], suffix: &str| -> Vec<NoteDefinition> {
            NAMES
                .iter()
                .zip(KEYS.iter())
                .zip(frequencies.iter())
                .map(|((name, key), frequency)| NoteDefinition {
                    name: format!("{}{}", name, suffix),
                    key: KeyId::new(*key),
                    frequency: *frequency,
                    kind: KeyKind::from_name(name),
                })
                .collect()
        };

        NoteTable {
            rows: vec![row(&ROW_0, ""), row(&ROW_1, "2")],
            active: 0,
        }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the index of the active row.
    pub fn active_row(&self) -> usize {
        self.active
    }

    /// Returns the notes of the active row in declaration order.
    pub fn active_set(&self) -> &[NoteDefinition] {
        &self.rows[self.active]
    }

    /// Returns the notes of the given row in declaration order.
    pub fn row(&self, row: usize) -> Option<&[NoteDefinition]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    /// Replaces the active row. Either the whole switch happens or nothing does.
    pub fn select(&mut self, row: usize) -> Result<(), NoteTableError> {
        if row >= self.rows.len() {
            return Err(NoteTableError::RowOutOfRange {
                row,
                rows: self.rows.len(),
            });
        }
        self.active = row;
        Ok(())
    }

    /// Returns every distinct base pitch across all rows, in declaration order.
    pub fn pitches(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .flatten()
            .map(|note| note.pitch())
            .filter(|pitch| seen.insert(*pitch))
            .map(|pitch| pitch.to_string())
            .collect()
    }

    /// Resolves an input character against the active row, ignoring case.
    pub fn resolve(&self, input: char) -> Option<&NoteDefinition> {
        let key = KeyId::new(input);
        self.active_set().iter().find(|note| note.key == key)
    }

    /// Resolves a key identity against the active row.
    pub fn resolve_key(&self, key: KeyId) -> Option<&NoteDefinition> {
        self.active_set().iter().find(|note| note.key == key)
    }

    /// Resolves a rendered element, addressed by its position in the active row.
    pub fn resolve_index(&self, index: usize) -> Option<&NoteDefinition> {
        self.active_set().get(index)
    }
}

impl Default for NoteTable {
    fn default() -> Self {
        NoteTable::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(name: &str, key: char, frequency: f32) -> NoteDefinition {
        NoteDefinition::new(name, key, frequency, KeyKind::from_name(name)).unwrap()
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let table = NoteTable::builtin();

        let lower = table.resolve('a').unwrap();
        let upper = table.resolve('A').unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.name(), "C");
        assert!((lower.frequency() - 261.63).abs() < 0.001);
    }

    #[test]
    fn test_resolve_unknown_key() {
        let table = NoteTable::builtin();
        assert!(table.resolve('z').is_none());
        assert!(table.resolve('1').is_none());
    }

    #[test]
    fn test_every_key_resolves_uniquely() {
        let table = NoteTable::builtin();
        for note in table.active_set() {
            let c = note.key().as_char();
            assert_eq!(table.resolve(c), Some(note));
            assert_eq!(table.resolve(c.to_ascii_lowercase()), Some(note));
        }
    }

    #[test]
    fn test_active_set_order() {
        let table = NoteTable::builtin();
        let names: Vec<&str> = table.active_set().iter().map(|n| n.name()).collect();
        assert_eq!(
            names,
            vec!["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"]
        );
    }

    #[test]
    fn test_select_row() {
        let mut table = NoteTable::builtin();
        table.select(1).unwrap();

        let note = table.resolve('a').unwrap();
        assert_eq!(note.name(), "C2");
        assert!((note.frequency() - 523.25).abs() < 0.001);
        assert_eq!(note.pitch(), "C");

        assert_eq!(
            table.select(2),
            Err(NoteTableError::RowOutOfRange { row: 2, rows: 2 })
        );
        // A failed switch leaves the previous row active.
        assert_eq!(table.active_row(), 1);
    }

    #[test]
    fn test_kinds() {
        let table = NoteTable::builtin();
        assert_eq!(table.resolve('w').unwrap().kind(), KeyKind::Accidental);
        assert_eq!(table.resolve('s').unwrap().kind(), KeyKind::Natural);
    }

    #[test]
    fn test_pitch_strips_octave() {
        assert_eq!(note("C#2", 'W', 554.37).pitch(), "C#");
        assert_eq!(note("A", 'H', 440.0).pitch(), "A");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = NoteTable::new(vec![vec![note("C", 'A', 261.63), note("D", 'a', 293.66)]]);
        assert_eq!(
            result.unwrap_err(),
            NoteTableError::DuplicateKey {
                row: 0,
                key: 'A',
                first: "C".to_string(),
                second: "D".to_string(),
            }
        );
    }

    #[test]
    fn test_rows_may_reuse_keys() {
        let table = NoteTable::new(vec![
            vec![note("C", 'A', 261.63)],
            vec![note("C2", 'A', 523.25)],
        ]);
        assert!(table.is_ok());
    }

    #[test]
    fn test_invalid_tables() {
        assert_eq!(NoteTable::new(vec![]).unwrap_err(), NoteTableError::NoRows);
        assert_eq!(
            NoteTable::new(vec![vec![note("C", 'A', 261.63)], vec![]]).unwrap_err(),
            NoteTableError::EmptyRow(1)
        );
        assert_eq!(
            NoteDefinition::new("C", 'A', 0.0, KeyKind::Natural).unwrap_err(),
            NoteTableError::InvalidFrequency("C".to_string())
        );
        assert!(NoteDefinition::new("C", 'A', f32::NAN, KeyKind::Natural).is_err());
    }

    #[test]
    fn test_resolve_index() {
        let table = NoteTable::builtin();
        assert_eq!(table.resolve_index(1).unwrap().name(), "C#");
        assert!(table.resolve_index(12).is_none());
    }

    #[test]
    fn test_pitches() {
        let pitches = NoteTable::builtin().pitches();
        assert_eq!(pitches.len(), 12);
        assert_eq!(pitches[0], "C");
        assert_eq!(pitches[1], "C#");
        assert_eq!(pitches[11], "B");
    }
}
