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

use crate::notes::NoteTableError;

/// Typed error for config load/parse failures so callers can distinguish
/// e.g. file-not-found from an invalid note table without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid note table: {0}")]
    Notes(#[from] NoteTableError),

    #[error("Invalid audio config: {0}")]
    Audio(String),

    #[error("Volume must be a number between 0.0 and 1.0")]
    Volume,

    #[error("Invalid duration for {field}: {reason}")]
    Duration { field: &'static str, reason: String },
}
