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

//! A keyboard-driven virtual piano.
//!
//! Input events are resolved against a table of notes, and each held key owns at
//! most one voice. Voices are synthesized, or played from recorded samples where
//! one exists for the pitch, and fade out briefly when released.

pub mod audio;
pub mod config;
pub mod controller;
pub mod notes;
pub mod playback;
pub mod samples;
pub mod source;
pub mod surface;
pub mod trigger;
pub mod voice;
