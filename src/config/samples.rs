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

use crate::samples::DEFAULT_EXTENSION;

/// Where recorded samples are found.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Samples {
    /// Directory holding one file per base pitch. Relative paths are resolved
    /// against the directory of the config file.
    path: String,

    /// File extension of the samples (default: wav).
    extension: Option<String>,
}

impl Samples {
    pub fn new(path: &str) -> Samples {
        Samples {
            path: path.to_string(),
            extension: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }
}
