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

use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::audio::Audio;
use super::error::ConfigError;
use super::notes::Note;
use super::samples::Samples;
use crate::audio::Waveform;
use crate::notes::{NoteDefinition, NoteTable, NoteTableError};
use crate::playback::DEFAULT_VOLUME;
use crate::source::{ReleaseFade, SoundMode, DEFAULT_RELEASE, DEFAULT_RELEASE_FLOOR};

/// How long a tapped key is held by default.
pub const DEFAULT_TAP_HOLD: Duration = Duration::from_millis(300);

/// The top level piano configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Piano {
    /// The audio output.
    #[serde(default)]
    audio: Audio,

    /// Master volume between 0.0 and 1.0 (default: 0.5).
    volume: Option<f32>,

    /// Waveform for synthesized voices (default: sawtooth).
    waveform: Option<Waveform>,

    /// Voice source for new voices (default: synth).
    sound_mode: Option<SoundMode>,

    /// The initially active row (default: 0).
    row: Option<usize>,

    /// Length of the release fade, e.g. "100ms".
    release: Option<String>,

    /// Level the release fade ends at, relative to peak (default: 0.01).
    release_floor: Option<f32>,

    /// How long the keyboard driver holds a tapped key, e.g. "300ms".
    tap_hold: Option<String>,

    /// Recorded samples, if any.
    samples: Option<Samples>,

    /// Rows of playable notes. The built-in two rows are used when absent.
    rows: Option<Vec<Vec<Note>>>,
}

impl Piano {
    /// Parse a piano configuration from a file.
    pub fn deserialize(path: &Path) -> Result<Piano, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Piano>()?)
    }

    /// Checks everything that can only be checked after parsing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.sample_rate() == 0 {
            return Err(ConfigError::Audio(
                "sample_rate must be greater than zero".to_string(),
            ));
        }
        if self.volume.is_some_and(|volume| !volume.is_finite()) {
            return Err(ConfigError::Volume);
        }
        self.note_table()?;
        self.release()?;
        self.tap_hold()?;
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the master volume, clamped to 0.0..=1.0. A volume that is not a
    /// number is replaced by the default.
    pub fn volume(&self) -> f32 {
        match self.volume {
            Some(volume) if volume.is_finite() => volume.clamp(0.0, 1.0),
            _ => DEFAULT_VOLUME,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform.unwrap_or_default()
    }

    pub fn sound_mode(&self) -> SoundMode {
        self.sound_mode.unwrap_or_default()
    }

    pub fn row(&self) -> usize {
        self.row.unwrap_or(0)
    }

    /// Returns the length of the release fade.
    pub fn release(&self) -> Result<Duration, ConfigError> {
        parse_duration("release", &self.release, DEFAULT_RELEASE)
    }

    pub fn release_floor(&self) -> f32 {
        self.release_floor.unwrap_or(DEFAULT_RELEASE_FLOOR)
    }

    /// Returns the configured release fade.
    pub fn release_fade(&self) -> Result<ReleaseFade, ConfigError> {
        Ok(ReleaseFade::new(self.release()?, self.release_floor()))
    }

    /// Returns how long a tapped key is held.
    pub fn tap_hold(&self) -> Result<Duration, ConfigError> {
        parse_duration("tap_hold", &self.tap_hold, DEFAULT_TAP_HOLD)
    }

    pub fn samples(&self) -> Option<&Samples> {
        self.samples.as_ref()
    }

    /// Builds the note table with the configured row selected.
    pub fn note_table(&self) -> Result<NoteTable, ConfigError> {
        let mut table = match &self.rows {
            Some(rows) => NoteTable::new(
                rows.iter()
                    .map(|row| row.iter().map(|note| note.to_definition()).collect())
                    .collect::<Result<Vec<Vec<NoteDefinition>>, NoteTableError>>()?,
            )?,
            None => NoteTable::builtin(),
        };
        table.select(self.row())?;
        Ok(table)
    }

    /// Returns the rows in their configuration form.
    pub fn rows(&self) -> Result<Vec<Vec<Note>>, ConfigError> {
        let table = self.note_table()?;
        Ok((0..table.row_count())
            .filter_map(|row| table.row(row))
            .map(|row| row.iter().map(Note::from).collect())
            .collect())
    }
}

fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.clone())
            .map_err(|e| ConfigError::Duration {
                field,
                reason: e.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use config::FileFormat;

    use super::*;
    use crate::notes::{KeyId, KeyKind};

    fn parse(yaml: &str) -> Piano {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let piano = parse("{}");

        assert_eq!(piano.audio().device(), "default");
        assert_eq!(piano.volume(), 0.5);
        assert_eq!(piano.waveform(), Waveform::Sawtooth);
        assert_eq!(piano.sound_mode(), SoundMode::Synth);
        assert_eq!(piano.release().unwrap(), Duration::from_millis(100));
        assert_eq!(piano.release_floor(), 0.01);
        assert_eq!(piano.tap_hold().unwrap(), Duration::from_millis(300));
        assert!(piano.samples().is_none());

        let table = piano.note_table().unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.active_row(), 0);
        assert_eq!(table.resolve('a').unwrap().frequency(), 261.63);
    }

    #[test]
    fn test_custom_rows() {
        let piano = parse(
            r#"
            row: 1
            rows:
              - - name: C
                  key: z
                  frequency: 261.63
              - - name: C5
                  key: z
                  frequency: 523.25
                - name: Db5
                  key: s
                  frequency: 554.37
                  kind: accidental
            "#,
        );

        let table = piano.note_table().unwrap();
        assert_eq!(table.active_row(), 1);
        let note = table.resolve('S').unwrap();
        assert_eq!(note.name(), "Db5");
        assert_eq!(note.kind(), KeyKind::Accidental);
        assert_eq!(table.resolve('z').unwrap().key(), KeyId::new('Z'));

        let rows = piano.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn test_invalid_rows() {
        let piano = parse(
            r#"
            rows:
              - - name: C
                  key: a
                  frequency: 261.63
                - name: D
                  key: A
                  frequency: 293.66
            "#,
        );
        assert!(matches!(
            piano.note_table(),
            Err(ConfigError::Notes(NoteTableError::DuplicateKey { .. }))
        ));
        assert!(piano.validate().is_err());

        let piano = parse("row: 5");
        assert!(matches!(
            piano.note_table(),
            Err(ConfigError::Notes(NoteTableError::RowOutOfRange { row: 5, rows: 2 }))
        ));
    }

    #[test]
    fn test_durations() {
        let piano = parse(
            r#"
            release: 250ms
            tap_hold: 1s
            release_floor: 0.001
            "#,
        );
        let fade = piano.release_fade().unwrap();
        assert_eq!(fade.duration(), Duration::from_millis(250));
        assert_eq!(fade.floor(), 0.001);
        assert_eq!(piano.tap_hold().unwrap(), Duration::from_secs(1));

        let piano = parse("release: soon");
        assert!(matches!(
            piano.release(),
            Err(ConfigError::Duration { field: "release", .. })
        ));
    }

    #[test]
    fn test_volume_clamped() {
        assert_eq!(parse("volume: 3.5").volume(), 1.0);
        assert_eq!(parse("volume: -1.0").volume(), 0.0);

        let mut piano = parse("volume: 0.7");
        piano.volume = Some(f32::NAN);
        assert_eq!(piano.volume(), 0.5);
        assert!(matches!(piano.validate(), Err(ConfigError::Volume)));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let piano = parse(
            r#"
            audio:
              device: mock-device
              sample_rate: 0
            "#,
        );
        assert!(matches!(piano.validate(), Err(ConfigError::Audio(_))));
        assert!(parse("audio: { sample_rate: 22050 }").validate().is_ok());
    }

    #[test]
    fn test_example_config() {
        let piano = Piano::deserialize(&PathBuf::from("assets/piano.yaml")).unwrap();
        piano.validate().unwrap();

        assert_eq!(piano.audio().device(), "mock-device");
        assert_eq!(piano.audio().sample_rate(), 48000);
        assert_eq!(piano.waveform(), Waveform::Triangle);
        assert_eq!(piano.sound_mode(), SoundMode::Sample);
        assert_eq!(piano.volume(), 0.7);

        let samples = piano.samples().unwrap();
        assert_eq!(samples.path(), "samples");
        assert_eq!(samples.extension(), "wav");
    }
}
