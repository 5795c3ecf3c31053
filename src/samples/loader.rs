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

//! Sample fetching and decoding.
//!
//! Each pitch is fetched and decoded by its own task. A pitch that fails to load
//! is logged and left out of the bank; it never affects the other pitches.

use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer as DecodedBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{SampleBank, SampleBuffer, SampleError};
use crate::config;

/// Default extension for sample files.
pub const DEFAULT_EXTENSION: &str = "wav";

/// Loads samples from a directory of files named after their pitch.
#[derive(Debug, Clone)]
pub struct SampleLoader {
    /// The directory holding the samples.
    base: PathBuf,
    /// The file extension of the samples.
    extension: String,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(base: &Path, extension: &str) -> SampleLoader {
        SampleLoader {
            base: base.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Creates a sample loader from configuration, resolving relative paths
    /// against the directory of the config file.
    pub fn from_config(config: &config::Samples, config_dir: &Path) -> SampleLoader {
        let base = Path::new(config.path());
        let base = if base.is_absolute() {
            base.to_path_buf()
        } else {
            config_dir.join(base)
        };
        SampleLoader::new(&base, config.extension())
    }

    /// Returns the file for the given pitch. Sharps are spelled with an "s" so that
    /// the names are safe everywhere: "C#" -> "Cs.wav".
    pub fn path_for(&self, pitch: &str) -> PathBuf {
        self.base
            .join(format!("{}.{}", pitch.replace('#', "s"), self.extension))
    }

    /// Loads every pitch concurrently and returns what could be loaded.
    pub async fn load(&self, pitches: &[String]) -> SampleBank {
        info!(
            base = ?self.base,
            pitches = pitches.len(),
            "Loading samples"
        );

        let mut tasks = JoinSet::new();
        for pitch in pitches {
            let pitch = pitch.clone();
            let path = self.path_for(&pitch);
            tasks.spawn(async move {
                let result = load_file(&path).await;
                (pitch, path, result)
            });
        }

        let mut bank = SampleBank::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((pitch, path, Ok(buffer))) => {
                    debug!(
                        pitch,
                        path = ?path,
                        duration_ms = buffer.duration().as_millis(),
                        "Sample loaded"
                    );
                    bank.insert(&pitch, buffer);
                }
                Ok((pitch, path, Err(e))) => {
                    warn!(
                        pitch,
                        path = ?path,
                        err = %e,
                        "Sample unavailable, pitch will use synthesis"
                    );
                }
                Err(e) => warn!(err = %e, "Sample load task failed"),
            }
        }

        info!(
            loaded = bank.len(),
            requested = pitches.len(),
            "Samples loaded"
        );
        bank
    }
}

/// Reads the file, then decodes it off the async runtime.
async fn load_file(path: &Path) -> Result<SampleBuffer, SampleError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| SampleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_string());

    tokio::task::spawn_blocking(move || decode(bytes, extension.as_deref())).await?
}

/// Decodes an encoded audio payload (WAV, FLAC, MP3, ...) into a mono buffer.
/// Multi-channel audio is averaged down to one channel.
pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<SampleBuffer, SampleError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SampleError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(SampleError::UnknownSampleRate)?;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut data = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut buffer = DecodedBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        data.extend(
            buffer
                .samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if data.is_empty() {
        return Err(SampleError::Empty);
    }

    Ok(SampleBuffer::new(data, sample_rate))
}
