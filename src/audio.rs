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
use std::{error::Error, fmt, sync::Arc, time::Duration};

use crate::config;
use crate::samples::SampleBuffer;

pub mod cpal;
pub mod mixer;
pub mod mock;
mod waveform;

pub use waveform::Waveform;

/// Identifies a node in the output graph.
pub type NodeId = u64;

/// The playback engine that voices are started on. Every node created here is
/// connected to the shared output node, which carries the master volume.
pub trait Engine: fmt::Display {
    /// Returns the engine clock. Scheduled operations are expressed on this clock.
    fn current_time(&self) -> Duration;

    /// Creates and immediately starts a periodic waveform generator.
    fn create_oscillator(&self, waveform: Waveform, frequency: f32) -> NodeId;

    /// Creates and immediately starts a player for a decoded sample buffer.
    fn create_buffer_player(&self, buffer: Arc<SampleBuffer>) -> NodeId;

    /// Schedules an exponential gain ramp on the node from `from` to `to`, starting
    /// now and ending after `duration`.
    fn ramp_gain(&self, node: NodeId, from: f32, to: f32, duration: Duration);

    /// Schedules the node to stop at the given engine time. The node is
    /// disconnected and freed once the time is reached.
    fn stop_at(&self, node: NodeId, at: Duration);

    /// Disconnects and frees the node immediately.
    fn disconnect(&self, node: NodeId);

    /// Sets the master volume, 0.0 to 1.0.
    fn set_master_volume(&self, volume: f32);

    /// Gets the master volume.
    fn master_volume(&self) -> f32;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Engine::list()
}

/// Creates the engine described by the given audio configuration.
pub fn get_engine(config: &config::Audio) -> Result<Box<dyn Engine>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Box::new(mock::Engine::new(
            device,
            config.sample_rate(),
            config.channels(),
        )));
    };

    Ok(Box::new(cpal::Engine::open(config)?))
}
