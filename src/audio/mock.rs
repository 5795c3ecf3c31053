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
use std::{fmt, sync::Arc, time::Duration};

use tracing::debug;

use super::mixer::{Mixer, NodeInfo};
use super::{NodeId, Waveform};
use crate::samples::SampleBuffer;

/// A mock engine. Doesn't open an audio device: the mixer only advances when
/// `render` is called, which makes the engine clock fully deterministic.
#[derive(Clone)]
pub struct Engine {
    name: String,
    mixer: Arc<Mixer>,
}

impl Engine {
    /// Creates a new mock engine.
    pub fn new(name: &str, sample_rate: u32, channels: u16) -> Engine {
        Engine {
            name: name.to_string(),
            mixer: Arc::new(Mixer::new(sample_rate, channels)),
        }
    }

    /// Renders the given duration of audio and returns the interleaved output.
    pub fn render(&self, duration: Duration) -> Vec<f32> {
        let frames = self.mixer.time_to_frame(duration) as usize;
        let mut output = vec![0.0f32; frames * self.mixer.channels() as usize];
        self.mixer.process(&mut output);
        output
    }

    /// Returns a snapshot of the connected nodes.
    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.mixer.snapshot()
    }
}

impl super::Engine for Engine {
    fn current_time(&self) -> Duration {
        self.mixer.current_time()
    }

    fn create_oscillator(&self, waveform: Waveform, frequency: f32) -> NodeId {
        let id = self.mixer.add_oscillator(waveform, frequency);
        debug!(device = self.name, id, %waveform, frequency, "Oscillator created (mock)");
        id
    }

    fn create_buffer_player(&self, buffer: Arc<SampleBuffer>) -> NodeId {
        let id = self.mixer.add_buffer(buffer);
        debug!(device = self.name, id, "Buffer player created (mock)");
        id
    }

    fn ramp_gain(&self, node: NodeId, from: f32, to: f32, duration: Duration) {
        self.mixer.ramp_gain(node, from, to, duration);
    }

    fn stop_at(&self, node: NodeId, at: Duration) {
        self.mixer.stop_at(node, at);
    }

    fn disconnect(&self, node: NodeId) {
        self.mixer.disconnect(node);
    }

    fn set_master_volume(&self, volume: f32) {
        self.mixer.set_master_volume(volume);
    }

    fn master_volume(&self) -> f32 {
        self.mixer.master_volume()
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
