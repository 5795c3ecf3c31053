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

//! Software output graph shared by the cpal and mock engines.
//!
//! Every node is connected to a single output node carrying the master volume.
//! Nodes are rendered as mono and copied to every output channel.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{NodeId, Waveform};
use crate::samples::SampleBuffer;

/// Describes a live node, for inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Oscillator { waveform: Waveform, frequency: f32 },
    Buffer { frames: usize },
}

/// A snapshot of a live node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub kind: NodeKind,
    /// The gain at the time of the snapshot.
    pub gain: f32,
    /// The frame at which the node will stop, if scheduled.
    pub stop_at_frame: Option<u64>,
}

enum Generator {
    Oscillator {
        waveform: Waveform,
        frequency: f32,
        phase: f32,
    },
    Buffer {
        buffer: Arc<SampleBuffer>,
        position: f64,
        step: f64,
    },
}

/// An exponential gain ramp between two frames. Values outside the ramp hold the
/// nearest endpoint.
#[derive(Debug, Clone, Copy)]
struct GainRamp {
    from: f32,
    to: f32,
    start_frame: u64,
    end_frame: u64,
}

impl GainRamp {
    fn value_at(&self, frame: u64) -> f32 {
        if frame <= self.start_frame {
            return self.from;
        }
        if frame >= self.end_frame {
            return self.to;
        }

        let t = (frame - self.start_frame) as f32 / (self.end_frame - self.start_frame) as f32;
        if self.from > 0.0 && self.to > 0.0 {
            self.from * (self.to / self.from).powf(t)
        } else {
            // Exponential ramps are undefined through zero.
            self.from + (self.to - self.from) * t
        }
    }
}

struct Node {
    id: NodeId,
    generator: Generator,
    gain: f32,
    ramp: Option<GainRamp>,
    stop_at_frame: Option<u64>,
    finished: bool,
}

impl Node {
    fn gain_at(&self, frame: u64) -> f32 {
        self.ramp.map_or(self.gain, |ramp| ramp.value_at(frame))
    }

    /// Renders one mono sample, or None once the node has finished.
    fn render(&mut self, frame: u64, sample_rate: u32) -> Option<f32> {
        if self.finished {
            return None;
        }
        if self.stop_at_frame.is_some_and(|stop| frame >= stop) {
            self.finished = true;
            return None;
        }

        let gain = self.gain_at(frame);
        let value = match &mut self.generator {
            Generator::Oscillator {
                waveform,
                frequency,
                phase,
            } => {
                let value = waveform.sample(*phase);
                *phase += *frequency / sample_rate as f32;
                *phase -= phase.floor();
                value
            }
            Generator::Buffer {
                buffer,
                position,
                step,
            } => {
                let index = *position as usize;
                match buffer.data().get(index) {
                    Some(value) => {
                        *position += *step;
                        *value
                    }
                    None => {
                        self.finished = true;
                        return None;
                    }
                }
            }
        };

        Some(value * gain)
    }

    fn info(&self, frame: u64) -> NodeInfo {
        let kind = match &self.generator {
            Generator::Oscillator {
                waveform,
                frequency,
                ..
            } => NodeKind::Oscillator {
                waveform: *waveform,
                frequency: *frequency,
            },
            Generator::Buffer { buffer, .. } => NodeKind::Buffer {
                frames: buffer.data().len(),
            },
        };
        NodeInfo {
            id: self.id,
            kind,
            gain: self.gain_at(frame),
            stop_at_frame: self.stop_at_frame,
        }
    }
}

/// The output graph.
pub struct Mixer {
    nodes: Mutex<Vec<Node>>,
    master_volume: AtomicU32,
    frames: AtomicU64,
    next_id: AtomicU64,
    sample_rate: u32,
    channels: u16,
}

impl Mixer {
    /// Creates a new mixer with the given output format. The sample rate is at
    /// least 1 Hz.
    pub fn new(sample_rate: u32, channels: u16) -> Mixer {
        let sample_rate = sample_rate.max(1);
        Mixer {
            nodes: Mutex::new(Vec::new()),
            master_volume: AtomicU32::new(1.0f32.to_bits()),
            frames: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the number of frames rendered so far.
    pub fn current_frame(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Returns the mixer clock.
    pub fn current_time(&self) -> Duration {
        self.frame_to_time(self.current_frame())
    }

    pub fn frame_to_time(&self, frame: u64) -> Duration {
        Duration::from_secs_f64(frame as f64 / self.sample_rate as f64)
    }

    pub fn time_to_frame(&self, time: Duration) -> u64 {
        (time.as_secs_f64() * self.sample_rate as f64).round() as u64
    }

    /// Adds a running oscillator at unity gain.
    pub fn add_oscillator(&self, waveform: Waveform, frequency: f32) -> NodeId {
        self.add_node(Generator::Oscillator {
            waveform,
            frequency,
            phase: 0.0,
        })
    }

    /// Adds a buffer player at unity gain, starting at the first frame. Buffers
    /// recorded at a different rate are stepped so that they keep their pitch.
    pub fn add_buffer(&self, buffer: Arc<SampleBuffer>) -> NodeId {
        let step = buffer.sample_rate() as f64 / self.sample_rate as f64;
        self.add_node(Generator::Buffer {
            buffer,
            position: 0.0,
            step,
        })
    }

    fn add_node(&self, generator: Generator) -> NodeId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.nodes.lock().push(Node {
            id,
            generator,
            gain: 1.0,
            ramp: None,
            stop_at_frame: None,
            finished: false,
        });
        id
    }

    /// Ramps the node's gain exponentially, starting at the current frame.
    pub fn ramp_gain(&self, id: NodeId, from: f32, to: f32, duration: Duration) {
        let start_frame = self.current_frame();
        let end_frame = start_frame + self.time_to_frame(duration).max(1);
        if let Some(node) = self.nodes.lock().iter_mut().find(|n| n.id == id) {
            node.gain = to;
            node.ramp = Some(GainRamp {
                from,
                to,
                start_frame,
                end_frame,
            });
        }
    }

    /// Schedules the node to stop at the given mixer time.
    pub fn stop_at(&self, id: NodeId, at: Duration) {
        let frame = self.time_to_frame(at);
        if let Some(node) = self.nodes.lock().iter_mut().find(|n| n.id == id) {
            node.stop_at_frame = Some(frame);
        }
    }

    /// Removes the node immediately.
    pub fn disconnect(&self, id: NodeId) {
        self.nodes.lock().retain(|n| n.id != id);
    }

    /// Sets the master volume, clamped to 0.0..=1.0. Non-finite volumes are ignored.
    pub fn set_master_volume(&self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.master_volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Acquire))
    }

    /// Returns the number of connected nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Returns a snapshot of every connected node.
    pub fn snapshot(&self) -> Vec<NodeInfo> {
        let frame = self.current_frame();
        self.nodes.lock().iter().map(|n| n.info(frame)).collect()
    }

    /// Renders interleaved frames into the output and advances the clock. Nodes
    /// that finish during this call are freed.
    pub fn process(&self, output: &mut [f32]) {
        let channels = self.channels as usize;
        if channels == 0 {
            return;
        }

        let start = self.current_frame();
        let master = self.master_volume();
        let mut nodes = self.nodes.lock();
        let mut frame_count = 0u64;

        for (offset, frame) in output.chunks_exact_mut(channels).enumerate() {
            let now = start + offset as u64;
            let mut sum = 0.0f32;
            for node in nodes.iter_mut() {
                if let Some(value) = node.render(now, self.sample_rate) {
                    sum += value;
                }
            }

            let value = (sum * master).clamp(-1.0, 1.0);
            frame.fill(value);
            frame_count += 1;
        }

        nodes.retain(|n| !n.finished);
        self.frames.fetch_add(frame_count, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_oscillator_renders_on_all_channels() {
        let mixer = Mixer::new(44100, 2);
        mixer.add_oscillator(Waveform::Square, 440.0);

        let mut output = vec![0.0f32; 64];
        mixer.process(&mut output);

        for frame in output.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!((peak(&output) - 1.0).abs() < 1e-6);
        assert_eq!(mixer.current_frame(), 32);
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mixer = Mixer::new(44100, 1);
        mixer.add_oscillator(Waveform::Square, 440.0);
        mixer.set_master_volume(0.25);

        let mut output = vec![0.0f32; 128];
        mixer.process(&mut output);
        assert!((peak(&output) - 0.25).abs() < 1e-6);

        mixer.set_master_volume(0.0);
        mixer.process(&mut output);
        assert_eq!(peak(&output), 0.0);

        mixer.set_master_volume(3.0);
        assert_eq!(mixer.master_volume(), 1.0);

        mixer.set_master_volume(f32::NAN);
        assert_eq!(mixer.master_volume(), 1.0);
        mixer.process(&mut output);
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_zero_sample_rate_keeps_clock_valid() {
        let mixer = Mixer::new(0, 1);
        assert_eq!(mixer.sample_rate(), 1);
        assert_eq!(mixer.current_time(), Duration::ZERO);

        let mut output = vec![0.0f32; 2];
        mixer.process(&mut output);
        assert_eq!(mixer.current_time(), Duration::from_secs(2));
    }

    #[test]
    fn test_exponential_ramp() {
        let ramp = GainRamp {
            from: 1.0,
            to: 0.01,
            start_frame: 100,
            end_frame: 200,
        };

        assert_eq!(ramp.value_at(50), 1.0);
        assert!((ramp.value_at(150) - 0.1).abs() < 1e-4);
        assert_eq!(ramp.value_at(200), 0.01);
        assert_eq!(ramp.value_at(1000), 0.01);
    }

    #[test]
    fn test_scheduled_stop_frees_node() {
        let mixer = Mixer::new(1000, 1);
        let id = mixer.add_oscillator(Waveform::Sine, 100.0);
        mixer.ramp_gain(id, 1.0, 0.01, Duration::from_millis(100));
        mixer.stop_at(id, Duration::from_millis(100));

        let mut output = vec![0.0f32; 50];
        mixer.process(&mut output);
        assert_eq!(mixer.node_count(), 1);
        let info = &mixer.snapshot()[0];
        assert!(info.gain < 1.0 && info.gain > 0.01);
        assert_eq!(info.stop_at_frame, Some(100));

        mixer.process(&mut output);
        mixer.process(&mut output);
        assert_eq!(mixer.node_count(), 0);

        // Everything after the stop frame is silent.
        mixer.process(&mut output);
        assert_eq!(peak(&output), 0.0);
    }

    #[test]
    fn test_disconnect() {
        let mixer = Mixer::new(44100, 1);
        let a = mixer.add_oscillator(Waveform::Sine, 440.0);
        let b = mixer.add_oscillator(Waveform::Sine, 880.0);
        mixer.disconnect(a);

        let snapshot = mixer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, b);
        assert_eq!(
            snapshot[0].kind,
            NodeKind::Oscillator {
                waveform: Waveform::Sine,
                frequency: 880.0
            }
        );
    }

    #[test]
    fn test_buffer_plays_once() {
        let mixer = Mixer::new(100, 1);
        let buffer = Arc::new(SampleBuffer::new(vec![0.5; 10], 100));
        mixer.add_buffer(buffer);

        let mut output = vec![0.0f32; 8];
        mixer.process(&mut output);
        assert!(output.iter().all(|s| (*s - 0.5).abs() < 1e-6));

        mixer.process(&mut output);
        assert!((output[0] - 0.5).abs() < 1e-6);
        assert!((output[1] - 0.5).abs() < 1e-6);
        assert_eq!(output[2], 0.0);
        assert_eq!(mixer.node_count(), 0);
    }

    #[test]
    fn test_buffer_rate_correction() {
        let mixer = Mixer::new(100, 1);
        // Recorded at twice the output rate: plays back in half the frames.
        let buffer = Arc::new(SampleBuffer::new(vec![0.5; 20], 200));
        mixer.add_buffer(buffer);

        let mut output = vec![0.0f32; 12];
        mixer.process(&mut output);
        assert!((output[9] - 0.5).abs() < 1e-6);
        assert_eq!(output[10], 0.0);
    }
}
