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
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A decoded mono sample. Shared between voices through an Arc.
#[derive(Clone, PartialEq)]
pub struct SampleBuffer {
    data: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> SampleBuffer {
        SampleBuffer { data, sample_rate }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.data.len() as f64 / self.sample_rate as f64)
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("frames", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Loaded samples by base pitch name ("C", "C#", ...). Pitches that failed to load
/// are simply absent.
#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    buffers: HashMap<String, Arc<SampleBuffer>>,
}

impl SampleBank {
    pub fn new() -> SampleBank {
        SampleBank::default()
    }

    pub fn insert(&mut self, pitch: &str, buffer: SampleBuffer) {
        self.buffers.insert(pitch.to_string(), Arc::new(buffer));
    }

    /// Gets the sample for the given base pitch name.
    pub fn get(&self, pitch: &str) -> Option<Arc<SampleBuffer>> {
        self.buffers.get(pitch).cloned()
    }

    pub fn contains(&self, pitch: &str) -> bool {
        self.buffers.contains_key(pitch)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Merges another bank into this one. The other bank's samples win.
    pub fn merge(&mut self, other: SampleBank) {
        self.buffers.extend(other.buffers);
    }

    /// Returns the loaded pitch names, sorted.
    pub fn pitches(&self) -> Vec<&str> {
        let mut pitches: Vec<&str> = self.buffers.keys().map(|p| p.as_str()).collect();
        pitches.sort();
        pitches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_lookup() {
        let mut bank = SampleBank::new();
        assert!(bank.is_empty());

        bank.insert("C", SampleBuffer::new(vec![0.1; 4], 44100));
        assert!(bank.contains("C"));
        assert!(!bank.contains("C#"));
        assert_eq!(bank.get("C").unwrap().data().len(), 4);
        assert!(bank.get("C#").is_none());
    }

    #[test]
    fn test_merge() {
        let mut bank = SampleBank::new();
        bank.insert("C", SampleBuffer::new(vec![0.1; 4], 44100));

        let mut other = SampleBank::new();
        other.insert("C", SampleBuffer::new(vec![0.2; 8], 44100));
        other.insert("D", SampleBuffer::new(vec![0.3; 2], 44100));
        bank.merge(other);

        assert_eq!(bank.pitches(), vec!["C", "D"]);
        assert_eq!(bank.get("C").unwrap().data().len(), 8);
    }

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::new(vec![0.0; 22050], 44100);
        assert_eq!(buffer.duration(), Duration::from_millis(500));
        assert_eq!(SampleBuffer::new(vec![0.0; 4], 0).duration(), Duration::ZERO);
    }
}
