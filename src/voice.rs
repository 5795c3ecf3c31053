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

//! Voice tracking for held keys.
//!
//! A key owns at most one sounding voice. Released voices are kept aside until
//! their fade has completed so that the key can report that it is releasing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::audio::NodeId;
use crate::notes::{KeyId, NoteDefinition};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// The lifecycle of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Sounding,
    Releasing,
    Stopped,
}

/// How a voice produces sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceKind {
    Synth,
    Sample,
}

impl fmt::Display for VoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceKind::Synth => write!(f, "synth"),
            VoiceKind::Sample => write!(f, "sample"),
        }
    }
}

/// The per-key state as seen by the trigger controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Idle,
    Sounding,
    Releasing,
}

/// A live sound-producing instance bound to one held key.
#[derive(Debug)]
pub struct Voice {
    /// Unique ID for this voice.
    id: u64,
    /// The key that owns this voice.
    key: KeyId,
    /// The name of the note being played.
    note: String,
    /// The frequency of the note being played.
    frequency: f32,
    /// Whether the voice is synthesized or sampled.
    kind: VoiceKind,
    /// The engine node producing the sound.
    node: NodeId,
    /// Engine time at which the voice started.
    started_at: Duration,
    state: VoiceState,
    /// Engine time at which the underlying node stops, once released.
    stop_at: Option<Duration>,
}

impl Voice {
    /// Creates a new sounding voice.
    pub fn new(note: &NoteDefinition, kind: VoiceKind, node: NodeId, started_at: Duration) -> Voice {
        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            key: note.key(),
            note: note.name().to_string(),
            frequency: note.frequency(),
            kind,
            node,
            started_at,
            state: VoiceState::Sounding,
            stop_at: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> KeyId {
        self.key
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn stop_at(&self) -> Option<Duration> {
        self.stop_at
    }

    /// Marks the voice as fading out until the given engine time.
    pub fn mark_releasing(&mut self, stop_at: Duration) {
        self.state = VoiceState::Releasing;
        self.stop_at = Some(stop_at);
    }

    /// Marks the voice as stopped. Its node is gone.
    pub fn mark_stopped(&mut self) {
        self.state = VoiceState::Stopped;
    }

    /// Returns true once the voice no longer produces sound at the given time.
    pub fn is_finished(&self, now: Duration) -> bool {
        match self.state {
            VoiceState::Sounding => false,
            VoiceState::Releasing => self.stop_at.is_some_and(|stop_at| now >= stop_at),
            VoiceState::Stopped => true,
        }
    }
}

/// Tracks voices by key.
#[derive(Default)]
pub struct VoiceRegistry {
    /// Sounding voices by owning key.
    sounding: HashMap<KeyId, Voice>,
    /// Voices whose release fade is still running.
    releasing: Vec<Voice>,
}

impl VoiceRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> VoiceRegistry {
        VoiceRegistry::default()
    }

    /// Returns true if the key currently owns a sounding voice.
    pub fn has_voice(&self, key: KeyId) -> bool {
        self.sounding.contains_key(&key)
    }

    /// Records a voice under its key. If the key already owns a sounding voice,
    /// nothing is recorded and the new voice is handed back to the caller.
    pub fn start(&mut self, voice: Voice) -> Result<(), Voice> {
        if self.has_voice(voice.key) {
            debug!(key = %voice.key, "Key already sounding, ignoring voice");
            return Err(voice);
        }
        self.sounding.insert(voice.key, voice);
        Ok(())
    }

    /// Removes and returns the sounding voice for the key, if any.
    pub fn release(&mut self, key: KeyId) -> Option<Voice> {
        self.sounding.remove(&key)
    }

    /// Keeps a released voice until its fade completes.
    pub fn retire(&mut self, voice: Voice) {
        self.releasing.push(voice);
    }

    /// Drops released voices whose fade has completed. Returns how many were dropped.
    pub fn reap(&mut self, now: Duration) -> usize {
        let before = self.releasing.len();
        self.releasing.retain(|v| !v.is_finished(now));
        before - self.releasing.len()
    }

    /// Removes and returns every voice, sounding or releasing.
    pub fn release_all(&mut self) -> Vec<Voice> {
        let mut voices: Vec<Voice> = self.sounding.drain().map(|(_, v)| v).collect();
        voices.append(&mut self.releasing);
        voices
    }

    /// Returns the state of the given key at the given engine time. A released
    /// voice whose fade has completed no longer counts, even before it is reaped.
    pub fn state(&self, key: KeyId, now: Duration) -> KeyState {
        if self.sounding.contains_key(&key) {
            KeyState::Sounding
        } else if self
            .releasing
            .iter()
            .any(|v| v.key == key && !v.is_finished(now))
        {
            KeyState::Releasing
        } else {
            KeyState::Idle
        }
    }

    /// Returns the sounding voice for the key.
    pub fn get(&self, key: KeyId) -> Option<&Voice> {
        self.sounding.get(&key)
    }

    /// Returns the keys that own a sounding voice.
    pub fn keys(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.sounding.keys().copied()
    }

    /// Returns the number of sounding voices.
    pub fn active_count(&self) -> usize {
        self.sounding.len()
    }

    /// Returns the number of voices still fading out.
    pub fn releasing_count(&self) -> usize {
        self.releasing.len()
    }

    /// Returns true if there are no sounding or releasing voices.
    pub fn is_empty(&self) -> bool {
        self.sounding.is_empty() && self.releasing.is_empty()
    }
}

impl fmt::Debug for VoiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceRegistry")
            .field("sounding", &self.sounding.len())
            .field("releasing", &self.releasing.len())
            .finish()
    }
}
