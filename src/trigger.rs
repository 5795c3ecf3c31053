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

//! The press/release state machine that ties input to voices.
//!
//! Each key moves Idle -> Sounding on press and Sounding -> Releasing -> Idle on
//! release. Switching rows forces every key back to Idle immediately. None of the
//! transitions fail: unresolvable and duplicate input is ignored and logged.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::audio::Waveform;
use crate::notes::{KeyId, NoteDefinition, NoteTable, NoteTableError};
use crate::playback::Playback;
use crate::samples::SampleBank;
use crate::source::{self, ReleaseFade, SamplePlayer, SoundMode, Synthesizer, VoiceSource};
use crate::surface::Surface;
use crate::voice::VoiceRegistry;

pub use crate::voice::KeyState;

/// A press or release from an input source. Pointer and touch events address a
/// rendered key by its position in the active row; keyboard events carry the
/// typed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown(usize),
    PointerUp(usize),
    /// The pointer left the key. Only releases if the pointer pressed it.
    PointerLeave(usize),
    TouchStart(usize),
    TouchEnd(usize),
    KeyDown(char),
    KeyUp(char),
}

/// Drives voices from input events.
pub struct TriggerController {
    table: NoteTable,
    registry: VoiceRegistry,
    playback: Playback,
    surface: Box<dyn Surface>,
    waveform: Waveform,
    sound_mode: SoundMode,
    release_fade: ReleaseFade,
    /// Keys pressed through a pointer or touch that are still down.
    pointer_held: HashSet<KeyId>,
}

impl TriggerController {
    /// Creates a new controller and renders the active row on the surface.
    pub fn new(table: NoteTable, playback: Playback, mut surface: Box<dyn Surface>) -> TriggerController {
        surface.rebuild(table.active_set());
        TriggerController {
            table,
            registry: VoiceRegistry::new(),
            playback,
            surface,
            waveform: Waveform::default(),
            sound_mode: SoundMode::default(),
            release_fade: ReleaseFade::default(),
            pointer_held: HashSet::new(),
        }
    }

    /// Routes an input event. Returns true if a key changed state.
    pub fn dispatch(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::PointerDown(index) | InputEvent::TouchStart(index) => {
                match self.key_at(index) {
                    Some(key) => {
                        let pressed = self.press(key);
                        if pressed {
                            self.pointer_held.insert(key);
                        }
                        pressed
                    }
                    None => false,
                }
            }
            InputEvent::PointerUp(index) | InputEvent::TouchEnd(index) => match self.key_at(index) {
                Some(key) => {
                    self.pointer_held.remove(&key);
                    self.release(key)
                }
                None => false,
            },
            InputEvent::PointerLeave(index) => match self.key_at(index) {
                Some(key) if self.pointer_held.remove(&key) => self.release(key),
                _ => false,
            },
            InputEvent::KeyDown(input) => match self.resolve(input) {
                Some(key) => self.press(key),
                None => false,
            },
            InputEvent::KeyUp(input) => match self.resolve(input) {
                Some(key) => self.release(key),
                None => false,
            },
        }
    }

    fn key_at(&self, index: usize) -> Option<KeyId> {
        let key = self.table.resolve_index(index).map(|note| note.key());
        if key.is_none() {
            debug!(index, "No key at position");
        }
        key
    }

    fn resolve(&self, input: char) -> Option<KeyId> {
        let key = self.table.resolve(input).map(|note| note.key());
        if key.is_none() {
            debug!(input = %input, "Input does not map to a note");
        }
        key
    }

    /// Starts a voice for the key if it resolves in the active row and has no
    /// sounding voice. Returns true if a voice was started.
    pub fn press(&mut self, key: KeyId) -> bool {
        let Some(note) = self.table.resolve_key(key) else {
            debug!(key = %key, "Key is not in the active row");
            return false;
        };
        if self.registry.has_voice(key) {
            debug!(key = %key, "Key already sounding");
            return false;
        }

        let Some((engine, samples)) = self.playback.resources() else {
            warn!(key = %key, "No playback engine, dropping press");
            return false;
        };
        self.registry.reap(engine.current_time());

        let synthesizer = Synthesizer::new(self.waveform);
        let voice = match self.sound_mode {
            SoundMode::Synth => synthesizer.start(engine, note),
            SoundMode::Sample => SamplePlayer::new(samples, synthesizer).start(engine, note),
        };
        debug!(
            key = %key,
            note = note.name(),
            frequency = note.frequency(),
            kind = %voice.kind(),
            "Voice started"
        );

        if let Err(mut voice) = self.registry.start(voice) {
            source::stop_now(engine, &mut voice);
            return false;
        }
        self.surface.set_active(key, true);
        true
    }

    /// Releases the key's voice, starting its fade. A key without a sounding
    /// voice is ignored. Returns true if a voice was released.
    pub fn release(&mut self, key: KeyId) -> bool {
        self.pointer_held.remove(&key);
        let Some(mut voice) = self.registry.release(key) else {
            debug!(key = %key, "No voice to release");
            return false;
        };
        self.surface.set_active(key, false);

        match self.playback.initialized_engine() {
            Some(engine) => {
                self.registry.reap(engine.current_time());
                self.release_fade.apply(engine, &mut voice);
                debug!(
                    key = %key,
                    note = voice.note(),
                    stop_at_ms = voice.stop_at().map(|t| t.as_millis()),
                    "Voice releasing"
                );
                self.registry.retire(voice);
            }
            None => voice.mark_stopped(),
        }
        true
    }

    /// Stops every voice immediately and switches the active row. An out of
    /// range row is rejected and nothing changes.
    pub fn select_row(&mut self, row: usize) -> Result<(), NoteTableError> {
        if self.table.row(row).is_none() {
            return Err(NoteTableError::RowOutOfRange {
                row,
                rows: self.table.row_count(),
            });
        }

        let voices = self.registry.release_all();
        let stopped = voices.len();
        for mut voice in voices {
            if let Some(engine) = self.playback.initialized_engine() {
                source::stop_now(engine, &mut voice);
            }
            self.surface.set_active(voice.key(), false);
        }
        self.pointer_held.clear();

        self.table.select(row)?;
        self.surface.rebuild(self.table.active_set());
        info!(row, stopped, "Active row switched.");
        Ok(())
    }

    /// Redraws the surface, keeping held keys marked.
    pub fn redraw(&mut self) {
        self.surface.rebuild(self.table.active_set());
        for key in self.registry.keys() {
            self.surface.set_active(key, true);
        }
    }

    /// Sets the waveform used by voices started from now on.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        info!(waveform = %waveform, "Waveform set.");
        self.waveform = waveform;
    }

    /// Sets the master volume. Applies to every voice, sounding or not.
    pub fn set_volume(&mut self, volume: f32) {
        self.playback.set_volume(volume);
        info!(volume = self.playback.volume(), "Volume set.");
    }

    /// Sets the voice source used by voices started from now on.
    pub fn set_sound_mode(&mut self, sound_mode: SoundMode) {
        if sound_mode == SoundMode::Sample && self.playback.samples().is_empty() {
            warn!("No samples loaded yet, notes without a sample use synthesis");
        }
        info!(sound_mode = %sound_mode, "Sound mode set.");
        self.sound_mode = sound_mode;
    }

    pub fn set_release_fade(&mut self, release_fade: ReleaseFade) {
        self.release_fade = release_fade;
    }

    /// Adds loaded samples. Voices started afterwards in sample mode use them.
    pub fn install_samples(&mut self, samples: SampleBank) {
        info!(pitches = ?samples.pitches(), "Samples installed.");
        self.playback.install_samples(samples);
    }

    /// Returns the state of the key right now.
    pub fn key_state(&self, key: KeyId) -> KeyState {
        let now = self
            .playback
            .initialized_engine()
            .map(|engine| engine.current_time())
            .unwrap_or_default();
        self.registry.state(key, now)
    }

    /// Returns the playable notes in order.
    pub fn active_set(&self) -> &[NoteDefinition] {
        self.table.active_set()
    }

    pub fn table(&self) -> &NoteTable {
        &self.table
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn sound_mode(&self) -> SoundMode {
        self.sound_mode
    }

    pub fn release_fade(&self) -> ReleaseFade {
        self.release_fade
    }
}
