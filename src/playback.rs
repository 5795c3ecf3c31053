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

//! Process-wide playback state: the engine, the master volume and the sample bank.
//!
//! The engine is created lazily on the first interaction that needs it and is kept
//! for the rest of the process. It is never re-created.

use std::error::Error;
use std::fmt;

use tracing::{error, info, warn};

use crate::audio::Engine;
use crate::samples::SampleBank;

/// Default master volume.
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Creates the engine on first use.
pub type EngineFactory = Box<dyn FnMut() -> Result<Box<dyn Engine>, Box<dyn Error>>>;

/// Owns the engine and everything shared between voices.
pub struct Playback {
    factory: EngineFactory,
    engine: Option<Box<dyn Engine>>,
    volume: f32,
    samples: SampleBank,
}

impl Playback {
    /// Creates the playback state. Nothing is initialized until first use. A
    /// volume that is not a number falls back to the default.
    pub fn new(factory: EngineFactory, volume: f32) -> Playback {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            warn!(volume, "Ignoring non-finite volume, using default");
            DEFAULT_VOLUME
        };
        Playback {
            factory,
            engine: None,
            volume,
            samples: SampleBank::new(),
        }
    }

    /// Returns true once the engine exists.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Returns the engine, creating it on first use. If creation fails the error
    /// is logged and None is returned; creation is attempted again next time.
    pub fn engine(&mut self) -> Option<&dyn Engine> {
        if self.engine.is_none() {
            match (self.factory)() {
                Ok(engine) => {
                    engine.set_master_volume(self.volume);
                    info!(engine = %engine, volume = self.volume, "Playback engine initialized.");
                    self.engine = Some(engine);
                }
                Err(e) => {
                    error!(err = %e, "Unable to initialize playback engine");
                    return None;
                }
            }
        }
        self.engine.as_deref()
    }

    /// Returns the engine together with the sample bank, creating the engine on
    /// first use.
    pub fn resources(&mut self) -> Option<(&dyn Engine, &SampleBank)> {
        self.engine()?;
        Some((self.engine.as_deref()?, &self.samples))
    }

    /// Returns the engine only if it has already been created.
    pub fn initialized_engine(&self) -> Option<&dyn Engine> {
        self.engine.as_deref()
    }

    /// Sets the master volume, clamped to 0.0..=1.0. Applied immediately if the
    /// engine exists, otherwise at initialization. Non-finite volumes are ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            warn!(volume, "Ignoring non-finite volume");
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(engine) = &self.engine {
            engine.set_master_volume(self.volume);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Gets the loaded samples.
    pub fn samples(&self) -> &SampleBank {
        &self.samples
    }

    /// Adds loaded samples to the bank.
    pub fn install_samples(&mut self, samples: SampleBank) {
        self.samples.merge(samples);
    }
}

impl fmt::Debug for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playback")
            .field("initialized", &self.is_initialized())
            .field("volume", &self.volume)
            .field("samples", &self.samples.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::audio::mock;

    fn counting_factory(created: Rc<Cell<usize>>) -> EngineFactory {
        Box::new(move || -> Result<Box<dyn Engine>, Box<dyn Error>> {
            created.set(created.get() + 1);
            Ok(Box::new(mock::Engine::new("mock-engine", 44100, 2)))
        })
    }

    #[test]
    fn test_lazy_initialization() {
        let created = Rc::new(Cell::new(0));
        let mut playback = Playback::new(counting_factory(created.clone()), 0.5);

        assert!(!playback.is_initialized());
        assert_eq!(created.get(), 0);

        assert!(playback.engine().is_some());
        assert!(playback.engine().is_some());
        assert_eq!(created.get(), 1);
        assert!(playback.is_initialized());
    }

    #[test]
    fn test_volume_before_initialization() {
        let created = Rc::new(Cell::new(0));
        let mut playback = Playback::new(counting_factory(created), 0.5);

        playback.set_volume(0.2);
        assert!(playback.initialized_engine().is_none());

        let engine = playback.engine().unwrap();
        assert!((engine.master_volume() - 0.2).abs() < 1e-6);

        playback.set_volume(1.5);
        assert_eq!(playback.volume(), 1.0);
        assert_eq!(playback.initialized_engine().unwrap().master_volume(), 1.0);
    }

    #[test]
    fn test_non_finite_volume_is_ignored() {
        let created = Rc::new(Cell::new(0));
        let mut playback = Playback::new(counting_factory(created.clone()), f32::NAN);
        assert_eq!(playback.volume(), DEFAULT_VOLUME);

        let mut playback = Playback::new(counting_factory(created), 0.3);
        playback.set_volume(f32::NAN);
        playback.set_volume(f32::INFINITY);
        assert!((playback.volume() - 0.3).abs() < 1e-6);
        assert!((playback.engine().unwrap().master_volume() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_failed_initialization_is_retried() {
        let attempts = Rc::new(Cell::new(0));
        let factory: EngineFactory = {
            let attempts = attempts.clone();
            Box::new(move || -> Result<Box<dyn Engine>, Box<dyn Error>> {
                attempts.set(attempts.get() + 1);
                if attempts.get() == 1 {
                    Err("device busy".into())
                } else {
                    Ok(Box::new(mock::Engine::new("mock-engine", 44100, 2)))
                }
            })
        };
        let mut playback = Playback::new(factory, 0.5);

        assert!(playback.engine().is_none());
        assert!(playback.engine().is_some());
        assert!(playback.engine().is_some());
        assert_eq!(attempts.get(), 2);
    }
}
