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

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::mixer::Mixer;
use super::{NodeId, Waveform};
use crate::config;
use crate::samples::SampleBuffer;

/// An engine that renders the mixer into a cpal output stream.
pub struct Engine {
    /// The name of the output device.
    name: String,
    /// The output graph. Shared with the stream callback.
    mixer: Arc<Mixer>,
    /// The stream must be kept alive for output to continue.
    _stream: cpal::Stream,
}

impl Engine {
    /// Lists the names of output devices across all hosts.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        Ok(Self::list_cpal_devices()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn list_cpal_devices() -> Result<Vec<(String, cpal::Device)>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let has_outputs = match device.supported_output_configs() {
                    Ok(mut configs) => configs.any(|c| c.channels() > 0),
                    Err(_) => false,
                };
                if has_outputs {
                    devices.push((device.name()?, device));
                }
            }
        }

        devices.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(devices)
    }

    /// Opens the configured device and starts the output stream. The device name
    /// "default" selects the default output device of the default host.
    pub fn open(config: &config::Audio) -> Result<Engine, Box<dyn Error>> {
        let name = config.device();
        let device = if name == "default" {
            cpal::default_host()
                .default_output_device()
                .ok_or("no default output device")?
        } else {
            match Self::list_cpal_devices()?
                .into_iter()
                .find(|(device_name, _)| device_name.trim() == name)
            {
                Some((_, device)) => device,
                None => return Err(format!("no device found with name {}", name).into()),
            }
        };

        let mixer = Arc::new(Mixer::new(config.sample_rate(), config.channels()));
        let stream_config = cpal::StreamConfig {
            channels: config.channels(),
            sample_rate: config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = {
            let mixer = mixer.clone();
            device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.process(data),
                |err| error!("CPAL output stream error: {}", err),
                None,
            )?
        };
        stream.play()?;

        info!(
            device = name,
            sample_rate = config.sample_rate(),
            channels = config.channels(),
            "Output stream started."
        );

        Ok(Engine {
            name: name.to_string(),
            mixer,
            _stream: stream,
        })
    }
}

impl super::Engine for Engine {
    fn current_time(&self) -> Duration {
        self.mixer.current_time()
    }

    fn create_oscillator(&self, waveform: Waveform, frequency: f32) -> NodeId {
        self.mixer.add_oscillator(waveform, frequency)
    }

    fn create_buffer_player(&self, buffer: Arc<SampleBuffer>) -> NodeId {
        self.mixer.add_buffer(buffer)
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
        write!(
            f,
            "{} (Channels={}, Rate={})",
            self.name,
            self.mixer.channels(),
            self.mixer.sample_rate()
        )
    }
}
