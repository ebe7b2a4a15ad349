use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

use crate::ingest::AudioIngest;

/// Live input stream feeding an [`AudioIngest`]. Dropping it stops capture.
pub struct AudioCapture {
    _stream: cpal::Stream,
    pub device_name: String,
}

pub struct InputDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    pub name: String,
}

impl InputDevice {
    /// Opens `name` (or the default input) and asks for `channels` channels,
    /// settling for what the device offers when it cannot provide them.
    pub fn open(name: Option<&str>, channels: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, name)?;
        let resolved_name = device
            .name()
            .unwrap_or_else(|_| "<unknown input>".to_string());
        let default = device
            .default_input_config()
            .with_context(|| format!("Could not query default input of '{resolved_name}'"))?;
        let sample_format = default.sample_format();
        let mut config: cpal::StreamConfig = default.into();

        let wanted = channels as u16;
        if config.channels != wanted {
            if supports_channels(&device, wanted, sample_format, config.sample_rate) {
                config.channels = wanted;
            } else {
                log::warn!(
                    "'{resolved_name}' cannot capture {wanted} channels, using {}",
                    config.channels
                );
            }
        }

        log::info!(
            "Input device: {resolved_name} ({} Hz, {} channels, {:?})",
            config.sample_rate.0,
            config.channels,
            sample_format
        );
        Ok(Self {
            device,
            config,
            sample_format,
            name: resolved_name,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    pub fn start(self, ingest: AudioIngest) -> Result<AudioCapture> {
        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(ingest)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(ingest)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(ingest)?,
            other => bail!("Unsupported sample format: {other:?}"),
        };
        stream.play().context("Failed to start audio capture")?;

        Ok(AudioCapture {
            _stream: stream,
            device_name: self.name,
        })
    }

    fn build_stream<T>(&self, mut ingest: AudioIngest) -> Result<cpal::Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let stride = self.config.channels as usize;
        let err_fn = |err| log::error!("Audio stream error: {err}");
        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| ingest.process(data, stride),
                err_fn,
                None,
            )
            .with_context(|| format!("Failed to build {:?} input stream", self.sample_format))
    }
}

fn supports_channels(
    device: &cpal::Device,
    channels: u16,
    format: cpal::SampleFormat,
    rate: cpal::SampleRate,
) -> bool {
    device
        .supported_input_configs()
        .map(|mut configs| {
            configs.any(|range| {
                range.channels() == channels
                    && range.sample_format() == format
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
        })
        .unwrap_or(false)
}

fn select_input_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    if let Some(target) = name {
        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name == target {
                        return Ok(device);
                    }
                }
            }
        }
        bail!("Input device '{target}' not found");
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("No audio input device available"))
}

pub fn list_input_device_names() -> Vec<String> {
    let host = cpal::default_host();
    host.input_devices()
        .map(|devices| {
            devices
                .filter_map(|d| d.name().ok())
                .collect::<Vec<String>>()
        })
        .unwrap_or_default()
}
