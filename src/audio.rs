//! Microphone capture for voice dictation using cpal.
//!
//! Captures at the device's native sample rate and downsamples to the
//! configured recognition rate (default 16kHz mono).

use crate::config::AudioConfig;
use crate::error::{ChatError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A chunk of raw audio samples from the microphone.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples at the target sample rate.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// Audio capture from the system microphone via cpal.
pub struct MicCapture {
    device: cpal::Device,
    stream_config: StreamConfig,
    /// The target sample rate for recognition (e.g. 16kHz).
    target_sample_rate: u32,
}

impl MicCapture {
    /// Create a new capture instance.
    ///
    /// Uses the device's default configuration for maximum compatibility,
    /// then downsamples to the target rate in software.
    ///
    /// # Errors
    ///
    /// Returns an error if no input device is available.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.input_device {
            host.input_devices()
                .map_err(|e| ChatError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| ChatError::Audio(format!("input device '{name}' not found")))?
        } else {
            host.default_input_device()
                .ok_or_else(|| ChatError::Audio("no default input device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using input device: {device_name}");

        let default_config = device
            .default_input_config()
            .map_err(|e| ChatError::Audio(format!("no default input config: {e}")))?;

        let stream_config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            stream_config,
            target_sample_rate: config.input_sample_rate,
        })
    }

    /// Returns `true` if any usable input device exists on this machine.
    pub fn input_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    /// Run the capture loop, sending audio chunks to the provided channel.
    ///
    /// Blocks the calling thread until the cancellation token is triggered,
    /// so run it on a dedicated thread (the cpal stream is not `Send`).
    ///
    /// # Errors
    ///
    /// Returns an error if the audio stream cannot be created.
    pub fn run_blocking(
        &self,
        tx: mpsc::Sender<AudioChunk>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let native_rate = self.stream_config.sample_rate;
        let native_channels = self.stream_config.channels;
        let target_rate = self.target_sample_rate;
        let tx_clone = tx.clone();

        let stream = self
            .device
            .build_input_stream(
                &self.stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mono = if native_channels > 1 {
                        to_mono(data, native_channels)
                    } else {
                        data.to_vec()
                    };

                    let samples = if native_rate != target_rate {
                        downsample(&mono, native_rate, target_rate)
                    } else {
                        mono
                    };

                    let chunk = AudioChunk {
                        samples,
                        sample_rate: target_rate,
                    };
                    // try_send so the audio thread never blocks
                    if tx_clone.try_send(chunk).is_err() {
                        debug!("audio channel full, dropping chunk");
                    }
                },
                move |err| {
                    error!("audio input stream error: {err}");
                },
                None,
            )
            .map_err(|e| ChatError::Audio(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| ChatError::Audio(format!("failed to start input stream: {e}")))?;

        info!(
            "audio capture started: native {}Hz -> target {}Hz",
            native_rate, target_rate
        );

        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(25));
        }

        drop(stream);
        info!("audio capture stopped");
        Ok(())
    }
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Simple linear-interpolation downsampler.
///
/// Sufficient quality for speech (48kHz -> 16kHz); no anti-alias filter
/// needed since speech energy sits below 8kHz.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };

        output.push(sample as f32);
    }

    output
}
