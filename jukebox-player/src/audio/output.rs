//! Audio output using cpal
//!
//! The output stream pulls interleaved f32 samples from a ring buffer filled
//! by the decode thread. Underruns and pauses output silence.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Default output device with a negotiated stream configuration
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl AudioOutput {
    /// Open the default output device, preferring `preferred_rate` so most
    /// tracks play without resampling
    pub fn open_default(preferred_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No audio output device available".to_string()))?;

        let (config, sample_format) = Self::select_config(&device, preferred_rate)?;

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    /// Prefers the track's rate in stereo f32; falls back to the device default
    fn select_config(device: &Device, preferred_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let wanted = SampleRate(preferred_rate);
        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .filter(|c| is_supported_format(c.sample_format()))
            .filter(|c| c.min_sample_rate() <= wanted && c.max_sample_rate() >= wanted)
            .collect();

        let best = supported.into_iter().max_by_key(|c| {
            (
                c.channels() == 2,
                c.sample_format() == SampleFormat::F32,
                c.channels() >= 2,
            )
        });

        if let Some(range) = best {
            let sample_format = range.sample_format();
            return Ok((range.with_sample_rate(wanted).config(), sample_format));
        }

        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        Ok((supported_config.config(), sample_format))
    }

    /// Build a stream that plays samples from `source`
    ///
    /// While `paused` is set the callback writes silence and leaves the ring
    /// untouched. The stream is returned built but not started.
    pub fn build<E>(&self, source: HeapCons<f32>, paused: Arc<AtomicBool>, on_error: E) -> Result<Stream>
    where
        E: FnMut(cpal::StreamError) + Send + 'static,
    {
        match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32, E>(source, paused, on_error),
            SampleFormat::I16 => self.build_stream::<i16, E>(source, paused, on_error),
            SampleFormat::U16 => self.build_stream::<u16, E>(source, paused, on_error),
            sample_format => Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                sample_format
            ))),
        }
    }

    fn build_stream<T, E>(
        &self,
        mut source: HeapCons<f32>,
        paused: Arc<AtomicBool>,
        mut on_error: E,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
        E: FnMut(cpal::StreamError) + Send + 'static,
    {
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if paused.load(Ordering::Acquire) {
                        data.fill(T::EQUILIBRIUM);
                        return;
                    }
                    for slot in data.iter_mut() {
                        *slot = match source.try_pop() {
                            Some(sample) => T::from_sample(sample.clamp(-1.0, 1.0)),
                            None => T::EQUILIBRIUM,
                        };
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    on_error(err);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

/// Start or resume a built stream
pub fn start(stream: &Stream) -> Result<()> {
    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))
}

/// Convert interleaved samples between channel counts
///
/// Mono sources are duplicated and mono targets get the frame average;
/// otherwise leading channels are kept and missing ones get the average.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        let mean = frame.iter().sum::<f32>() / from as f32;
        for channel in 0..to {
            out.push(if to == 1 || channel >= from { mean } else { frame[channel] });
        }
    }
    out
}
