//! Streaming sample rate conversion using rubato
//!
//! Decoded blocks arrive in whatever size the codec produces; rubato's
//! fixed-input resampler wants exact chunks. [`StreamResampler`] buffers the
//! planar input and emits output whenever a full chunk is available.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Input frames per rubato chunk
const CHUNK_FRAMES: usize = 1024;

pub struct StreamResampler {
    inner: FastFixedIn<f32>,
    channels: usize,
    /// Planar input not yet consumed by the resampler
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(Error::Decode(format!(
                "Invalid resampler parameters: {}Hz -> {}Hz, {} channels",
                input_rate, output_rate, channels
            )));
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels)",
            input_rate, output_rate, channels
        );

        let inner = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            CHUNK_FRAMES,
            channels,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        Ok(Self {
            inner,
            channels,
            pending: vec![Vec::new(); channels],
        })
    }

    /// Feed interleaved samples; returns whatever output is ready
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        for frame in interleaved.chunks_exact(self.channels) {
            for (channel, sample) in self.pending.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        let mut output = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }

            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();

            let planar = self
                .inner
                .process(&chunk, None)
                .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
            interleave_into(&planar, &mut output);
        }
        Ok(output)
    }

    /// Resample the buffered tail at end of stream
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let mut output = Vec::new();
        if self.pending[0].is_empty() {
            return Ok(output);
        }

        let planar = self
            .inner
            .process_partial(Some(self.pending.as_slice()), None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
        for channel in self.pending.iter_mut() {
            channel.clear();
        }
        interleave_into(&planar, &mut output);
        Ok(output)
    }
}

/// Append planar channels to `out` as interleaved frames
fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    let Some(frames) = planar.first().map(Vec::len) else {
        return;
    };
    out.reserve(frames * planar.len());
    for frame in 0..frames {
        for channel in planar {
            out.push(channel[frame]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave() {
        let planar = vec![vec![1.0, 3.0], vec![2.0, 4.0]];
        let mut out = Vec::new();
        interleave_into(&planar, &mut out);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_upsample_length() {
        let mut resampler = StreamResampler::new(22050, 44100, 2).unwrap();

        // One second of stereo audio fed in uneven blocks
        let input = vec![0.25f32; 22050 * 2];
        let mut output = Vec::new();
        for block in input.chunks(1152 * 2) {
            output.extend(resampler.process(block).unwrap());
        }
        output.extend(resampler.flush().unwrap());

        assert_eq!(output.len() % 2, 0);
        let frames = output.len() / 2;
        // Roughly doubled; the resampler's delay eats a little at the end
        assert!(frames > 42000 && frames <= 46000, "got {} frames", frames);
    }

    #[test]
    fn test_small_blocks_are_buffered() {
        let mut resampler = StreamResampler::new(48000, 44100, 1).unwrap();
        let output = resampler.process(&[0.0; 100]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(StreamResampler::new(0, 44100, 2).is_err());
        assert!(StreamResampler::new(44100, 48000, 0).is_err());
    }
}
