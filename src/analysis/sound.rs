//! # Sound Buffers
//!
//! A [`Sound`] is a mono signal in the range `[-1, 1]` plus its sampling rate.
//! Time conventions follow Praat: the clip spans `0..duration` and sample `i`
//! sits at the centre of its own sampling period, `(i + 0.5) / rate`.
//!
//! ## Rust Concepts:
//! - **hound::WavReader**: typed sample iterators over a WAV file
//! - **Iterator adapters**: `chunks` + `map` + `sum` for mixing channels down
//! - **Result<T, E>**: any malformed input becomes a `PipelineError::Analysis`

use super::fft::Spectral;
use crate::error::PipelineError;
use hound::{SampleFormat, WavReader};
use std::f64::consts::PI;
use std::path::Path;

/// Half-width, in input samples, of the interpolation kernel used for resampling.
const SINC_DEPTH: isize = 50;

#[derive(Debug, Clone)]
pub struct Sound {
    samples: Vec<f64>,
    sample_rate: f64,
}

impl Sound {
    pub fn from_samples(samples: Vec<f64>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Read a WAV file and average its channels into one.
    ///
    /// Integer formats are scaled by `2^(bits - 1)`; float WAVs are taken as is.
    /// A file with no frames is rejected, since none of the measurements are
    /// defined on an empty signal.
    pub fn read_wav(path: &Path) -> Result<Self, PipelineError> {
        let mut reader = WavReader::open(path)
            .map_err(|e| PipelineError::Analysis(format!("Unable to read audio: {}", e)))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f64> = match spec.sample_format {
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f64;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / scale))
                    .collect::<Result<_, _>>()
            }
            SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<_, _>>(),
        }
        .map_err(|e| PipelineError::Analysis(format!("Unable to decode audio samples: {}", e)))?;

        let samples: Vec<f64> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
            .collect();

        if samples.is_empty() {
            return Err(PipelineError::Analysis("Audio file contains no samples".to_string()));
        }

        Ok(Self::from_samples(samples, spec.sample_rate as f64))
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Sampling period in seconds.
    pub fn dx(&self) -> f64 {
        1.0 / self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Time of the first sample centre.
    pub fn x1(&self) -> f64 {
        0.5 * self.dx()
    }

    /// First-order high-pass: `y[i] = x[i] - a * x[i-1]`, `a = exp(-2π f / rate)`.
    pub fn pre_emphasis(&self, from_frequency: f64) -> Self {
        let alpha = (-2.0 * PI * from_frequency / self.sample_rate).exp();
        let mut filtered = Vec::with_capacity(self.samples.len());
        let mut previous = None;
        for &sample in &self.samples {
            filtered.push(match previous {
                Some(p) => sample - alpha * p,
                None => sample,
            });
            previous = Some(sample);
        }
        Self::from_samples(filtered, self.sample_rate)
    }

    /// Resample to `new_rate`, keeping the clip's start and end times.
    ///
    /// Downsampling low-passes in the frequency domain first, then every
    /// output sample is read off a Hann-windowed sinc kernel.
    pub fn resample(&self, new_rate: f64) -> Self {
        let ratio = new_rate / self.sample_rate;
        if self.samples.is_empty() || (ratio - 1.0).abs() < 1e-6 {
            return self.clone();
        }

        let duration = self.duration();
        let count = (duration * new_rate).round() as usize;
        if count == 0 {
            return Self::from_samples(Vec::new(), new_rate);
        }

        let source = if ratio < 1.0 {
            Spectral::new().lowpass(&self.samples, ratio)
        } else {
            self.samples.clone()
        };

        let old_dx = self.dx();
        let new_dx = 1.0 / new_rate;
        let old_x1 = self.x1();
        let new_x1 = 0.5 * (duration - (count - 1) as f64 * new_dx);

        let resampled = (0..count)
            .map(|i| {
                let x = new_x1 + i as f64 * new_dx;
                windowed_sinc(&source, (x - old_x1) / old_dx)
            })
            .collect();

        Self::from_samples(resampled, new_rate)
    }
}

/// Band-limited interpolation of `samples` at fractional index `position`.
fn windowed_sinc(samples: &[f64], position: f64) -> f64 {
    let n = samples.len() as isize;
    let left = position.floor() as isize;
    let fraction = position - left as f64;

    if fraction.abs() < 1e-12 {
        return if (0..n).contains(&left) { samples[left as usize] } else { 0.0 };
    }

    let first = (left - SINC_DEPTH + 1).max(0);
    let last = (left + SINC_DEPTH).min(n - 1);
    let half_width = SINC_DEPTH as f64 + 0.5;

    let mut value = 0.0;
    for i in first..=last {
        let distance = position - i as f64;
        let phase = PI * distance;
        let sinc = phase.sin() / phase;
        let window = 0.5 + 0.5 * (PI * distance / half_width).cos();
        value += samples[i as usize] * sinc * window;
    }
    value
}
