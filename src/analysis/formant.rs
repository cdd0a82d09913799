//! # Formant Tracking
//!
//! Vocal-tract resonances by Burg LPC, the way Praat's "To Formant (burg)"
//! does it:
//!
//! 1. Resample to twice the highest formant of interest, so the all-pole
//!    model only has to explain the band that matters.
//! 2. Pre-emphasize to flatten the glottal spectral tilt.
//! 3. For each frame, apply a Gaussian window twice the nominal window
//!    length, fit an LPC model of order `2 * max_formants` and turn its poles
//!    into (frequency, bandwidth) pairs.
//! 4. Keep the plausible ones, lowest first, and pad with undefined values.
//!
//! Undefined formants are stored as `NaN` and surface as `None` from
//! [`FormantTrack::value_at`].

use super::lpc::{burg, resonances};
use super::sound::Sound;

#[derive(Debug, Clone, Copy)]
pub struct FormantParameters {
    /// Seconds between frames, `0` picks a quarter of `window_length`
    pub time_step: f64,
    pub max_formants: usize,
    pub max_formant_hz: f64,
    /// Nominal window; the effective Gaussian window is twice as long
    pub window_length: f64,
    pub pre_emphasis_from: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FormantTrack {
    start_time: f64,
    time_step: f64,
    max_formants: usize,
    /// `frames[i][k]` is formant `k + 1` of frame `i` in Hz, `NaN` if undefined
    frames: Vec<Vec<f64>>,
}

impl FormantTrack {
    pub fn from_frames(start_time: f64, time_step: f64, max_formants: usize, frames: Vec<Vec<f64>>) -> Self {
        Self {
            start_time,
            time_step,
            max_formants,
            frames,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Frequency of formant `formant` (1-based) at `time`.
    ///
    /// Linear interpolation between the two surrounding frames, except that an
    /// undefined far neighbour falls back to the nearest frame and an
    /// undefined nearest frame yields `None`. Times more than half a frame
    /// outside the analysed range are `None` as well.
    pub fn value_at(&self, formant: usize, time: f64) -> Option<f64> {
        if formant == 0 || formant > self.max_formants || self.frames.is_empty() {
            return None;
        }

        let count = self.frames.len();
        let position = (time - self.start_time) / self.time_step;
        if !position.is_finite() || position < -0.5 || position > count as f64 - 0.5 {
            return None;
        }

        let value = |i: usize| {
            self.frames[i]
                .get(formant - 1)
                .copied()
                .filter(|v| v.is_finite())
        };

        let left = position.floor();
        if left < 0.0 {
            return value(0);
        }
        let left = left as usize;
        if left + 1 >= count {
            return value(count - 1);
        }

        let fraction = position - left as f64;
        let (near, far) = if fraction < 0.5 { (left, left + 1) } else { (left + 1, left) };
        let near_value = value(near)?;
        match value(far) {
            Some(far_value) => {
                let (left_value, right_value) = if near == left {
                    (near_value, far_value)
                } else {
                    (far_value, near_value)
                };
                Some(left_value + fraction * (right_value - left_value))
            }
            None => Some(near_value),
        }
    }
}

pub fn track(sound: &Sound, params: &FormantParameters) -> FormantTrack {
    let max_formants = params.max_formants.clamp(1, 10);
    let window_length = params.window_length.clamp(0.001, 0.1);
    let time_step = if params.time_step > 0.0 {
        params.time_step
    } else {
        window_length / 4.0
    };
    let empty = FormantTrack::from_frames(0.0, time_step, max_formants, Vec::new());

    let target_rate = 2.0 * params.max_formant_hz;
    let resampled = if sound.sample_rate() > target_rate {
        sound.resample(target_rate)
    } else {
        sound.clone()
    };
    let emphasized = if params.pre_emphasis_from > 0.0 {
        resampled.pre_emphasis(params.pre_emphasis_from)
    } else {
        resampled
    };

    let samples = emphasized.samples();
    let sample_rate = emphasized.sample_rate();
    let max_formant_hz = params.max_formant_hz.min(0.5 * sample_rate);
    let dx = emphasized.dx();
    let x1 = emphasized.x1();

    let window_duration = 2.0 * window_length;
    let window_len = (window_duration / dx).floor() as usize;
    let half_window = window_len / 2;
    let duration = emphasized.duration();
    if samples.is_empty() || half_window == 0 || duration < window_duration {
        return empty;
    }

    let frame_count = ((duration - window_duration) / time_step).floor() as usize + 1;
    let t1 = x1 + 0.5 * (duration - dx - (frame_count - 1) as f64 * time_step);
    let window = gaussian_window(2 * half_window);
    let order = 2 * max_formants;
    let nx = samples.len() as isize;

    let frames = (0..frame_count)
        .map(|i| {
            let time = t1 + i as f64 * time_step;
            let left = ((time - x1) / dx).floor() as isize;
            let start = left + 1 - half_window as isize;

            let frame: Vec<f64> = window
                .iter()
                .enumerate()
                .map(|(j, w)| {
                    let index = start + j as isize;
                    if (0..nx).contains(&index) {
                        samples[index as usize] * w
                    } else {
                        0.0
                    }
                })
                .collect();

            let mut formants: Vec<f64> = resonances(&burg(&frame, order), sample_rate)
                .into_iter()
                .filter(|r| {
                    r.frequency > 50.0
                        && r.frequency < max_formant_hz
                        && r.bandwidth > 0.0
                        && r.bandwidth < max_formant_hz
                        && r.bandwidth < 2.0 * r.frequency
                })
                .take(max_formants)
                .map(|r| r.frequency)
                .collect();
            formants.resize(max_formants, f64::NAN);
            formants
        })
        .collect();

    FormantTrack::from_frames(t1, time_step, max_formants, frames)
}

/// Praat's Gaussian analysis window for formants, zero at the edges.
fn gaussian_window(size: usize) -> Vec<f64> {
    let edge = (-12.0f64).exp();
    let middle = 0.5 * (size as f64 - 1.0);
    let denominator = (size as f64 + 1.0).powi(2);
    (0..size)
        .map(|i| {
            let d = i as f64 - middle;
            ((-48.0 * d * d / denominator).exp() - edge) / (1.0 - edge)
        })
        .collect()
}
