//! Harmonics-to-noise ratio by forward cross-correlation ("To Harmonicity (cc)").
//!
//! Each frame compares a window of `periods_per_window` longest periods with
//! itself shifted by every lag up to one longest period. The best normalized
//! correlation `r` is the harmonic share of the energy, so
//! `HNR = 10 * log10(r / (1 - r))` dB. Frames judged silent get -200 dB, the
//! conventional "undefined" value, and are ignored by [`HarmonicityTrack::mean`].

use super::sound::Sound;

/// Marker for frames without a harmonicity value.
pub const SILENT_DB: f64 = -200.0;
const LIMIT_DB: f64 = 150.0;

#[derive(Debug, Clone, Copy)]
pub struct HarmonicityParameters {
    pub time_step: f64,
    pub min_pitch: f64,
    pub silence_threshold: f64,
    pub periods_per_window: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HarmonicityTrack {
    values: Vec<f64>,
}

impl HarmonicityTrack {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// HNR in dB per frame; silent frames hold [`SILENT_DB`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mean over frames that are not silent.
    pub fn mean(&self) -> Option<f64> {
        let defined: Vec<f64> = self.values.iter().copied().filter(|&v| v > SILENT_DB + 1.0).collect();
        if defined.is_empty() {
            None
        } else {
            Some(defined.iter().sum::<f64>() / defined.len() as f64)
        }
    }
}

pub fn track(sound: &Sound, params: &HarmonicityParameters) -> HarmonicityTrack {
    let rate = sound.sample_rate();
    let samples = sound.samples();
    let time_step = if params.time_step > 0.0 {
        params.time_step
    } else {
        0.25 * params.periods_per_window / params.min_pitch
    };

    let max_lag = (rate / params.min_pitch).ceil() as usize;
    let window_len = ((params.periods_per_window * rate / params.min_pitch).round() as usize).max(2);
    let span = window_len + max_lag;
    if params.min_pitch <= 0.0 || samples.len() < span || max_lag < 3 {
        return HarmonicityTrack::default();
    }

    let duration = sound.duration();
    let span_duration = span as f64 * sound.dx();
    let frame_count = ((duration - span_duration) / time_step).floor() as usize + 1;
    let t1 = 0.5 * duration - 0.5 * frame_count as f64 * time_step + 0.5 * time_step;

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let global_peak = samples.iter().map(|s| (s - mean).abs()).fold(0.0, f64::max);
    if global_peak == 0.0 {
        return HarmonicityTrack::from_values(vec![SILENT_DB; frame_count]);
    }

    let last_start = samples.len() - span;
    let values = (0..frame_count)
        .map(|i| {
            let time = t1 + i as f64 * time_step;
            let centre = ((time - sound.x1()) / sound.dx()).round() as isize;
            let start = (centre - (span / 2) as isize).clamp(0, last_start as isize) as usize;
            frame_hnr(&samples[start..start + span], window_len, max_lag, global_peak, params.silence_threshold)
        })
        .collect();

    HarmonicityTrack::from_values(values)
}

fn frame_hnr(segment: &[f64], window_len: usize, max_lag: usize, global_peak: f64, silence_threshold: f64) -> f64 {
    let local_mean = segment.iter().sum::<f64>() / segment.len() as f64;
    let x: Vec<f64> = segment.iter().map(|s| s - local_mean).collect();

    let local_peak = x.iter().map(|v| v.abs()).fold(0.0, f64::max);
    let intensity = (local_peak / global_peak).min(1.0);
    let unvoiced_strength = if silence_threshold > 0.0 {
        (2.0 - intensity / silence_threshold).max(0.0)
    } else {
        0.0
    };
    if local_peak == 0.0 {
        return SILENT_DB;
    }

    let head = &x[..window_len];
    let head_energy: f64 = head.iter().map(|v| v * v).sum();
    let correlation: Vec<f64> = (0..=max_lag)
        .map(|lag| {
            let shifted = &x[lag..lag + window_len];
            let energy: f64 = shifted.iter().map(|v| v * v).sum();
            let denominator = (head_energy * energy).sqrt();
            if denominator > 0.0 {
                head.iter().zip(shifted).map(|(a, b)| a * b).sum::<f64>() / denominator
            } else {
                0.0
            }
        })
        .collect();

    let best = (2..max_lag)
        .filter(|&lag| correlation[lag] > correlation[lag - 1] && correlation[lag] >= correlation[lag + 1])
        .map(|lag| {
            let (prev, here, next) = (correlation[lag - 1], correlation[lag], correlation[lag + 1]);
            let curvature = 2.0 * here - prev - next;
            if curvature > 0.0 {
                let slope = 0.5 * (next - prev);
                (here + 0.5 * slope * slope / curvature).min(1.0)
            } else {
                here
            }
        })
        .fold(f64::NEG_INFINITY, f64::max);

    if !best.is_finite() || best <= 0.0 || best <= unvoiced_strength {
        return SILENT_DB;
    }
    to_decibels(best)
}

fn to_decibels(r: f64) -> f64 {
    if r <= 1e-15 {
        -LIMIT_DB
    } else if r >= 1.0 - 1e-15 {
        LIMIT_DB
    } else {
        10.0 * (r / (1.0 - r)).log10()
    }
}
