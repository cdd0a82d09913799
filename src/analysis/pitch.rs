//! # Pitch Tracking
//!
//! Fundamental frequency by short-term autocorrelation (Boersma 1993, Praat's
//! "To Pitch (ac)"):
//!
//! 1. Cut the signal into overlapping Hanning-windowed frames, three periods
//!    of the pitch floor long.
//! 2. Divide each frame's autocorrelation by the window's own autocorrelation,
//!    which undoes the taper and leaves a periodic signal peaking near 1.
//! 3. Every local maximum above half the voicing threshold becomes a
//!    candidate, its lag refined by fitting a parabola through the peak.
//! 4. A Viterbi pass picks one candidate per frame, trading candidate strength
//!    against octave jumps and voiced/unvoiced transitions.
//!
//! The result is a [`PitchTrack`] where unvoiced frames carry frequency `0`.
//!
//! ## Rust Concepts:
//! - **Small `Copy` structs** (`Candidate`) moved around by value in hot loops
//! - **`Vec<Vec<f64>>`** score tables for the dynamic programming pass
//! - **`impl Iterator`** return types so callers filter frames lazily

use super::fft::Spectral;
use super::sound::Sound;
use std::f64::consts::PI;

const PERIODS_PER_WINDOW: f64 = 3.0;
const MAX_CANDIDATES: usize = 15;
const SILENCE_THRESHOLD: f64 = 0.03;
const VOICING_THRESHOLD: f64 = 0.45;
const OCTAVE_COST: f64 = 0.01;
const OCTAVE_JUMP_COST: f64 = 0.35;
const VOICED_UNVOICED_COST: f64 = 0.14;

/// User-facing knobs; everything else uses Praat's standard values.
#[derive(Debug, Clone, Copy)]
pub struct PitchParameters {
    /// Seconds between frames, `0` picks `0.75 / floor`
    pub time_step: f64,
    pub floor: f64,
    pub ceiling: f64,
}

/// One analysis frame of the final track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchPoint {
    pub time: f64,
    /// Hz, `0` when the frame is unvoiced
    pub frequency: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PitchTrack {
    points: Vec<PitchPoint>,
}

impl PitchTrack {
    /// Build a track from parallel time and frequency columns.
    pub fn from_frames(times: Vec<f64>, frequencies: Vec<f64>) -> Self {
        let points = times
            .into_iter()
            .zip(frequencies)
            .map(|(time, frequency)| PitchPoint { time, frequency })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[PitchPoint] {
        &self.points
    }

    /// Frames with a positive, finite frequency, in time order.
    pub fn voiced(&self) -> impl Iterator<Item = &PitchPoint> + '_ {
        self.points
            .iter()
            .filter(|p| p.frequency.is_finite() && p.frequency > 0.0)
    }

    pub fn mean(&self) -> Option<f64> {
        let (count, sum) = self
            .voiced()
            .fold((0usize, 0.0), |(n, s), p| (n + 1, s + p.frequency));
        (count > 0).then(|| sum / count as f64)
    }

    /// Sample standard deviation of the voiced frames (needs two of them).
    pub fn standard_deviation(&self) -> Option<f64> {
        let values: Vec<f64> = self.voiced().map(|p| p.frequency).collect();
        if values.len() < 2 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (values.len() - 1) as f64;
        Some(variance.sqrt())
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    frequency: f64,
    strength: f64,
}

impl Candidate {
    const UNVOICED: Candidate = Candidate {
        frequency: 0.0,
        strength: 0.0,
    };
}

struct Frame {
    candidates: Vec<Candidate>,
    /// Local peak relative to the global peak, `0..=1`
    intensity: f64,
}

/// Frame geometry shared by every frame of one analysis.
struct Layout {
    half_window: usize,
    window_len: usize,
    period_len: usize,
    half_period: usize,
    min_lag: usize,
    max_lag: usize,
    /// Largest lag at which the normalized autocorrelation is evaluated
    max_r_lag: usize,
    max_candidates: usize,
}

pub fn track(sound: &Sound, params: &PitchParameters) -> PitchTrack {
    let floor = params.floor.max(10.0);
    let ceiling = params.ceiling.min(0.5 * sound.sample_rate());
    let dt = if params.time_step > 0.0 {
        params.time_step
    } else {
        PERIODS_PER_WINDOW / floor / 4.0
    };

    let dx = sound.dx();
    let samples = sound.samples();

    let window_duration = PERIODS_PER_WINDOW / floor;
    let half_window = ((window_duration / dx).floor() as usize / 2).saturating_sub(1);
    if half_window < 2 {
        return PitchTrack::default();
    }
    let window_len = 2 * half_window;
    let period_len = (1.0 / dx / floor).floor() as usize;

    let duration = sound.duration();
    if duration < window_duration {
        return PitchTrack::default();
    }
    let frame_count = ((duration - window_duration) / dt).floor() as usize + 1;
    let t1 = 0.5 * duration - 0.5 * frame_count as f64 * dt + 0.5 * dt;

    let layout = Layout {
        half_window,
        window_len,
        period_len,
        half_period: period_len / 2 + 1,
        min_lag: ((1.0 / dx / ceiling).floor() as usize).max(2),
        max_lag: ((window_len as f64 / PERIODS_PER_WINDOW).floor() as usize + 2).min(window_len),
        max_r_lag: window_len / 2,
        max_candidates: MAX_CANDIDATES.max((ceiling / floor).floor() as usize),
    };

    let mean = samples.iter().sum::<f64>() / samples.len().max(1) as f64;
    let global_peak = samples.iter().map(|s| (s - mean).abs()).fold(0.0, f64::max);
    if global_peak == 0.0 {
        return PitchTrack::default();
    }

    let window: Vec<f64> = (0..window_len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * (i + 1) as f64 / (window_len + 1) as f64).cos())
        .collect();

    let mut spectral = Spectral::new();
    let window_ac = spectral.autocorrelation(&window);
    let window_r: Vec<f64> = window_ac.iter().map(|v| v / window_ac[0]).collect();

    let mut frames: Vec<Frame> = (0..frame_count)
        .map(|i| {
            let time = t1 + i as f64 * dt;
            analyze_frame(sound, time, floor, global_peak, &layout, &window, &window_r, &mut spectral)
        })
        .collect();

    find_path(&mut frames, ceiling, dt);

    let times = (0..frame_count).map(|i| t1 + i as f64 * dt).collect();
    let frequencies = frames
        .iter()
        .map(|frame| {
            let winner = frame.candidates[0];
            if winner.frequency > 0.0 && winner.frequency < ceiling {
                winner.frequency
            } else {
                0.0
            }
        })
        .collect();
    PitchTrack::from_frames(times, frequencies)
}

#[allow(clippy::too_many_arguments)]
fn analyze_frame(
    sound: &Sound,
    time: f64,
    floor: f64,
    global_peak: f64,
    layout: &Layout,
    window: &[f64],
    window_r: &[f64],
    spectral: &mut Spectral,
) -> Frame {
    let samples = sound.samples();
    let dx = sound.dx();
    let nx = samples.len() as isize;

    let left = ((time - sound.x1()) / dx).floor() as isize;
    let right = left + 1;

    // local mean over one longest period on either side
    let mean_start = (right - layout.period_len as isize).max(0);
    let mean_end = (left + layout.period_len as isize).min(nx - 1);
    let local_mean = if mean_end >= mean_start {
        let span = &samples[mean_start as usize..=mean_end as usize];
        span.iter().sum::<f64>() / span.len() as f64
    } else {
        0.0
    };

    let start = right - layout.half_window as isize;
    let frame: Vec<f64> = (0..layout.window_len)
        .map(|j| {
            let index = start + j as isize;
            if (0..nx).contains(&index) {
                (samples[index as usize] - local_mean) * window[j]
            } else {
                0.0
            }
        })
        .collect();

    let peak_start = layout.half_window.saturating_sub(layout.half_period);
    let peak_end = (layout.half_window + layout.half_period).min(layout.window_len);
    let local_peak = frame[peak_start..peak_end]
        .iter()
        .map(|v| v.abs())
        .fold(0.0, f64::max);
    let intensity = (local_peak / global_peak).min(1.0);

    let mut candidates = vec![Candidate::UNVOICED];
    if local_peak == 0.0 {
        return Frame {
            candidates,
            intensity,
        };
    }

    let ac = spectral.autocorrelation(&frame);
    if ac[0] <= 0.0 {
        return Frame {
            candidates,
            intensity,
        };
    }

    let mut r = vec![0.0; layout.max_r_lag + 2];
    r[0] = 1.0;
    for lag in 1..r.len().min(ac.len()) {
        if window_r[lag].abs() > 1e-10 {
            r[lag] = ac[lag] / (ac[0] * window_r[lag]);
        }
    }

    let upper = layout.max_lag.min(layout.max_r_lag + 1);
    for lag in layout.min_lag..upper {
        let (prev, here, next) = (r[lag - 1], r[lag], r[lag + 1]);
        if here <= 0.5 * VOICING_THRESHOLD || here <= prev || here < next {
            continue;
        }

        let slope = 0.5 * (next - prev);
        let curvature = 2.0 * here - prev - next;
        if curvature <= 0.0 {
            continue;
        }

        let refined_lag = lag as f64 + slope / curvature;
        let frequency = 1.0 / dx / refined_lag;
        let mut strength = here + 0.5 * slope * slope / curvature;
        if strength > 1.0 {
            strength = 1.0 / strength;
        }

        let place = if candidates.len() < layout.max_candidates {
            candidates.push(Candidate::UNVOICED);
            Some(candidates.len() - 1)
        } else {
            weakest_candidate(&candidates, floor)
                .filter(|&(_, weakest)| strength - OCTAVE_COST * (floor / frequency).log2() > weakest)
                .map(|(index, _)| index)
        };

        if let Some(index) = place {
            candidates[index] = Candidate { frequency, strength };
        }
    }

    Frame {
        candidates,
        intensity,
    }
}

/// Index and octave-weighted strength of the weakest voiced candidate.
fn weakest_candidate(candidates: &[Candidate], floor: f64) -> Option<(usize, f64)> {
    candidates
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, c)| (i, c.strength - OCTAVE_COST * (floor / c.frequency).log2()))
        .fold(None, |weakest, (i, score)| match weakest {
            Some((_, best)) if best <= score => weakest,
            _ => Some((i, score)),
        })
}

/// Viterbi search over the candidates; moves each frame's winner to index 0.
fn find_path(frames: &mut [Frame], ceiling: f64, dt: f64) {
    if frames.is_empty() {
        return;
    }

    let correction = 0.01 / dt;
    let jump_cost = OCTAVE_JUMP_COST * correction;
    let voicing_cost = VOICED_UNVOICED_COST * correction;
    let is_unvoiced = |f: f64| f <= 0.0 || f >= ceiling;

    let mut delta: Vec<Vec<f64>> = frames
        .iter()
        .map(|frame| {
            let unvoiced_strength = VOICING_THRESHOLD
                + (2.0 - frame.intensity / (SILENCE_THRESHOLD / (1.0 + VOICING_THRESHOLD))).max(0.0);
            frame
                .candidates
                .iter()
                .map(|c| {
                    if is_unvoiced(c.frequency) {
                        unvoiced_strength
                    } else {
                        c.strength - OCTAVE_COST * (ceiling / c.frequency).log2()
                    }
                })
                .collect()
        })
        .collect();
    let mut psi: Vec<Vec<usize>> = frames.iter().map(|f| vec![0; f.candidates.len()]).collect();

    for i in 1..frames.len() {
        for to in 0..frames[i].candidates.len() {
            let f2 = frames[i].candidates[to].frequency;
            let mut best = f64::NEG_INFINITY;
            let mut best_from = 0;

            for (from, previous) in frames[i - 1].candidates.iter().enumerate() {
                let f1 = previous.frequency;
                let transition = match (is_unvoiced(f1), is_unvoiced(f2)) {
                    (true, true) => 0.0,
                    (false, false) => jump_cost * (f1 / f2).log2().abs(),
                    _ => voicing_cost,
                };
                let score = delta[i - 1][from] - transition + delta[i][to];
                if score > best {
                    best = score;
                    best_from = from;
                }
            }

            delta[i][to] = best;
            psi[i][to] = best_from;
        }
    }

    let last = frames.len() - 1;
    let mut place = delta[last]
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &score)| if score > best.1 { (i, score) } else { best })
        .0;

    for i in (0..frames.len()).rev() {
        let previous = psi[i][place];
        frames[i].candidates.swap(0, place);
        place = previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sine;

    fn default_params() -> PitchParameters {
        PitchParameters {
            time_step: 0.0,
            floor: 75.0,
            ceiling: 600.0,
        }
    }

    #[test]
    fn test_pure_tone_mean_is_close() {
        let sound = Sound::from_samples(sine(220.0, 16000.0, 1.0, 0.5), 16000.0);
        let pitch = track(&sound, &default_params());

        assert!(!pitch.points().is_empty());
        let voiced = pitch.voiced().count();
        assert!(voiced > pitch.points().len() / 2, "only {} voiced frames", voiced);

        let mean = pitch.mean().unwrap();
        assert!((mean - 220.0).abs() < 2.0, "mean pitch {} Hz", mean);
    }

    #[test]
    fn test_silence_has_no_voiced_frames() {
        let sound = Sound::from_samples(vec![0.0; 32000], 16000.0);
        let pitch = track(&sound, &default_params());
        assert_eq!(pitch.voiced().count(), 0);
        assert_eq!(pitch.mean(), None);
    }

    #[test]
    fn test_tone_then_silence_marks_unvoiced_frames() {
        let mut samples = sine(150.0, 16000.0, 0.5, 0.5);
        samples.extend(std::iter::repeat(0.0).take(8000));
        let sound = Sound::from_samples(samples, 16000.0);
        let pitch = track(&sound, &default_params());

        assert!(pitch.voiced().count() > 0);
        assert!(pitch.points().iter().any(|p| p.frequency == 0.0));
        assert!(pitch.voiced().all(|p| p.frequency > 0.0 && p.time < 0.6));
    }

    #[test]
    fn test_frame_times_are_increasing() {
        let sound = Sound::from_samples(sine(200.0, 16000.0, 0.5, 0.3), 16000.0);
        let pitch = track(&sound, &default_params());
        let times: Vec<f64> = pitch.points().iter().map(|p| p.time).collect();
        assert!(times.windows(2).all(|w| w[1] > w[0]));
        assert!(times[0] > 0.0 && *times.last().unwrap() < 0.5);
    }

    #[test]
    fn test_too_short_clip_gives_empty_track() {
        let sound = Sound::from_samples(sine(200.0, 16000.0, 0.01, 0.5), 16000.0);
        assert!(track(&sound, &default_params()).points().is_empty());
    }

    #[test]
    fn test_standard_deviation_needs_two_frames() {
        let track = PitchTrack::from_frames(vec![0.1, 0.2], vec![200.0, 0.0]);
        assert_eq!(track.standard_deviation(), None);
        let track = PitchTrack::from_frames(vec![0.1, 0.2, 0.3], vec![200.0, 0.0, 210.0]);
        let sd = track.standard_deviation().unwrap();
        assert!((sd - 7.0711).abs() < 1e-3);
    }
}
