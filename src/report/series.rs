//! Shaping raw measurements into the response body.
//!
//! Two contracts exist and a deployment picks one through
//! `analysis.output`:
//!
//! - `time_series`: voiced pitch points plus F1..F3 sampled at a fixed cadence
//! - `summary`: one rounded mean per measurement
//!
//! Both produce a [`ReportValue`] that still needs [`ReportValue::sanitize`].

use super::ReportValue;
use crate::analysis::Measurements;
use serde::{Deserialize, Serialize};

/// Which response contract the service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    TimeSeries,
    Summary,
}

/// Formants reported to clients (F1, F2, F3).
const REPORTED_FORMANTS: [(usize, &str); 3] = [(1, "f1"), (2, "f2"), (3, "f3")];

pub fn shape(measurements: &Measurements, mode: OutputMode, samples_per_second: f64) -> ReportValue {
    match mode {
        OutputMode::TimeSeries => time_series(measurements, samples_per_second),
        OutputMode::Summary => summary(measurements, samples_per_second),
    }
}

/// Number of formant samples for a clip: `max(1, floor(duration * rate))`.
pub fn formant_sample_count(duration: f64, samples_per_second: f64) -> usize {
    let raw = (duration * samples_per_second).floor();
    if raw.is_finite() && raw >= 1.0 {
        raw as usize
    } else {
        1
    }
}

/// `count` evenly spaced times from 0 to `duration`, both ends included.
pub fn sample_times(duration: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        n => {
            let step = duration / (n - 1) as f64;
            (0..n).map(|i| i as f64 * step).collect()
        }
    }
}

fn time_series(measurements: &Measurements, samples_per_second: f64) -> ReportValue {
    // unvoiced frames are omitted, never nulled
    let pitch = measurements
        .pitch
        .voiced()
        .map(|point| point_value(point.time, ReportValue::Number(point.frequency)))
        .collect();

    let times = sample_times(
        measurements.duration,
        formant_sample_count(measurements.duration, samples_per_second),
    );

    let mut entries = vec![("pitch".to_string(), ReportValue::List(pitch))];
    for (formant, key) in REPORTED_FORMANTS {
        let series = times
            .iter()
            .map(|&t| point_value(t, ReportValue::optional(measurements.formants.value_at(formant, t))))
            .collect();
        entries.push((key.to_string(), ReportValue::List(series)));
    }
    entries.push(("hnr".to_string(), harmonicity_mean(measurements)));

    ReportValue::Map(entries)
}

fn summary(measurements: &Measurements, samples_per_second: f64) -> ReportValue {
    let times = sample_times(
        measurements.duration,
        formant_sample_count(measurements.duration, samples_per_second),
    );

    let mut entries = vec![
        ("pitch".to_string(), rounded(measurements.pitch.mean())),
        ("pitch_sd".to_string(), rounded(measurements.pitch.standard_deviation())),
    ];
    for (formant, key) in REPORTED_FORMANTS {
        let samples: Vec<f64> = times
            .iter()
            .filter_map(|&t| measurements.formants.value_at(formant, t))
            .collect();
        entries.push((key.to_string(), rounded(finite_mean(&samples))));
    }
    let hnr = measurements.harmonicity.as_ref().and_then(|h| h.mean());
    entries.push(("hnr".to_string(), rounded(hnr)));

    ReportValue::Map(entries)
}

fn point_value(x: f64, y: ReportValue) -> ReportValue {
    ReportValue::map(vec![("x", ReportValue::Number(x)), ("y", y)])
}

fn harmonicity_mean(measurements: &Measurements) -> ReportValue {
    ReportValue::optional(measurements.harmonicity.as_ref().and_then(|h| h.mean()))
}

/// Mean of the finite values, `None` when there are none.
pub fn finite_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        None
    } else {
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}

fn rounded(value: Option<f64>) -> ReportValue {
    ReportValue::optional(value.map(|v| (v * 100.0).round() / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FormantTrack, HarmonicityTrack, PitchTrack};

    fn fake_measurements(duration: f64) -> Measurements {
        // frames every 10 ms, voiced in the middle only
        let times: Vec<f64> = (0..20).map(|i| 0.05 + i as f64 * 0.01).collect();
        let frequencies: Vec<f64> = (0..20)
            .map(|i| if (5..15).contains(&i) { 200.0 + i as f64 } else { 0.0 })
            .collect();
        let pitch = PitchTrack::from_frames(times, frequencies);

        let formant_frames = (0..((duration / 0.01) as usize))
            .map(|_| vec![500.0, 1500.0, f64::NAN])
            .collect();
        let formants = FormantTrack::from_frames(0.005, 0.01, 3, formant_frames);

        Measurements {
            duration,
            pitch,
            formants,
            harmonicity: Some(HarmonicityTrack::from_values(vec![-200.0, 10.0, 20.0])),
        }
    }

    #[test]
    fn test_formant_sample_count_has_floor_of_one() {
        assert_eq!(formant_sample_count(2.0, 25.0), 50);
        assert_eq!(formant_sample_count(1.99, 25.0), 49);
        assert_eq!(formant_sample_count(0.01, 25.0), 1);
        assert_eq!(formant_sample_count(0.0, 25.0), 1);
    }

    #[test]
    fn test_sample_times_include_both_ends() {
        assert_eq!(sample_times(1.0, 1), vec![0.0]);
        let times = sample_times(2.0, 5);
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_time_series_drops_unvoiced_frames() {
        let report = shape(&fake_measurements(1.0), OutputMode::TimeSeries, 25.0).sanitize();
        let pitch = match report.get("pitch") {
            Some(ReportValue::List(points)) => points.clone(),
            other => panic!("unexpected pitch value: {:?}", other),
        };
        assert_eq!(pitch.len(), 10);
        for point in &pitch {
            match point.get("y") {
                Some(ReportValue::Number(y)) => assert!(*y > 0.0),
                other => panic!("unexpected y: {:?}", other),
            }
        }
    }

    #[test]
    fn test_time_series_formant_lengths_and_nulls() {
        let report = shape(&fake_measurements(1.0), OutputMode::TimeSeries, 25.0).sanitize();
        for key in ["f1", "f2", "f3"] {
            match report.get(key) {
                Some(ReportValue::List(points)) => assert_eq!(points.len(), 25, "{}", key),
                other => panic!("unexpected {}: {:?}", key, other),
            }
        }
        // F3 is undefined in every frame
        if let Some(ReportValue::List(points)) = report.get("f3") {
            assert!(points.iter().all(|p| p.get("y") == Some(&ReportValue::Null)));
        }
        assert_eq!(report.get("hnr"), Some(&ReportValue::Number(15.0)));
    }

    #[test]
    fn test_summary_rounds_and_skips_undefined() {
        let report = shape(&fake_measurements(1.0), OutputMode::Summary, 25.0).sanitize();
        assert_eq!(report.get("pitch"), Some(&ReportValue::Number(209.5)));
        assert_eq!(report.get("f1"), Some(&ReportValue::Number(500.0)));
        assert_eq!(report.get("f2"), Some(&ReportValue::Number(1500.0)));
        assert_eq!(report.get("f3"), Some(&ReportValue::Null));
        assert_eq!(report.get("hnr"), Some(&ReportValue::Number(15.0)));
        match report.get("pitch_sd") {
            Some(ReportValue::Number(sd)) => assert!((sd - 3.03).abs() < 0.01),
            other => panic!("unexpected pitch_sd: {:?}", other),
        }
    }

    #[test]
    fn test_finite_mean() {
        assert_eq!(finite_mean(&[]), None);
        assert_eq!(finite_mean(&[f64::NAN, f64::INFINITY]), None);
        assert_eq!(finite_mean(&[1.0, f64::NAN, 3.0]), Some(2.0));
    }
}
