//! # Acoustic Analysis
//!
//! Everything the service measures about a recording lives behind the
//! [`AcousticAnalyzer`] trait: given a path to a canonical WAV file it returns
//! [`Measurements`] (pitch track, formant track and optionally harmonicity).
//! The HTTP layer never talks to the algorithms directly, which is what lets
//! handler tests swap in a stand-in analyzer.
//!
//! The production implementation, [`PraatAnalyzer`], follows Praat's
//! standard analyses so results line up with what phoneticians expect:
//! - `pitch`: autocorrelation pitch tracker with Viterbi path finding
//! - `formant`: Burg LPC formants on a resampled, pre-emphasized signal
//! - `harmonicity`: cross-correlation harmonics-to-noise ratio
//!
//! ## Rust Concepts:
//! - **Trait objects**: `Arc<dyn AcousticAnalyzer>` stored in shared state
//! - **`Send + Sync` bounds**: the analyzer runs on actix's blocking pool
//! - **Plain data structs**: `Measurements` owns its tracks, no lifetimes needed

pub mod fft;
pub mod formant;
pub mod harmonicity;
pub mod lpc;
pub mod pitch;
pub mod sound;

use crate::config::AnalysisConfig;
use crate::error::PipelineError;
use std::path::Path;
use tracing::debug;

pub use formant::{FormantParameters, FormantTrack};
pub use harmonicity::{HarmonicityParameters, HarmonicityTrack};
pub use pitch::{PitchParameters, PitchTrack};
pub use sound::Sound;

/// Raw measurements for one recording.
#[derive(Debug, Clone)]
pub struct Measurements {
    /// Seconds
    pub duration: f64,
    pub pitch: PitchTrack,
    pub formants: FormantTrack,
    /// `None` when harmonicity is switched off
    pub harmonicity: Option<HarmonicityTrack>,
}

/// Capability that turns a canonical WAV file into measurements.
pub trait AcousticAnalyzer: Send + Sync {
    fn analyze(&self, path: &Path) -> Result<Measurements, PipelineError>;
}

/// Praat-compatible pitch, formant and harmonicity analysis.
#[derive(Debug, Clone)]
pub struct PraatAnalyzer {
    pitch: PitchParameters,
    formant: FormantParameters,
    harmonicity: Option<HarmonicityParameters>,
}

impl PraatAnalyzer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            pitch: PitchParameters {
                time_step: config.pitch_time_step,
                floor: config.pitch_floor,
                ceiling: config.pitch_ceiling,
            },
            formant: FormantParameters {
                time_step: config.formant_time_step,
                max_formants: config.max_formants,
                max_formant_hz: config.max_formant_hz,
                window_length: config.formant_window,
                pre_emphasis_from: config.pre_emphasis_from,
            },
            harmonicity: config.harmonicity.then_some(HarmonicityParameters {
                time_step: config.hnr_time_step,
                min_pitch: config.hnr_min_pitch,
                silence_threshold: config.hnr_silence_threshold,
                periods_per_window: config.hnr_periods_per_window,
            }),
        }
    }

    /// Run every configured analysis on an in-memory sound.
    pub fn measure(&self, sound: &Sound) -> Measurements {
        let pitch = pitch::track(sound, &self.pitch);
        let formants = formant::track(sound, &self.formant);
        let harmonicity = self.harmonicity.as_ref().map(|p| harmonicity::track(sound, p));

        debug!(
            duration = sound.duration(),
            pitch_frames = pitch.points().len(),
            voiced_frames = pitch.voiced().count(),
            formant_frames = formants.frame_count(),
            hnr_frames = harmonicity.as_ref().map_or(0, |h| h.values().len()),
            "Acoustic analysis finished"
        );

        Measurements {
            duration: sound.duration(),
            pitch,
            formants,
            harmonicity,
        }
    }
}

impl AcousticAnalyzer for PraatAnalyzer {
    fn analyze(&self, path: &Path) -> Result<Measurements, PipelineError> {
        let sound = Sound::read_wav(path)?;
        Ok(self.measure(&sound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::test_support::{sine, write_wav};

    #[test]
    fn test_analyzer_reads_wav_and_measures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 16000, 1, &sine(220.0, 16000.0, 1.0, 0.5));

        let analyzer = PraatAnalyzer::from_config(&AppConfig::default().analysis);
        let measurements = analyzer.analyze(&path).unwrap();

        assert!((measurements.duration - 1.0).abs() < 1e-9);
        let mean = measurements.pitch.mean().unwrap();
        assert!((mean - 220.0).abs() < 2.0, "mean pitch {}", mean);
        assert!(measurements.harmonicity.is_some());
        assert!(measurements.formants.frame_count() > 0);
    }

    #[test]
    fn test_harmonicity_can_be_disabled() {
        let mut config = AppConfig::default().analysis;
        config.harmonicity = false;
        let analyzer = PraatAnalyzer::from_config(&config);
        let sound = Sound::from_samples(sine(150.0, 16000.0, 0.3, 0.5), 16000.0);
        assert!(analyzer.measure(&sound).harmonicity.is_none());
    }

    #[test]
    fn test_unreadable_file_is_an_analysis_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"RIFF....WAVEjunk").unwrap();

        let analyzer = PraatAnalyzer::from_config(&AppConfig::default().analysis);
        assert!(matches!(analyzer.analyze(&path), Err(PipelineError::Analysis(_))));
    }
}
