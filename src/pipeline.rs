//! # Analysis Pipeline
//!
//! One call to [`Pipeline::run`] is one request's worth of work:
//!
//! 1. **Ingest**: stage the upload in a fresh [`Workspace`]
//! 2. **Normalize**: transcode to canonical WAV (skipped when disabled)
//! 3. **Analyze**: hand the WAV to the [`AcousticAnalyzer`]
//! 4. **Shape**: build the time series or summary body
//! 5. **Sanitize**: replace every non-finite number with `null`
//!
//! The workspace is removed before `run` returns, whatever the outcome.
//!
//! ## Rust Concepts:
//! - **Blocking code**: every step does file I/O, spawns a process or crunches
//!   numbers, so the handler runs this on actix's blocking thread pool
//! - **Trait objects**: the analyzer and transcoder are `Arc<dyn Trait>` so
//!   tests can substitute stand-ins without generics leaking into `AppState`

use crate::analysis::{AcousticAnalyzer, PraatAnalyzer};
use crate::audio::{normalize, FfmpegTranscoder, TargetFormat, Transcoder, UploadedAudio, Workspace};
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::report::{shape, OutputMode, ReportValue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Pipeline {
    analyzer: Arc<dyn AcousticAnalyzer>,
    /// `None` when uploads are trusted to be canonical WAV already
    transcoder: Option<Arc<dyn Transcoder>>,
    target: TargetFormat,
    output: OutputMode,
    samples_per_second: f64,
    temp_dir: PathBuf,
}

impl Pipeline {
    /// Production pipeline: Praat-style analysis and, if enabled, `ffmpeg`.
    pub fn from_config(config: &AppConfig) -> Self {
        let analyzer: Arc<dyn AcousticAnalyzer> = Arc::new(PraatAnalyzer::from_config(&config.analysis));
        let transcoder: Option<Arc<dyn Transcoder>> = if config.normalizer.enabled {
            Some(Arc::new(FfmpegTranscoder::new(config.normalizer.program.clone())))
        } else {
            None
        };
        Self::new(config, analyzer, transcoder)
    }

    pub fn new(
        config: &AppConfig,
        analyzer: Arc<dyn AcousticAnalyzer>,
        transcoder: Option<Arc<dyn Transcoder>>,
    ) -> Self {
        Self {
            analyzer,
            transcoder,
            target: TargetFormat::from_config(&config.normalizer),
            output: config.analysis.output,
            samples_per_second: config.analysis.formant_samples_per_second,
            temp_dir: PathBuf::from(&config.uploads.temp_dir),
        }
    }

    /// Produce the sanitized response body for one upload.
    pub fn run(&self, upload: &UploadedAudio, request_id: &str) -> Result<ReportValue, PipelineError> {
        let started = Instant::now();
        let workspace = Workspace::create(&self.temp_dir)?;

        let result = self.process(&workspace, upload, request_id);

        if let Err(e) = workspace.close() {
            warn!(request_id = %request_id, error = %e, "Failed to remove scratch directory");
        }

        match &result {
            Ok(_) => info!(
                request_id = %request_id,
                duration_ms = started.elapsed().as_millis() as u64,
                "Analysis completed"
            ),
            Err(e) => warn!(
                request_id = %request_id,
                kind = e.kind(),
                error = %e,
                "Analysis failed"
            ),
        }

        result
    }

    fn process(
        &self,
        workspace: &Workspace,
        upload: &UploadedAudio,
        request_id: &str,
    ) -> Result<ReportValue, PipelineError> {
        let uploaded = workspace.persist(upload)?;
        debug!(
            request_id = %request_id,
            scratch = %workspace.path().display(),
            extension = %upload.extension(),
            "Upload staged"
        );

        let audio_path = match &self.transcoder {
            Some(transcoder) => {
                let normalized = workspace.normalized_path();
                normalize(transcoder.as_ref(), &uploaded, &normalized, &self.target)?;
                normalized
            }
            None => uploaded,
        };

        let measurements = self.analyzer.analyze(&audio_path)?;
        let report = shape(&measurements, self.output, self.samples_per_second).sanitize();
        debug_assert!(report.is_finite());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FormantTrack, Measurements, PitchTrack};
    use crate::test_support::{sine, wav_bytes};
    use std::path::Path;

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.uploads.temp_dir = dir.to_string_lossy().into_owned();
        config.normalizer.enabled = false;
        config
    }

    struct NanAnalyzer;

    impl AcousticAnalyzer for NanAnalyzer {
        fn analyze(&self, _path: &Path) -> Result<Measurements, PipelineError> {
            Ok(Measurements {
                duration: 1.0,
                pitch: PitchTrack::from_frames(vec![0.1, 0.2], vec![f64::INFINITY, 0.0]),
                formants: FormantTrack::from_frames(0.005, 0.01, 3, vec![vec![f64::NAN; 3]; 100]),
                harmonicity: None,
            })
        }
    }

    struct FailingTranscoder;

    impl Transcoder for FailingTranscoder {
        fn transcode(&self, _input: &Path, _output: &Path, _target: &TargetFormat) -> Result<(), PipelineError> {
            Err(PipelineError::Transcoding("Invalid data found when processing input".to_string()))
        }
    }

    #[test]
    fn test_sine_summary_pitch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.analysis.output = OutputMode::Summary;
        let pipeline = Pipeline::from_config(&config);

        let upload = UploadedAudio::new(
            wav_bytes(16000, &sine(220.0, 16000.0, 1.0, 0.5)),
            Some("tone.wav".to_string()),
        );
        let report = pipeline.run(&upload, "test").unwrap();

        match report.get("pitch") {
            Some(ReportValue::Number(pitch)) => assert!((pitch - 220.0).abs() < 2.0, "pitch {}", pitch),
            other => panic!("unexpected pitch: {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_output_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&config_in(dir.path()), Arc::new(NanAnalyzer), None);

        let report = pipeline.run(&UploadedAudio::new(vec![0; 4], None), "test").unwrap();
        assert!(report.is_finite());
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("NaN") && !json.contains("inf"));
    }

    #[test]
    fn test_transcoding_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            &config_in(dir.path()),
            Arc::new(NanAnalyzer),
            Some(Arc::new(FailingTranscoder)),
        );

        let err = pipeline
            .run(&UploadedAudio::new(b"junk".to_vec(), Some("clip.webm".to_string())), "test")
            .unwrap_err();
        assert_eq!(err.to_string(), "FFmpeg error: Invalid data found when processing input");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unreadable_audio_is_an_analysis_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::from_config(&config_in(dir.path()));

        let err = pipeline
            .run(&UploadedAudio::new(b"definitely not a wav".to_vec(), None), "test")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Analysis(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
