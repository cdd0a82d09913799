//! Conversion of arbitrary uploads into canonical WAV.
//!
//! The transcoder is a trait so the pipeline can be exercised without an
//! `ffmpeg` binary; [`normalize`] wraps any implementation and checks that
//! what it produced really is the requested format.

use crate::config::NormalizerConfig;
use crate::error::PipelineError;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// The format every upload is converted to before analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: String,
}

impl TargetFormat {
    pub fn from_config(config: &NormalizerConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            codec: config.codec.clone(),
        }
    }

    /// Bits per sample implied by a signed PCM codec name such as `pcm_s16le`.
    fn bits_per_sample(&self) -> Option<u16> {
        self.codec
            .strip_prefix("pcm_s")
            .map(|rest| rest.trim_end_matches(|c: char| c.is_ascii_alphabetic()))
            .and_then(|digits| digits.parse().ok())
    }
}

/// Capability that rewrites `input` as a WAV file at `output`.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path, target: &TargetFormat) -> Result<(), PipelineError>;
}

/// Runs the `ffmpeg` command line tool.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn build_args(input: &Path, output: &Path, target: &TargetFormat) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        args.extend(
            [
                "-f".to_string(),
                "wav".to_string(),
                "-acodec".to_string(),
                target.codec.clone(),
                "-ac".to_string(),
                target.channels.to_string(),
                "-ar".to_string(),
                target.sample_rate.to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path, target: &TargetFormat) -> Result<(), PipelineError> {
        let result = Command::new(&self.program)
            .args(Self::build_args(input, output, target))
            .output()
            .map_err(|e| PipelineError::Transcoding(format!("failed to run {}: {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let diagnostic = stderr.trim();
            return Err(PipelineError::Transcoding(if diagnostic.is_empty() {
                format!("{} exited with {}", self.program, result.status)
            } else {
                diagnostic.to_string()
            }));
        }

        Ok(())
    }
}

/// Transcode `input` into `output` and confirm the result matches `target`.
pub fn normalize(
    transcoder: &dyn Transcoder,
    input: &Path,
    output: &Path,
    target: &TargetFormat,
) -> Result<(), PipelineError> {
    transcoder.transcode(input, output, target)?;
    verify_canonical(output, target)?;
    debug!(
        sample_rate = target.sample_rate,
        channels = target.channels,
        codec = %target.codec,
        "Audio normalized"
    );
    Ok(())
}

/// Read the WAV header at `path` and reject anything but `target`.
pub fn verify_canonical(path: &Path, target: &TargetFormat) -> Result<(), PipelineError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| PipelineError::Transcoding(format!("output is not a readable WAV file: {}", e)))?;
    let spec = reader.spec();

    let bits_match = match target.bits_per_sample() {
        Some(bits) => spec.sample_format == hound::SampleFormat::Int && spec.bits_per_sample == bits,
        None => true,
    };

    if spec.sample_rate != target.sample_rate || spec.channels != target.channels || !bits_match {
        return Err(PipelineError::Transcoding(format!(
            "output is {} Hz, {} channel(s), {}-bit; expected {} Hz, {} channel(s), {}",
            spec.sample_rate, spec.channels, spec.bits_per_sample, target.sample_rate, target.channels, target.codec
        )));
    }

    Ok(())
}
