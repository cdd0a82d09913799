//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **impl blocks**: Add methods to structs
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Platform variables `HOST` and `PORT`
//! 2. Environment variables (APP_SERVER__PORT, APP_ANALYSIS__OUTPUT, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! Configuration is read once at startup. Nothing mutates it afterwards, so
//! the running service shares it behind a plain `Arc`.

use crate::report::OutputMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each section matches one stage of request handling (listening, accepting
/// uploads, normalizing audio, analyzing it), so a deployment can tune one
/// stage without reading about the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub uploads: UploadConfig,
    pub normalizer: NormalizerConfig,
    pub analysis: AnalysisConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How uploads are accepted and where they are staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Multipart field carrying the recording
    pub field_name: String,
    pub max_file_size_mb: usize,
    /// Parent directory for per-request scratch directories
    pub temp_dir: String,
}

/// Conversion of arbitrary uploads into mono 16-bit PCM WAV.
///
/// ## Fields:
/// - `enabled`: Turn off only when every client already sends canonical WAV
/// - `program`: Transcoder executable, looked up on `PATH` unless absolute
/// - `sample_rate`, `channels`, `codec`: Target format handed to the transcoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub enabled: bool,
    pub program: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: String,
}

/// Acoustic analysis parameters and response shape.
///
/// Time steps of `0.0` let the analysis pick its own frame rate from the
/// other parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// `time_series` or `summary`
    pub output: OutputMode,
    /// Cadence at which formant tracks are sampled for the response
    pub formant_samples_per_second: f64,
    /// Whether to compute the harmonics-to-noise ratio at all
    pub harmonicity: bool,

    pub pitch_time_step: f64,
    pub pitch_floor: f64,
    pub pitch_ceiling: f64,

    pub formant_time_step: f64,
    pub max_formants: usize,
    pub max_formant_hz: f64,
    pub formant_window: f64,
    pub pre_emphasis_from: f64,

    pub hnr_time_step: f64,
    pub hnr_min_pitch: f64,
    pub hnr_silence_threshold: f64,
    pub hnr_periods_per_window: f64,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// The analysis defaults are Praat's standard settings for adult speech.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8080,
            },
            uploads: UploadConfig {
                field_name: "audio".to_string(),  // What the browser client sends
                max_file_size_mb: 50,
                temp_dir: env::temp_dir().to_string_lossy().into_owned(),
            },
            normalizer: NormalizerConfig {
                enabled: true,
                program: "ffmpeg".to_string(),
                sample_rate: 16000,
                channels: 1,
                codec: "pcm_s16le".to_string(),
            },
            analysis: AnalysisConfig {
                output: OutputMode::TimeSeries,
                formant_samples_per_second: 25.0,
                harmonicity: true,
                pitch_time_step: 0.0,
                pitch_floor: 75.0,
                pitch_ceiling: 600.0,
                formant_time_step: 0.0,
                max_formants: 5,
                max_formant_hz: 5500.0,
                formant_window: 0.025,
                pre_emphasis_from: 50.0,
                hnr_time_step: 0.01,
                hnr_min_pitch: 75.0,
                hnr_silence_threshold: 0.1,
                hnr_periods_per_window: 1.0,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_ANALYSIS__OUTPUT=summary`: Switch to the summary contract
    /// - `APP_NORMALIZER__ENABLED=false`: Trust clients to send canonical WAV
    /// - `PORT=3000`: Special case for deployment platforms
    ///
    /// Nested keys use a double underscore because several field names
    /// (`max_file_size_mb`, `pitch_floor`) contain single ones.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        // Deployment platforms set these without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Uploads have a field name and a non-zero size limit
    /// - The normalizer target is a real format
    /// - Analysis ranges are ordered and positive
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.uploads.field_name.trim().is_empty() {
            return Err(anyhow::anyhow!("Upload field name cannot be empty"));
        }

        if self.uploads.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }

        if self.normalizer.enabled {
            if self.normalizer.program.trim().is_empty() {
                return Err(anyhow::anyhow!("Normalizer program cannot be empty"));
            }
            if self.normalizer.sample_rate == 0 || self.normalizer.channels == 0 {
                return Err(anyhow::anyhow!("Normalizer sample rate and channel count must be greater than 0"));
            }
        }

        let analysis = &self.analysis;
        if analysis.pitch_floor <= 0.0 || analysis.pitch_ceiling <= analysis.pitch_floor {
            return Err(anyhow::anyhow!(
                "Pitch range {}-{} Hz is invalid",
                analysis.pitch_floor,
                analysis.pitch_ceiling
            ));
        }

        if !(3..=10).contains(&analysis.max_formants) {
            return Err(anyhow::anyhow!("Max formants must be between 3 and 10"));
        }

        if analysis.max_formant_hz <= 0.0 || analysis.formant_window <= 0.0 {
            return Err(anyhow::anyhow!("Formant ceiling and window must be greater than 0"));
        }

        if analysis.formant_samples_per_second <= 0.0 {
            return Err(anyhow::anyhow!("Formant samples per second must be greater than 0"));
        }

        if analysis.harmonicity && (analysis.hnr_min_pitch <= 0.0 || analysis.hnr_periods_per_window <= 0.0) {
            return Err(anyhow::anyhow!("Harmonicity minimum pitch and window must be greater than 0"));
        }

        Ok(())
    }

    /// Upload size limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.uploads.max_file_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.uploads.field_name, "audio");
        assert_eq!(config.normalizer.sample_rate, 16000);
        assert_eq!(config.normalizer.channels, 1);
        assert_eq!(config.normalizer.codec, "pcm_s16le");
        assert_eq!(config.analysis.output, OutputMode::TimeSeries);
        assert_eq!(config.analysis.formant_samples_per_second, 25.0);
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analysis.pitch_ceiling = 50.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analysis.max_formants = 2;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.uploads.max_file_size_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_normalizer_skips_its_checks() {
        let mut config = AppConfig::default();
        config.normalizer.enabled = false;
        config.normalizer.program = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_mode_from_layered_source() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default()).unwrap())
            .add_source(config::File::from_str(
                "[analysis]\noutput = \"summary\"\n\n[uploads]\nmax_file_size_mb = 10\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.analysis.output, OutputMode::Summary);
        assert_eq!(config.max_upload_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.server.port, 8080);
    }
}
