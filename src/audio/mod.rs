//! # Audio Ingestion and Normalization
//!
//! Everything that happens to an upload before it is analyzed.
//!
//! ## Key Components:
//! - **Upload**: The raw bytes and declared filename taken from the multipart form
//! - **Workspace**: A per-request scratch directory that deletes itself on drop
//! - **Normalizer**: Runs an external transcoder to produce canonical WAV and checks the result
//!
//! ## Canonical Audio Format:
//! - **Container**: WAV
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit signed PCM, little-endian
//! - **Channels**: Mono (1 channel)

pub mod normalize;
pub mod upload;

pub use normalize::{normalize, FfmpegTranscoder, TargetFormat, Transcoder};
pub use upload::{UploadedAudio, Workspace};
