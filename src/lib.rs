//! Tuberip - a web service that turns video URLs into tagged MP3 files
//!
//! This library wires together three external capabilities: a video-site
//! extraction tool (yt-dlp), an audio transcoder (ffmpeg) and a tag-writing
//! library (lofty). The HTTP layer exposes a single conversion endpoint and
//! streams the finished file back to the caller.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod pipeline;
pub mod server;
pub mod tagger;
pub mod transcode;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{MediaExtractor, ResolvedStream, StreamHandle, TrackMetadata};
pub use pipeline::{ConversionPipeline, Converter, Mp3Artifact};

/// Result type used for CLI and bootstrap-level code
pub type Result<T> = anyhow::Result<T>;

/// Failure taxonomy for one conversion attempt.
///
/// Metadata-injection failures are deliberately absent: they live in
/// [`tagger::TagError`] and are logged and swallowed by the pipeline, so a
/// tagging problem can never abort a conversion.
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("unsupported bitrate {0:?}, expected something like \"128k\", \"192k\" or \"320k\"")]
    InvalidQuality(String),

    #[error("audio extraction failed: {0}")]
    Extraction(String),

    #[error("audio download failed: {0}")]
    Download(String),

    #[error("transcoding timed out after {0} seconds")]
    TranscodeTimeout(u64),

    #[error("transcoder exited with an error: {0}")]
    Transcode(String),

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),
}
