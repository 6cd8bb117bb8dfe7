//! video2audio - extract audio tracks from video files
//!
//! This library converts container media files (mp4, mkv, mov, ...) into standalone audio
//! files, either one file at a time or for a whole directory tree. Decoding and encoding are
//! delegated to a [`Transcoder`]; the bundled implementation drives ffmpeg/ffprobe.

pub mod cli;
pub mod config;
pub mod convert;
pub mod discovery;
pub mod output;
pub mod paths;
pub mod transcoder;
pub mod utils;

use std::path::PathBuf;

pub use cli::{AudioArgs, Cli, Commands};
pub use config::Config;
pub use convert::{
    AudioFormat, BatchRequest, BatchSummary, ConversionRequest, ConversionResult, Converter,
    EncodingParameters, FileContext, NoProgress, ProgressEvent, ProgressSink,
};
pub use transcoder::{FfmpegTranscoder, MediaHandle, MediaInfo, TranscodeError, Transcoder};

/// Result type used by the application layer
pub type Result<T> = anyhow::Result<T>;

/// Reasons a single file conversion can fail.
///
/// All of these are local to one file: a batch records them and moves on.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Source file not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Unsupported video format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Output directory unavailable: {}", .path.display())]
    OutputDirectoryUnavailable { path: PathBuf },

    #[error("Output file already exists: {}", .path.display())]
    OutputExists { path: PathBuf },

    #[error("Video file has no audio track: {}", .path.display())]
    NoAudioTrack { path: PathBuf },

    #[error("Transcoder failed: {0}")]
    TranscoderFailure(String),

    #[error("Output file is empty or missing: {}", .path.display())]
    EmptyOrMissingOutput { path: PathBuf },

    #[error("Conversion cancelled")]
    Cancelled,
}
