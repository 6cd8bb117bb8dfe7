//! The transcoder boundary.
//!
//! Decoding and encoding are not done in this crate. A [`Transcoder`] opens a source as a
//! [`MediaHandle`] and writes the encoded audio to a destination; [`FfmpegTranscoder`] does
//! this by driving the ffmpeg and ffprobe executables.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

pub mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

/// Errors reported by a transcoder
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("External tool not found: {}", .path.display())]
    ToolNotFound { path: PathBuf },

    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    #[error("{reason}")]
    ProcessFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The media handle was released while transcoding
    #[error("Media handle closed during transcode")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Message including any captured tool output
    pub fn detail(&self) -> String {
        match self {
            Self::ProcessFailed {
                reason,
                stderr: Some(stderr),
            } => format!("{}: {}", reason, stderr.trim()),
            other => other.to_string(),
        }
    }
}

/// What probing a source revealed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size_bytes: u64,

    /// Seconds; 0 when the container does not say
    pub duration_secs: f64,

    /// Container format name
    pub format: String,
    pub has_audio: bool,
    pub audio_codec: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u8>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
}

/// Encoding instructions passed to [`Transcoder::transcode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeParams {
    /// Encoder identifier
    pub codec: String,
    pub sample_rate: u32,

    /// Remix to this many channels; `None` keeps the source layout
    pub remix_channels: Option<u8>,
    pub bitrate: Option<String>,

    /// Replace an existing destination
    pub overwrite: bool,
}

/// An open decode session on one source file.
///
/// Closing is idempotent and can be triggered remotely through a [`HandleCloser`]; a
/// transcoder running against a closed handle must abort with [`TranscodeError::Closed`].
/// Dropping the handle closes it.
#[derive(Debug)]
pub struct MediaHandle {
    info: MediaInfo,
    closed: Arc<watch::Sender<bool>>,
}

impl MediaHandle {
    pub fn new(info: MediaInfo) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            info,
            closed: Arc::new(closed),
        }
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.info.path
    }

    pub fn has_audio(&self) -> bool {
        self.info.has_audio
    }

    pub fn duration_secs(&self) -> f64 {
        self.info.duration_secs
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Release the handle. Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        !self.closed.send_replace(true)
    }

    /// Resolves once the handle has been closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// A cloneable remote control that can close this handle from elsewhere
    pub fn closer(&self) -> HandleCloser {
        HandleCloser {
            closed: Arc::clone(&self.closed),
        }
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Closes a [`MediaHandle`] without owning it
#[derive(Debug, Clone)]
pub struct HandleCloser {
    closed: Arc<watch::Sender<bool>>,
}

impl HandleCloser {
    pub fn close(&self) -> bool {
        !self.closed.send_replace(true)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Something that can turn a video file's audio track into an audio file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Name of this implementation
    fn name(&self) -> &str;

    /// Open `source` for decoding and describe it
    async fn open(&self, source: &Path) -> Result<MediaHandle, TranscodeError>;

    /// Describe `source` without keeping it open
    async fn probe(&self, source: &Path) -> Result<MediaInfo, TranscodeError> {
        let handle = self.open(source).await?;
        Ok(handle.info().clone())
    }

    /// Encode the audio of `handle` into `destination`.
    ///
    /// `progress` receives elapsed media time in seconds whenever the implementation knows it.
    async fn transcode(
        &self,
        handle: &MediaHandle,
        destination: &Path,
        params: &TranscodeParams,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), TranscodeError>;

    /// Check that the transcoder is usable (tools installed and runnable)
    async fn validate(&self) -> Result<(), TranscodeError>;
}
