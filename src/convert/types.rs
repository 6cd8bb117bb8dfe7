//! Data model for conversions.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::transcoder::TranscodeParams;
use crate::ConversionError;

/// Default output sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Supported output audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Uncompressed PCM WAVE
    #[default]
    Wav,
    /// MPEG Audio Layer III
    Mp3,
    /// Free Lossless Audio Codec
    Flac,
    /// Advanced Audio Coding
    Aac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [
        AudioFormat::Wav,
        AudioFormat::Mp3,
        AudioFormat::Flac,
        AudioFormat::Aac,
    ];

    /// File extension (without dot)
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
        }
    }

    /// Encoder identifier implied by the format
    pub fn codec(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "pcm_s16le",
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "flac" => Some(AudioFormat::Flac),
            "aac" => Some(AudioFormat::Aac),
            _ => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How the audio should be encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingParameters {
    /// Target format
    pub format: AudioFormat,

    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// Channel count (1 or 2); `None` keeps the source layout
    pub channels: Option<u8>,

    /// Bitrate token such as "192k"; meaning depends on the format
    pub bitrate: Option<String>,

    /// Explicit encoder override; normally derived from `format`
    pub codec: Option<String>,
}

impl Default for EncodingParameters {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: None,
            bitrate: None,
            codec: None,
        }
    }
}

impl EncodingParameters {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u8) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = Some(bitrate.into());
        self
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    /// Effective encoder: the explicit override if any, else the one implied by the format
    pub fn codec(&self) -> &str {
        self.codec.as_deref().unwrap_or_else(|| self.format.codec())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be a positive integer".to_string());
        }
        if let Some(channels) = self.channels {
            if !matches!(channels, 1 | 2) {
                return Err(format!("channel count must be 1 or 2, got {}", channels));
            }
        }
        Ok(())
    }

    /// Merge into the parameter set handed to the transcoder. Unset options stay unset.
    pub(crate) fn to_transcode_params(&self, overwrite: bool) -> TranscodeParams {
        TranscodeParams {
            codec: self.codec().to_string(),
            sample_rate: self.sample_rate,
            remix_channels: self.channels,
            bitrate: self.bitrate.clone(),
            overwrite,
        }
    }
}

/// One file to convert
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: PathBuf,

    /// Explicit destination; wins over `output_dir`
    pub destination: Option<PathBuf>,

    /// Directory to place the derived destination in
    pub output_dir: Option<PathBuf>,

    pub params: EncodingParameters,

    /// Replace an existing destination instead of failing
    pub overwrite: bool,
}

impl ConversionRequest {
    pub fn new(source: impl Into<PathBuf>, params: EncodingParameters) -> Self {
        Self {
            source: source.into(),
            destination: None,
            output_dir: None,
            params,
            overwrite: false,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// A whole directory to convert
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub root: PathBuf,

    /// Output tree root; `None` writes each audio file next to its video
    pub output_dir: Option<PathBuf>,

    pub params: EncodingParameters,

    pub overwrite: bool,
}

impl BatchRequest {
    pub fn new(root: impl Into<PathBuf>, params: EncodingParameters) -> Self {
        Self {
            root: root.into(),
            output_dir: None,
            params,
            overwrite: false,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Outcome of one conversion. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    source: PathBuf,
    output_path: Option<PathBuf>,
    duration_secs: f64,
    error: Option<ConversionError>,
    completed_at: DateTime<Utc>,
}

impl ConversionResult {
    pub(crate) fn succeeded(source: &Path, output_path: PathBuf, duration_secs: f64) -> Self {
        Self {
            source: source.to_path_buf(),
            output_path: Some(output_path),
            duration_secs,
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub(crate) fn failed(
        source: &Path,
        output_path: Option<PathBuf>,
        duration_secs: f64,
        error: ConversionError,
    ) -> Self {
        Self {
            source: source.to_path_buf(),
            output_path,
            duration_secs,
            error: Some(error),
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Resolved destination, if resolution got that far
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Media duration of the source in seconds (0 when unknown)
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn error(&self) -> Option<&ConversionError> {
        self.error.as_ref()
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

/// Aggregate outcome of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub success_count: usize,

    /// Every discovered file, including ones that failed validation or were never reached
    pub total_count: usize,

    /// The batch ended early because a stop was requested
    pub stopped: bool,
}

impl BatchSummary {
    pub fn failed_count(&self) -> usize {
        self.total_count - self.success_count
    }

    pub fn all_succeeded(&self) -> bool {
        !self.stopped && self.success_count == self.total_count
    }
}
