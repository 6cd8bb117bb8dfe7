use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::convert::{AudioFormat, EncodingParameters};

#[derive(Parser)]
#[command(
    name = "video2audio",
    about = "video2audio - Extract the audio track of video files as WAV, MP3, FLAC or AAC",
    version,
    long_about = "Converts video files (mp4, avi, mov, mkv, flv, wmv, m4v, 3gp) into standalone audio files using ffmpeg. Converts a single file or every video under a directory, keeping the directory layout in the output tree."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (created with defaults if missing)
    #[arg(long, global = true, value_name = "FILE", env = "VIDEO2AUDIO_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a single video file
    Convert {
        /// Video file to convert
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output audio file (derived from the input name if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Directory for the derived output file
        #[arg(short = 'd', long, value_name = "DIR", conflicts_with = "output")]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        audio: AudioArgs,

        /// Replace an existing output file without asking
        #[arg(long)]
        overwrite: bool,
    },

    /// Convert every video file under a directory
    Batch {
        /// Directory to scan recursively
        #[arg(value_name = "DIR")]
        directory: PathBuf,

        /// Root of the output tree (audio is written next to each video if not specified)
        #[arg(short = 'd', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        audio: AudioArgs,

        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
    },

    /// Show media information for a video file
    Info {
        /// Video file to inspect
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List supported input and output formats
    Formats,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Encoding options shared by `convert` and `batch`. Unset options fall back to the config file.
#[derive(Args, Clone, Debug, Default)]
pub struct AudioArgs {
    /// Output audio format
    #[arg(short, long, value_enum)]
    pub format: Option<AudioFormat>,

    /// Sample rate in Hz (default: 44100)
    #[arg(long, value_name = "RATE", value_parser = clap::value_parser!(u32).range(1..))]
    pub sample_rate: Option<u32>,

    /// Channel count (1 = mono, 2 = stereo); keeps the source layout if not specified
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=2))]
    pub channels: Option<u8>,

    /// Audio bitrate, e.g. 320k or 192k
    #[arg(long, value_name = "RATE")]
    pub bitrate: Option<String>,
}

impl AudioArgs {
    /// Apply the given options on top of `base`
    pub fn apply(&self, base: EncodingParameters) -> EncodingParameters {
        EncodingParameters {
            format: self.format.unwrap_or(base.format),
            sample_rate: self.sample_rate.unwrap_or(base.sample_rate),
            channels: self.channels.or(base.channels),
            bitrate: self.bitrate.clone().or(base.bitrate),
            codec: base.codec,
        }
    }
}
