use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::convert::{AudioFormat, EncodingParameters, DEFAULT_SAMPLE_RATE};

/// File name looked up in the working directory before the user config directory
const LOCAL_CONFIG_FILE: &str = "video2audio.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default encoding settings
    pub encoding: EncodingConfig,

    /// External tool locations
    pub tools: ToolsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Output format
    pub format: AudioFormat,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count (1 or 2); unset keeps the source layout
    pub channels: Option<u8>,

    /// Bitrate such as "192k"
    pub bitrate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: PathBuf,

    /// Path to the ffprobe binary
    pub ffprobe_path: PathBuf,

    /// ffmpeg -loglevel value
    pub ffmpeg_log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Append-only log file
    pub log_file: PathBuf,

    /// Replace existing audio files without asking
    pub overwrite: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::Wav,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: None,
            bitrate: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_log_level: "error".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("conversion.log"),
            overwrite: false,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or the default location), creating it if missing
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn default_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video2audio").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.encoding_parameters()
            .validate()
            .map_err(|reason| anyhow::anyhow!("Invalid encoding settings: {}", reason))?;

        if self.tools.ffmpeg_path.as_os_str().is_empty() || self.tools.ffprobe_path.as_os_str().is_empty() {
            anyhow::bail!("ffmpeg and ffprobe paths must not be empty");
        }

        Ok(())
    }

    /// Encoding parameters described by the `encoding` section
    pub fn encoding_parameters(&self) -> EncodingParameters {
        EncodingParameters {
            format: self.encoding.format,
            sample_rate: self.encoding.sample_rate,
            channels: self.encoding.channels,
            bitrate: self.encoding.bitrate.clone(),
            codec: None,
        }
    }

    /// Display current configuration
    pub fn display(&self, path: &Path) {
        println!("Current Configuration ({}):", path.display());
        println!("  Format: {}", self.encoding.format);
        println!("  Sample Rate: {} Hz", self.encoding.sample_rate);
        match self.encoding.channels {
            Some(channels) => println!("  Channels: {}", channels),
            None => println!("  Channels: source layout"),
        }
        if let Some(bitrate) = &self.encoding.bitrate {
            println!("  Bitrate: {}", bitrate);
        }
        println!("  ffmpeg: {}", self.tools.ffmpeg_path.display());
        println!("  ffprobe: {}", self.tools.ffprobe_path.display());
        println!("  Log File: {}", self.app.log_file.display());
        println!("  Overwrite: {}", self.app.overwrite);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_config_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.yaml");

        let config = Config::load(Some(&path)).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.encoding.format, AudioFormat::Wav);
        assert_eq!(config.encoding.sample_rate, 44100);
        assert_eq!(config.tools.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.app.log_file, PathBuf::from("conversion.log"));
    }

    #[tokio::test]
    async fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "encoding:\n  format: mp3\n  bitrate: 192k\n").unwrap();

        let config = Config::load(Some(&path)).await.unwrap();
        assert_eq!(config.encoding.format, AudioFormat::Mp3);
        assert_eq!(config.encoding.bitrate.as_deref(), Some("192k"));
        assert_eq!(config.encoding.sample_rate, 44100);
        assert!(!config.app.overwrite);

        let params = config.encoding_parameters();
        assert_eq!(params.codec(), "libmp3lame");
    }

    #[tokio::test]
    async fn test_invalid_channels_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "encoding:\n  channels: 6\n").unwrap();

        assert!(Config::load(Some(&path)).await.is_err());
    }

    #[tokio::test]
    async fn test_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.encoding.format = AudioFormat::Flac;
        config.encoding.channels = Some(1);
        config.save(&path).await.unwrap();

        let loaded = Config::load(Some(&path)).await.unwrap();
        assert_eq!(loaded.encoding.format, AudioFormat::Flac);
        assert_eq!(loaded.encoding.channels, Some(1));
    }
}
