use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{MediaHandle, MediaInfo, TranscodeError, TranscodeParams, Transcoder};
use crate::config::ToolsConfig;

/// Transcoder backed by the ffmpeg and ffprobe executables
pub struct FfmpegTranscoder {
    tools: ToolsConfig,
}

impl FfmpegTranscoder {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    pub fn with_defaults() -> Self {
        Self::new(ToolsConfig::default())
    }

    /// Build the ffmpeg command line that extracts the first audio stream
    fn build_args(&self, source: &Path, destination: &Path, params: &TranscodeParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            if params.overwrite { "-y" } else { "-n" }.into(),
            "-i".into(),
            file_url(source),
            "-vn".into(), // No video
            "-map".into(),
            "0:a:0".into(),
            "-c:a".into(),
            params.codec.clone().into(),
            "-ar".into(),
            params.sample_rate.to_string().into(),
        ];

        if let Some(channels) = params.remix_channels {
            args.extend([OsString::from("-ac"), channels.to_string().into()]);
        }

        if let Some(bitrate) = &params.bitrate {
            args.extend([OsString::from("-b:a"), bitrate.into()]);
        }

        args.extend([
            OsString::from("-loglevel"),
            self.tools.ffmpeg_log_level.clone().into(),
            "-nostats".into(),
            "-progress".into(),
            "pipe:2".into(),
        ]);

        args.push(file_url(destination));
        args
    }

    /// Parse ffprobe JSON output into MediaInfo
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, TranscodeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: Option<String>,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            codec_name: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| TranscodeError::ProbeFailed {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let audio = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"));
        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes: probe
                .format
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            duration_secs: probe
                .format
                .duration
                .as_deref()
                .and_then(|d| d.parse().ok())
                .unwrap_or(0.0),
            format: probe
                .format
                .format_name
                .as_deref()
                .and_then(|name| name.split(',').next())
                .unwrap_or("unknown")
                .to_string(),
            has_audio: audio.is_some(),
            audio_codec: audio.and_then(|s| s.codec_name.clone()),
            audio_sample_rate: audio
                .and_then(|s| s.sample_rate.as_deref())
                .and_then(|r| r.parse().ok()),
            audio_channels: audio.and_then(|s| s.channels),
            video_width: video.and_then(|s| s.width),
            video_height: video.and_then(|s| s.height),
        })
    }

    fn spawn_error(&self, e: std::io::Error, tool: &Path) -> TranscodeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TranscodeError::ToolNotFound {
                path: tool.to_path_buf(),
            }
        } else {
            TranscodeError::Io(e)
        }
    }

    async fn check_tool(&self, tool: &Path) -> Result<(), TranscodeError> {
        let output = Command::new(tool)
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e, tool))?;

        if !output.status.success() {
            return Err(TranscodeError::ProcessFailed {
                reason: format!("{} -version exited with code {:?}", tool.display(), output.status.code()),
                stderr: None,
            });
        }
        Ok(())
    }
}

/// Pass a path through ffmpeg's `file:` protocol.
///
/// The raw bytes are kept, and a name starting with `-` or containing `:` is never read as an
/// option or another protocol.
fn file_url(path: &Path) -> OsString {
    let mut url = OsString::from("file:");
    url.push(path.as_os_str());
    url
}

/// Feed ffmpeg's stderr to `progress` and return everything that is not progress output.
///
/// Lines are decoded lossily since ffmpeg echoes file names, which need not be UTF-8.
async fn read_tool_output<R>(
    mut reader: R,
    progress: &(dyn Fn(f64) + Send + Sync),
) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut error_output = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        if let Some(elapsed) = parse_progress_time(line) {
            progress(elapsed);
        } else if !is_progress_line(line) && !line.is_empty() {
            error_output.push_str(line);
            error_output.push('\n');
        }
    }

    Ok(error_output)
}

/// Elapsed output time in seconds from an ffmpeg `-progress` line
fn parse_progress_time(line: &str) -> Option<f64> {
    // Both keys are in microseconds despite the name of the second.
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    value.trim().parse::<f64>().ok().map(|us| us / 1_000_000.0)
}

/// `-progress` output is `key=value` with a lowercase identifier key
fn is_progress_line(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn open(&self, source: &Path) -> Result<MediaHandle, TranscodeError> {
        let info = self.probe(source).await?;
        Ok(MediaHandle::new(info))
    }

    async fn probe(&self, source: &Path) -> Result<MediaInfo, TranscodeError> {
        let output = Command::new(&self.tools.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(file_url(source))
            .output()
            .await
            .map_err(|e| self.spawn_error(e, &self.tools.ffprobe_path))?;

        if !output.status.success() {
            return Err(TranscodeError::ProbeFailed {
                reason: format!(
                    "ffprobe could not read {}: {}",
                    source.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Self::parse_probe_output(source, &String::from_utf8_lossy(&output.stdout))
    }

    async fn transcode(
        &self,
        handle: &MediaHandle,
        destination: &Path,
        params: &TranscodeParams,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), TranscodeError> {
        if handle.is_closed() {
            return Err(TranscodeError::Closed);
        }

        let args = self.build_args(handle.path(), destination, params);
        tracing::debug!(?args, "Running {}", self.tools.ffmpeg_path.display());

        // Dropping the child (handle closed, or this future cancelled) kills ffmpeg.
        let mut child = Command::new(&self.tools.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e, &self.tools.ffmpeg_path))?;

        let stderr = child.stderr.take().ok_or_else(|| TranscodeError::ProcessFailed {
            reason: "ffmpeg stderr was not captured".to_string(),
            stderr: None,
        })?;

        let run = async {
            let error_output = read_tool_output(BufReader::new(stderr), progress).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, error_output))
        };

        let (status, error_output) = tokio::select! {
            result = run => result?,
            _ = handle.closed() => {
                tracing::debug!("Media handle closed, aborting ffmpeg");
                return Err(TranscodeError::Closed);
            }
        };

        if !status.success() {
            return Err(TranscodeError::ProcessFailed {
                reason: format!("ffmpeg exited with code {:?}", status.code()),
                stderr: (!error_output.is_empty()).then_some(error_output),
            });
        }

        Ok(())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        self.check_tool(&self.tools.ffmpeg_path).await?;
        self.check_tool(&self.tools.ffprobe_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn has(args: &[OsString], arg: &str) -> bool {
        args.iter().any(|a| a == arg)
    }

    fn params() -> TranscodeParams {
        TranscodeParams {
            codec: "pcm_s16le".to_string(),
            sample_rate: 44100,
            remix_channels: None,
            bitrate: None,
            overwrite: false,
        }
    }

    #[test]
    fn test_build_args_minimal() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let args = transcoder.build_args(Path::new("/in/clip.mp4"), Path::new("/out/clip.wav"), &params());

        assert!(has(&args, "-n"));
        assert!(!has(&args, "-y"));
        assert!(has(&args, "-vn"));
        assert!(has(&args, "pcm_s16le"));
        assert!(has(&args, "44100"));
        assert!(!has(&args, "-ac"));
        assert!(!has(&args, "-b:a"));
        assert!(has(&args, "file:/in/clip.mp4"));
        assert_eq!(args.last().map(OsString::as_os_str), Some(OsStr::new("file:/out/clip.wav")));
    }

    #[test]
    fn test_build_args_with_overrides() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let params = TranscodeParams {
            codec: "libmp3lame".to_string(),
            sample_rate: 48000,
            remix_channels: Some(1),
            bitrate: Some("320k".to_string()),
            overwrite: true,
        };
        let args = transcoder.build_args(Path::new("a.mkv"), Path::new("a.mp3"), &params);

        let ac = args.iter().position(|a| a == "-ac").unwrap();
        assert_eq!(args[ac + 1], "1");
        let ba = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[ba + 1], "320k");
        assert!(has(&args, "-y"));
        assert!(has(&args, "48000"));
    }

    #[test]
    fn test_dash_prefixed_output_is_not_an_option() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let args = transcoder.build_args(Path::new("-in.mp4"), Path::new("-clip.wav"), &params());

        assert!(!has(&args, "-clip.wav"));
        assert!(has(&args, "file:-in.mp4"));
        assert_eq!(args.last().map(OsString::as_os_str), Some(OsStr::new("file:-clip.wav")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_reach_ffmpeg_unchanged() {
        use std::os::unix::ffi::OsStrExt;

        let transcoder = FfmpegTranscoder::with_defaults();
        let source = Path::new(OsStr::from_bytes(b"/v/caf\xe9.mp4"));
        let destination = Path::new(OsStr::from_bytes(b"/a/caf\xe9.wav"));
        let args = transcoder.build_args(source, destination, &params());

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1].as_bytes(), b"file:/v/caf\xe9.mp4");
        assert_eq!(args.last().unwrap().as_bytes(), b"file:/a/caf\xe9.wav");
    }

    #[tokio::test]
    async fn test_read_tool_output_tolerates_invalid_utf8() {
        let stderr: &[u8] = b"out_time_us=1500000\nprogress=continue\n/v/caf\xe9.mp4: No such file\r\nout_time_ms=3000000\n";
        let seen = Mutex::new(Vec::new());
        let report = |elapsed: f64| seen.lock().unwrap().push(elapsed);

        let errors = read_tool_output(stderr, &report).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1.5, 3.0]);
        assert_eq!(errors, "/v/caf\u{FFFD}.mp4: No such file\n");
    }

    #[test]
    fn test_parse_progress_time() {
        assert_eq!(parse_progress_time("out_time_us=2500000"), Some(2.5));
        assert_eq!(parse_progress_time("out_time_ms=10000000"), Some(10.0));
        assert_eq!(parse_progress_time("out_time_us=N/A"), None);
        assert_eq!(parse_progress_time("speed=1.5x"), None);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("progress=continue"));
        assert!(is_progress_line("stream_0_0_q=-1.0"));
        assert!(!is_progress_line("Error opening output file"));
        assert!(!is_progress_line("[aac @ 0x55] Too many bits=8832 > 6144"));
    }

    #[test]
    fn test_parse_probe_output_video_with_audio() {
        let json = r#"{
            "format": {
                "filename": "clip.mkv",
                "format_name": "matroska,webm",
                "duration": "10.000000",
                "size": "123456"
            },
            "streams": [
                { "codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720 },
                { "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000", "channels": 2 }
            ]
        }"#;

        let info = FfmpegTranscoder::parse_probe_output(Path::new("clip.mkv"), json).unwrap();
        assert_eq!(info.path, PathBuf::from("clip.mkv"));
        assert_eq!(info.format, "matroska");
        assert!((info.duration_secs - 10.0).abs() < 1e-9);
        assert_eq!(info.size_bytes, 123456);
        assert!(info.has_audio);
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
        assert_eq!(info.audio_sample_rate, Some(48000));
        assert_eq!(info.audio_channels, Some(2));
        assert_eq!(info.video_width, Some(1280));
        assert_eq!(info.video_height, Some(720));
    }

    #[test]
    fn test_parse_probe_output_silent_video() {
        let json = r#"{
            "format": { "format_name": "mov,mp4,m4a,3gp,3g2,mj2" },
            "streams": [ { "codec_type": "video", "codec_name": "h264" } ]
        }"#;

        let info = FfmpegTranscoder::parse_probe_output(Path::new("silent.mp4"), json).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.duration_secs, 0.0);
        assert_eq!(info.format, "mov");
    }

    #[test]
    fn test_parse_probe_output_garbage() {
        let err = FfmpegTranscoder::parse_probe_output(Path::new("x"), "not json").unwrap_err();
        assert!(matches!(err, TranscodeError::ProbeFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let transcoder = FfmpegTranscoder::new(ToolsConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg-for-tests"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe-for-tests"),
            ..Default::default()
        });

        let err = transcoder.validate().await.unwrap_err();
        assert!(matches!(err, TranscodeError::ToolNotFound { .. }));

        let err = transcoder.open(Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, TranscodeError::ToolNotFound { .. }));
    }
}
