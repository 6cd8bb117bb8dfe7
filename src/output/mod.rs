//! Terminal output: live progress and result printing.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::convert::{AudioFormat, BatchSummary, ConversionResult, ProgressEvent, ProgressSink};
use crate::discovery::SUPPORTED_VIDEO_EXTENSIONS;
use crate::transcoder::MediaInfo;
use crate::utils::{file_size, format_duration, format_file_size};

/// Progress display backed by an indicatif bar (percent of the current file)
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::DiscoveringDone { total_files } => {
                self.bar.println(format!("Found {} video files", total_files));
            }
            ProgressEvent::Processing(file) => {
                self.bar.reset();
                self.bar.set_prefix(format!("{}/{}", file.index, file.total));
                self.bar.set_message(display_name(&file.path));
                self.bar.println(format!(
                    "Processing file {}/{}: {}",
                    file.index,
                    file.total,
                    file.path.display()
                ));
            }
            ProgressEvent::Converting { percent, .. } => {
                self.bar.set_position(percent.round() as u64);
            }
            ProgressEvent::Completed { success, .. } => {
                if success {
                    self.bar.set_position(100);
                    self.bar.println(format!("{} Conversion complete", style("✓").green()));
                } else {
                    self.bar.println(format!("{} Conversion failed", style("✗").red()));
                }
            }
            ProgressEvent::Finished {
                success_count,
                total_count,
            } => {
                self.bar.finish_and_clear();
                self.bar.println(format!(
                    "Batch conversion finished: {}/{} succeeded",
                    success_count, total_count
                ));
            }
        }
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print the outcome of a single conversion
pub fn print_conversion_result(result: &ConversionResult) {
    match (result.error(), result.output_path()) {
        (None, Some(output)) => {
            println!(
                "{} Conversion succeeded: {} ({})",
                style("✅").green(),
                output.display(),
                format_file_size(file_size(output))
            );
        }
        (Some(error), _) => {
            println!("{} Conversion failed: {}", style("❌").red(), error);
        }
        (None, None) => {
            println!("{} Conversion failed", style("❌").red());
        }
    }
}

/// Print the outcome of a batch
pub fn print_batch_summary(summary: &BatchSummary) {
    if summary.total_count == 0 {
        println!("No video files were converted.");
    } else if summary.all_succeeded() {
        println!("{} All {} files converted successfully!", style("✅").green(), summary.total_count);
    } else if summary.stopped {
        println!(
            "{} Batch stopped: {}/{} succeeded",
            style("⚠️").yellow(),
            summary.success_count,
            summary.total_count
        );
    } else {
        println!(
            "{} Some files failed: {}/{} succeeded",
            style("⚠️").yellow(),
            summary.success_count,
            summary.total_count
        );
    }
}

/// Print probe information for a source file
pub fn print_media_info(info: &MediaInfo) {
    println!("File: {}", info.path.display());
    let size = if info.size_bytes > 0 {
        info.size_bytes
    } else {
        file_size(&info.path)
    };
    println!("  Size: {}", format_file_size(size));
    println!("  Container: {}", info.format);
    println!("  Duration: {}", format_duration(info.duration_secs));
    if let (Some(width), Some(height)) = (info.video_width, info.video_height) {
        println!("  Resolution: {}x{}", width, height);
    }
    if info.has_audio {
        println!(
            "  Audio: {} {} Hz, {} channel(s)",
            info.audio_codec.as_deref().unwrap_or("unknown"),
            info.audio_sample_rate.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string()),
            info.audio_channels.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
        );
    } else {
        println!("  Audio: none (cannot be converted)");
    }
}

/// Print supported formats
pub fn print_formats() {
    println!("Supported input formats:");
    println!("  {}", SUPPORTED_VIDEO_EXTENSIONS.join(", "));
    println!("Supported output formats:");
    for format in AudioFormat::ALL {
        println!("  • {} (codec: {})", format, format.codec());
    }
}
