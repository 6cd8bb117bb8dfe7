//! Directory batch conversion.

use tracing::Instrument;

use crate::discovery::discover_video_files;
use crate::paths;
use crate::transcoder::Transcoder;

use super::progress::FileScopedSink;
use super::{
    BatchRequest, BatchSummary, ConversionRequest, Converter, FileContext, ProgressEvent,
    ProgressSink,
};

impl<T: Transcoder> Converter<T> {
    /// Convert every supported video under `request.root`, one file at a time.
    ///
    /// Files are processed in discovery order. A failed file is counted and skipped; it never
    /// ends the batch. A missing root or an empty tree gives a zero summary. After
    /// [`Converter::stop_in_flight`] no further files are started.
    pub async fn convert_batch(&self, request: &BatchRequest, sink: &dyn ProgressSink) -> BatchSummary {
        let _serial = self.conversion_lock.lock().await;
        self.reset_stop();
        self.run_batch(request, sink)
            .instrument(self.span.clone())
            .await
    }

    async fn run_batch(&self, request: &BatchRequest, sink: &dyn ProgressSink) -> BatchSummary {
        let root = request.root.as_path();

        if !root.exists() {
            tracing::error!("Input directory does not exist: {}", root.display());
            return BatchSummary::default();
        }

        let files = discover_video_files(root);
        sink.emit(ProgressEvent::DiscoveringDone {
            total_files: files.len(),
        });

        if files.is_empty() {
            tracing::warn!("No supported video files found in: {}", root.display());
            return BatchSummary::default();
        }

        let total = files.len();
        tracing::info!("Found {} video files", total);

        let mut summary = BatchSummary {
            success_count: 0,
            total_count: total,
            stopped: false,
        };

        for (i, file) in files.iter().enumerate() {
            if self.stop_requested() {
                tracing::warn!("Batch stopped before file {}/{}", i + 1, total);
                summary.stopped = true;
                break;
            }

            let context = FileContext {
                index: i + 1,
                total,
                path: file.clone(),
            };
            tracing::info!(
                "Processing ({}/{}): {}",
                context.index,
                total,
                file.file_name().unwrap_or_default().to_string_lossy()
            );
            sink.emit(ProgressEvent::Processing(context.clone()));

            let mut file_request = ConversionRequest::new(file, request.params.clone())
                .with_overwrite(request.overwrite);
            if let Some(output_dir) = &request.output_dir {
                file_request = file_request.with_destination(paths::rebase_output_path(
                    file,
                    root,
                    output_dir,
                    request.params.format,
                ));
            }

            let scoped = FileScopedSink {
                inner: sink,
                context: context.clone(),
            };
            let result = self.run_conversion(&file_request, &scoped).await;

            if result.is_success() {
                summary.success_count += 1;
            }
            sink.emit(ProgressEvent::Completed {
                file: Some(context),
                duration_secs: result.duration_secs(),
                success: result.is_success(),
            });
        }

        // A stop that landed during the last file still counts.
        if self.stop_requested() {
            summary.stopped = true;
        }

        tracing::info!(
            "Batch conversion complete: {}/{} succeeded",
            summary.success_count,
            summary.total_count
        );
        sink.emit(ProgressEvent::Finished {
            success_count: summary.success_count,
            total_count: summary.total_count,
        });

        summary
    }
}
