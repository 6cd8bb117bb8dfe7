//! Progress events and the sinks that receive them.

use std::path::PathBuf;

/// Position of a file within a batch
#[derive(Debug, Clone, PartialEq)]
pub struct FileContext {
    /// 1-based position in discovery order
    pub index: usize,
    pub total: usize,
    pub path: PathBuf,
}

/// A notification about the current phase of a conversion.
///
/// Events are delivered synchronously, at the moment they become true. Single-file
/// conversions carry no [`FileContext`]; inside a batch every per-file event is tagged with one.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Discovery finished and found `total_files` sources
    DiscoveringDone { total_files: usize },

    /// The batch is about to convert this file
    Processing(FileContext),

    /// Transcoding progress for the current file
    Converting {
        file: Option<FileContext>,
        elapsed_secs: f64,
        duration_secs: f64,
        percent: f64,
    },

    /// A file is done. Emitted once by the converter after a successful transcode, and once
    /// per file by the batch driver whatever the outcome.
    Completed {
        file: Option<FileContext>,
        duration_secs: f64,
        success: bool,
    },

    /// The batch is over
    Finished {
        success_count: usize,
        total_count: usize,
    },
}

impl ProgressEvent {
    /// Build a `Converting` event, deriving the percentage from elapsed and total time
    pub fn converting(file: Option<FileContext>, elapsed_secs: f64, duration_secs: f64) -> Self {
        let percent = if duration_secs > 0.0 {
            (elapsed_secs / duration_secs * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        ProgressEvent::Converting {
            file,
            elapsed_secs,
            duration_secs,
            percent,
        }
    }

    /// Attach batch context to a per-file event that has none
    pub fn with_file(self, context: &FileContext) -> Self {
        match self {
            ProgressEvent::Converting {
                file: None,
                elapsed_secs,
                duration_secs,
                percent,
            } => ProgressEvent::Converting {
                file: Some(context.clone()),
                elapsed_secs,
                duration_secs,
                percent,
            },
            ProgressEvent::Completed {
                file: None,
                duration_secs,
                success,
            } => ProgressEvent::Completed {
                file: Some(context.clone()),
                duration_secs,
                success,
            },
            other => other,
        }
    }
}

/// Receiver of progress events.
///
/// Implementations must not block for long and have no way to fail back into the converter.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards a single file's events into a batch sink, tagged with the file's context.
///
/// The converter's own `Completed` becomes a final 100% `Converting` tick here, since the
/// batch driver reports completion itself.
pub(crate) struct FileScopedSink<'a> {
    pub(crate) inner: &'a dyn ProgressSink,
    pub(crate) context: FileContext,
}

impl ProgressSink for FileScopedSink<'_> {
    fn emit(&self, event: ProgressEvent) {
        let event = match event {
            ProgressEvent::Completed { duration_secs, .. } => {
                ProgressEvent::converting(None, duration_secs, duration_secs)
            }
            other => other,
        };
        self.inner.emit(event.with_file(&self.context));
    }
}
