//! Conversion orchestration.
//!
//! [`Converter`] turns one video file into one audio file: it validates the source, resolves
//! the destination, opens the source through its [`Transcoder`], refuses sources without an
//! audio track, runs the transcode and checks that a non-empty file came out. The batch
//! driver in [`batch`] runs it over a directory tree.
//!
//! A converter holds at most one open [`MediaHandle`] at a time. The handle is released on
//! every exit path, and [`Converter::stop_in_flight`] can release it early from another task
//! to abort a running transcode.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::Instrument;

use crate::discovery::is_supported_video;
use crate::paths;
use crate::transcoder::{HandleCloser, MediaHandle, TranscodeError, Transcoder};
use crate::ConversionError;

pub mod batch;
mod progress;
mod types;

pub use progress::{FileContext, NoProgress, ProgressEvent, ProgressSink};
pub use types::{
    AudioFormat, BatchRequest, BatchSummary, ConversionRequest, ConversionResult,
    EncodingParameters, DEFAULT_SAMPLE_RATE,
};

/// Check a source path: it must exist and carry a supported video extension
pub fn check_source(source: &Path) -> Result<(), ConversionError> {
    if !source.is_file() {
        return Err(ConversionError::SourceNotFound {
            path: source.to_path_buf(),
        });
    }
    if !is_supported_video(source) {
        return Err(ConversionError::UnsupportedFormat {
            path: source.to_path_buf(),
        });
    }
    Ok(())
}

/// Converts video files to audio files through a [`Transcoder`]
pub struct Converter<T> {
    transcoder: T,
    span: tracing::Span,
    /// Remote close for the handle currently open, if any
    in_flight: Mutex<Option<HandleCloser>>,
    stop_requested: AtomicBool,
    /// Serialises conversions so only one handle is ever open
    conversion_lock: tokio::sync::Mutex<()>,
}

/// Keeps the open handle registered with its converter and releases both on drop
struct InFlight<'a> {
    handle: MediaHandle,
    slot: &'a Mutex<Option<HandleCloser>>,
}

impl<'a> InFlight<'a> {
    fn register(handle: MediaHandle, slot: &'a Mutex<Option<HandleCloser>>) -> Self {
        *lock(slot) = Some(handle.closer());
        Self { handle, slot }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.handle.close();
        lock(self.slot).take();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transcoder> Converter<T> {
    /// Create a converter that logs under a `converter` span
    pub fn new(transcoder: T) -> Self {
        Self::with_span(transcoder, tracing::info_span!("converter"))
    }

    /// Create a converter that logs under the caller's span
    pub fn with_span(transcoder: T, span: tracing::Span) -> Self {
        Self {
            transcoder,
            span,
            in_flight: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
            conversion_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Whether `source` can be converted. Failures are logged with their reason.
    pub fn validate(&self, source: &Path) -> bool {
        let _entered = self.span.enter();
        match check_source(source) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        }
    }

    /// Whether a media handle is currently open
    pub fn has_in_flight(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Release the currently open handle, aborting its transcode.
    ///
    /// Also asks a running batch to stop scheduling files. Returns `true` if a handle was
    /// actually open; calling it with nothing in flight is harmless. A conversion that is
    /// still opening its source is cancelled as soon as its handle exists.
    pub fn stop_in_flight(&self) -> bool {
        self.stop_requested.store(true, Ordering::SeqCst);
        let closed = lock(&self.in_flight)
            .as_ref()
            .map(|closer| closer.close())
            .unwrap_or(false);

        let _entered = self.span.enter();
        if closed {
            tracing::info!("Conversion stopped");
        } else {
            tracing::debug!("Stop requested with no conversion in flight");
        }
        closed
    }

    /// Whether a stop has been requested since the current conversion or batch started
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_stop(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    /// Convert one file. Never fails outright: problems come back inside the result.
    pub async fn convert_one(
        &self,
        request: &ConversionRequest,
        sink: &dyn ProgressSink,
    ) -> ConversionResult {
        let _serial = self.conversion_lock.lock().await;
        self.reset_stop();
        self.run_conversion(request, sink)
            .instrument(self.span.clone())
            .await
    }

    /// Convert one file under the conversion lock, which the caller holds
    async fn run_conversion(
        &self,
        request: &ConversionRequest,
        sink: &dyn ProgressSink,
    ) -> ConversionResult {
        let source = request.source.as_path();

        if let Err(e) = check_source(source) {
            tracing::error!("{}", e);
            return ConversionResult::failed(source, None, 0.0, e);
        }

        let destination = match self.prepare_destination(request) {
            Ok(destination) => destination,
            Err(e) => {
                tracing::error!("{}", e);
                return ConversionResult::failed(source, None, 0.0, e);
            }
        };

        tracing::info!("Starting conversion: {} -> {}", source.display(), destination.display());

        let handle = match self.transcoder.open(source).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to open {}: {}", source.display(), e.detail());
                let error = ConversionError::TranscoderFailure(e.detail());
                return ConversionResult::failed(source, Some(destination), 0.0, error);
            }
        };
        let in_flight = InFlight::register(handle, &self.in_flight);
        let duration = in_flight.handle.duration_secs();

        // A stop that arrived while the source was being opened found nothing to close.
        if self.stop_requested() {
            drop(in_flight);
            tracing::warn!("Conversion of {} was stopped", source.display());
            return ConversionResult::failed(
                source,
                Some(destination),
                duration,
                ConversionError::Cancelled,
            );
        }

        if !in_flight.handle.has_audio() {
            drop(in_flight);
            let error = ConversionError::NoAudioTrack {
                path: source.to_path_buf(),
            };
            tracing::error!("{}", error);
            return ConversionResult::failed(source, Some(destination), duration, error);
        }

        let params = request.params.to_transcode_params(request.overwrite);
        tracing::debug!(?params, "Effective encoding parameters");

        sink.emit(ProgressEvent::converting(None, 0.0, duration));
        let report = |elapsed: f64| sink.emit(ProgressEvent::converting(None, elapsed, duration));

        let outcome = self
            .transcoder
            .transcode(&in_flight.handle, &destination, &params, &report)
            .await;
        drop(in_flight);

        match outcome {
            Ok(()) => {}
            Err(TranscodeError::Closed) => {
                tracing::warn!("Conversion of {} was stopped", source.display());
                return ConversionResult::failed(
                    source,
                    Some(destination),
                    duration,
                    ConversionError::Cancelled,
                );
            }
            Err(e) => {
                tracing::error!("Conversion failed {}: {}", source.display(), e.detail());
                let error = ConversionError::TranscoderFailure(e.detail());
                return ConversionResult::failed(source, Some(destination), duration, error);
            }
        }

        if !has_content(&destination) {
            let error = ConversionError::EmptyOrMissingOutput {
                path: destination.clone(),
            };
            tracing::error!("Conversion produced an invalid output: {}", destination.display());
            return ConversionResult::failed(source, Some(destination), duration, error);
        }

        sink.emit(ProgressEvent::Completed {
            file: None,
            duration_secs: duration,
            success: true,
        });
        tracing::info!("Conversion complete: {}", destination.display());
        ConversionResult::succeeded(source, destination, duration)
    }

    /// Resolve the destination path and make sure it can be written
    fn prepare_destination(&self, request: &ConversionRequest) -> Result<PathBuf, ConversionError> {
        let destination = match &request.destination {
            Some(destination) => destination.clone(),
            None => paths::resolve_output_path(
                &request.source,
                request.output_dir.as_deref(),
                request.params.format,
            )?,
        };

        if !paths::ensure_parent_exists(&destination) {
            return Err(ConversionError::OutputDirectoryUnavailable {
                path: destination
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            });
        }

        if destination.exists() {
            if !request.overwrite {
                return Err(ConversionError::OutputExists { path: destination });
            }
            tracing::warn!("Output file exists and will be overwritten: {}", destination.display());
        }

        Ok(destination)
    }
}

/// The file exists and is not empty
fn has_content(path: &Path) -> bool {
    fs_err::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
