//! Progress and cancellation plumbing shared by every extractor.
//!
//! One `ExtractionContext` lives for exactly one extraction. Its
//! `ProgressReporter` guarantees the observer sees a non-decreasing percentage
//! and nothing at all after a terminal status (`done`, `cancelled`, `error`).

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ExtractionError;

/// Phase label attached to each progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    Preparing,
    Loading,
    Extracting,
    OcrFallback,
    Recognizing,
    Done,
    Cancelled,
    Error,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStatus::Done | ProgressStatus::Cancelled | ProgressStatus::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Preparing => "preparing",
            ProgressStatus::Loading => "loading",
            ProgressStatus::Extracting => "extracting",
            ProgressStatus::OcrFallback => "ocr-fallback",
            ProgressStatus::Recognizing => "recognizing",
            ProgressStatus::Done => "done",
            ProgressStatus::Cancelled => "cancelled",
            ProgressStatus::Error => "error",
        }
    }
}

/// A single progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionProgress {
    pub percent: u8,
    pub status: ProgressStatus,
}

pub type ProgressCallback = Arc<dyn Fn(ExtractionProgress) + Send + Sync>;

#[derive(Debug, Default)]
struct ProgressState {
    last: u8,
    closed: bool,
}

/// Monotonic, terminal-aware progress emitter. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    state: Arc<Mutex<ProgressState>>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("last_percent", &self.last_percent())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ProgressReporter {
    pub fn new(callback: impl Fn(ExtractionProgress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            state: Arc::new(Mutex::new(ProgressState::default())),
        }
    }

    /// Reporter that tracks state but notifies nobody.
    pub fn silent() -> Self {
        Self {
            callback: None,
            state: Arc::new(Mutex::new(ProgressState::default())),
        }
    }

    /// Emit `percent` (clamped to 0..=100 and to the last emitted value).
    /// Returns `false` when the reporter is already closed.
    pub fn report(&self, percent: u8, status: ProgressStatus) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return false;
        }

        let percent = percent.min(100).max(state.last);
        state.last = percent;
        if status.is_terminal() {
            state.closed = true;
        }

        // Emitted under the lock so concurrent clones cannot reorder events.
        if let Some(callback) = &self.callback {
            callback(ExtractionProgress { percent, status });
        }
        true
    }

    /// Terminal event at the last reached percentage (`done` jumps to 100).
    pub fn finish(&self, status: ProgressStatus) -> bool {
        let percent = if status == ProgressStatus::Done {
            100
        } else {
            self.last_percent()
        };
        self.report(percent, status)
    }

    pub fn last_percent(&self) -> u8 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).last
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).closed
    }
}

/// A reserved slice of the 0–100 scale, so strategy switches render as one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRange {
    pub start: u8,
    pub end: u8,
}

impl ProgressRange {
    pub const FULL: ProgressRange = ProgressRange { start: 0, end: 100 };

    pub fn new(start: u8, end: u8) -> Self {
        let start = start.min(100);
        Self {
            start,
            end: end.clamp(start, 100),
        }
    }

    /// Map a fraction in `[0, 1]` into the range.
    pub fn at(&self, fraction: f32) -> u8 {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let span = f32::from(self.end - self.start);
        self.start + (span * fraction).round() as u8
    }

    /// Like `at`, but never reaches `end`; the end is reserved for success.
    pub fn before_end(&self, fraction: f32) -> u8 {
        let value = self.at(fraction);
        if self.end > self.start {
            value.min(self.end - 1)
        } else {
            value
        }
    }

    /// Sub-slice `index` of `count` equal parts.
    pub fn slice(&self, index: usize, count: usize) -> ProgressRange {
        if count == 0 {
            return *self;
        }
        let span = f32::from(self.end - self.start);
        let from = self.start + (span * index as f32 / count as f32).round() as u8;
        let to = self.start + (span * (index + 1) as f32 / count as f32).round() as u8;
        ProgressRange::new(from, to)
    }
}

/// Per-extraction context: progress, shared cancellation, optional status messages.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub progress: ProgressReporter,
    pub cancel: CancellationToken,
    status_tx: Option<mpsc::UnboundedSender<String>>,
}

impl ExtractionContext {
    pub fn new(progress: ProgressReporter, cancel: CancellationToken) -> Self {
        Self {
            progress,
            cancel,
            status_tx: None,
        }
    }

    /// Context with no observers and a fresh token.
    pub fn detached() -> Self {
        Self::new(ProgressReporter::silent(), CancellationToken::new())
    }

    /// Route incremental human-readable status messages to `tx`.
    pub fn with_status_sink(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    /// Same observers, but cancellation scoped to a child token.
    pub(crate) fn child(&self) -> Self {
        Self {
            progress: self.progress.clone(),
            cancel: self.cancel.child_token(),
            status_tx: self.status_tx.clone(),
        }
    }

    /// Send a status message. Dropped once the extraction is cancelled or finished.
    pub fn status(&self, message: impl Into<String>) {
        if self.cancel.is_cancelled() || self.progress.is_closed() {
            return;
        }
        if let Some(tx) = &self.status_tx {
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(message.into());
        }
    }

    /// Report progress unless cancellation has been observed.
    pub fn report(&self, percent: u8, status: ProgressStatus) {
        if !self.cancel.is_cancelled() {
            self.progress.report(percent, status);
        }
    }

    pub fn check_cancelled(&self) -> Result<(), ExtractionError> {
        if self.cancel.is_cancelled() {
            Err(ExtractionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Race `work` against cancellation. The losing future is dropped, so a
    /// late result is discarded rather than observed.
    pub async fn run_cancellable<T>(
        &self,
        work: impl std::future::Future<Output = Result<T, ExtractionError>>,
    ) -> Result<T, ExtractionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ExtractionError::Cancelled),
            result = work => {
                self.check_cancelled()?;
                result
            }
        }
    }
}
