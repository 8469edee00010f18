use crate::models::UploadResult;
use crate::{Error, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Event emitted while an upload runs.
#[derive(Debug)]
pub enum UploadEvent {
    /// Fraction of the payload transferred, in `[0, 1]`.
    Progress(f64),
    /// Terminal outcome. Always the last event of an upload.
    Completed(Result<UploadResult>),
}

/// Forwards progress fractions to whoever holds the receiving end.
///
/// Reported values are clamped to `[0, 1]` and never decrease.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sink: Option<mpsc::UnboundedSender<UploadEvent>>,
    last: Arc<Mutex<f64>>,
}

impl ProgressReporter {
    /// A reporter that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sink: Some(tx),
                last: Arc::new(Mutex::new(0.0)),
            },
            rx,
        )
    }

    /// A reporter on the same sink whose high-water mark starts again at zero.
    ///
    /// Each upload reports through its own scope, so reusing a reporter across
    /// uploads does not swallow the later uploads' early progress.
    pub fn scoped(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            last: Arc::new(Mutex::new(0.0)),
        }
    }

    pub fn report(&self, fraction: f64) {
        let Some(sink) = &self.sink else {
            return;
        };
        if fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);

        if let Ok(mut last) = self.last.lock() {
            if fraction < *last {
                return;
            }
            *last = fraction;
        }
        // Receiver gone means nobody is listening anymore.
        let _ = sink.send(UploadEvent::Progress(fraction));
    }

    pub fn report_bytes(&self, sent: u64, total: u64) {
        if total == 0 {
            self.report(1.0);
        } else {
            self.report(sent as f64 / total as f64);
        }
    }

    pub(crate) fn complete(self, result: Result<UploadResult>) {
        if let Some(sink) = self.sink {
            let _ = sink.send(UploadEvent::Completed(result));
        }
    }
}

/// Receiving side of a spawned upload.
///
/// Yields zero or more [`UploadEvent::Progress`] events followed by exactly one
/// [`UploadEvent::Completed`]; after that it only returns `None`.
#[derive(Debug)]
pub struct UploadHandle {
    events: mpsc::UnboundedReceiver<UploadEvent>,
    finished: bool,
}

impl UploadHandle {
    pub(crate) fn new(events: mpsc::UnboundedReceiver<UploadEvent>) -> Self {
        Self {
            events,
            finished: false,
        }
    }

    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        if self.finished {
            return None;
        }

        match self.events.recv().await {
            Some(UploadEvent::Completed(result)) => {
                self.finish();
                Some(UploadEvent::Completed(result))
            }
            Some(event) => Some(event),
            None => {
                // Sender dropped without a result: the upload task died.
                self.finish();
                Some(UploadEvent::Completed(Err(Error::Invariant(
                    "Upload task ended without a result".to_string(),
                ))))
            }
        }
    }

    /// Drain progress events and return the terminal result.
    pub async fn wait(mut self) -> Result<UploadResult> {
        while let Some(event) = self.next_event().await {
            if let UploadEvent::Completed(result) = event {
                return result;
            }
        }
        Err(Error::Invariant("Upload result already consumed".to_string()))
    }

    fn finish(&mut self) {
        self.finished = true;
        self.events.close();
    }
}
