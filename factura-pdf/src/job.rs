//! PDF generation jobs.
//!
//! A [`PdfJob`] wraps one call to a [`PdfPrinter`] in a spawned task with observable states
//! (`Idle`, `InProgress`, `Ready`, `Failed`) and a cancellation token. Dropping the job cancels
//! it, so a job owned by an HTTP handler stops, and closes its browser, when the client goes
//! away.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{error::Error, printer::PdfPrinter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    InProgress,
    Ready(Arc<[u8]>),
    Failed(String),
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Ready(_) | JobState::Failed(_))
    }
}

/// Requests cancellation of every linked [`Cancellation`]
#[derive(Debug, Clone)]
pub struct Canceller(Arc<watch::Sender<bool>>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observer side of a cancellation token. Dropping every [`Canceller`] also cancels.
#[derive(Debug, Clone)]
pub struct Cancellation(watch::Receiver<bool>);

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        // An error means every Canceller is gone
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

pub fn cancellation() -> (Canceller, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (Canceller(Arc::new(tx)), Cancellation(rx))
}

pub struct PdfJob {
    printer: Arc<dyn PdfPrinter>,
    url: String,
    state: watch::Receiver<JobState>,
    sender: Option<watch::Sender<JobState>>,
    canceller: Canceller,
    cancellation: Cancellation,
    handle: Option<JoinHandle<Result<Arc<[u8]>, Error>>>,
}

impl PdfJob {
    /// Create an idle job that will print `url` with `printer`
    pub fn new(printer: Arc<dyn PdfPrinter>, url: impl Into<String>) -> Self {
        let (sender, state) = watch::channel(JobState::Idle);
        let (canceller, cancellation) = cancellation();
        Self {
            printer,
            url: url.into(),
            state,
            sender: Some(sender),
            canceller,
            cancellation,
            handle: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every state transition
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.clone()
    }

    /// Handle that can cancel the job from elsewhere, e.g. a signal handler
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Spawn the print task. Calling this more than once has no effect.
    pub fn start(&mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        sender.send_replace(JobState::InProgress);
        let printer = Arc::clone(&self.printer);
        let url = self.url.clone();
        let cancellation = self.cancellation.clone();
        debug!(%url, "pdf job started");
        self.handle = Some(tokio::spawn(async move {
            let result = printer
                .print(&url, &cancellation)
                .await
                .map(Arc::<[u8]>::from);
            match &result {
                Ok(pdf) => {
                    info!(%url, bytes = pdf.len(), "pdf job ready");
                    sender.send_replace(JobState::Ready(Arc::clone(pdf)));
                }
                Err(e) if e.is_cancelled() => {
                    info!(%url, "pdf job cancelled");
                    sender.send_replace(JobState::Failed(e.to_string()));
                }
                Err(e) => {
                    warn!(%url, error = %e, "pdf job failed");
                    sender.send_replace(JobState::Failed(e.to_string()));
                }
            }
            result
        }));
    }

    /// Start the job if needed and wait for its outcome
    pub async fn finish(&mut self) -> Result<Arc<[u8]>, Error> {
        self.start();
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::from(format!("pdf job task failed: {e}"))),
            },
            None => match self.state() {
                JobState::Ready(pdf) => Ok(pdf),
                JobState::Failed(message) => Err(Error::from(message)),
                JobState::Idle | JobState::InProgress => {
                    Err(Error::from(String::from("pdf job has no result")))
                }
            },
        }
    }

    pub async fn run(mut self) -> Result<Arc<[u8]>, Error> {
        self.finish().await
    }
}

impl Drop for PdfJob {
    fn drop(&mut self) {
        if !self.state.borrow().is_finished() {
            self.canceller.cancel();
        }
    }
}
