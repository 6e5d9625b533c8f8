//! Job status channels.
//!
//! A [`JobChannel`] observes one submitted job. A pump task reads updates
//! from a [`StatusSource`] (WebSocket push, HTTP polling, or a script) and
//! forwards them to exactly one consumer until the first terminal update,
//! a transport error, or an explicit [`JobChannel::close`].

mod polling;
mod scripted;
mod websocket;

pub use polling::PollingSource;
pub use scripted::ScriptedSource;
pub use websocket::WebSocketSource;

use crate::error::{ChannelError, ChannelResult};
use crate::job::{Job, JobKind, JobStatus, StatusUpdate, UNKNOWN_ERROR};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A transport producing status updates for one job.
#[async_trait]
pub trait StatusSource: Send {
    /// Waits for the next update.
    ///
    /// # Returns
    /// `Ok(None)` when the stream ended without further updates.
    async fn next_update(&mut self) -> ChannelResult<Option<StatusUpdate>>;

    /// Releases the underlying transport.
    async fn close(&mut self) {}
}

/// Handle to an open status channel for one job.
///
/// The channel owns the job's lifecycle: every update is applied to the job
/// before delivery, and updates the job refuses are dropped.
///
/// Dropping the handle closes the channel.
pub struct JobChannel {
    job_id: String,
    kind: JobKind,
    job: Arc<Mutex<Job>>,
    receiver: Option<mpsc::UnboundedReceiver<StatusUpdate>>,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl JobChannel {
    /// Opens a channel for `job`, spawning the pump on the current runtime.
    pub fn open(job: &Job, source: Box<dyn StatusSource>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        // Fires on close as well as when the pump finishes
        let finished = cancel.child_token();
        let state = Arc::new(Mutex::new(job.clone()));

        info!(job_id = %job.job_id, kind = %job.kind, "Opening job channel");
        tokio::spawn(pump(
            Arc::clone(&state),
            source,
            sender,
            cancel.clone(),
            finished.clone(),
        ));

        Self {
            job_id: job.job_id.clone(),
            kind: job.kind,
            job: state,
            receiver: Some(receiver),
            cancel,
            finished,
        }
    }

    /// The observed job's id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The observed job's kind.
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// The job's current status.
    pub fn status(&self) -> JobStatus {
        self.job.lock().unwrap_or_else(PoisonError::into_inner).status
    }

    /// Snapshot of the observed job.
    pub fn job(&self) -> Job {
        self.job.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns true once the channel was closed or the pump finished.
    pub fn is_closed(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// A token cancelled once the channel is closed or the pump finished.
    pub fn closed_token(&self) -> CancellationToken {
        self.finished.clone()
    }

    /// A token cancelled when the caller closes the channel.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Closes the channel. No further updates are delivered.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(job_id = %self.job_id, "Closing job channel");
            self.cancel.cancel();
        }
    }

    /// Receives the next update.
    ///
    /// # Returns
    /// `None` after the terminal update was delivered, after `close`, or if
    /// the updates were handed to a handler via [`on_status`](Self::on_status).
    pub async fn next(&mut self) -> Option<StatusUpdate> {
        let receiver = self.receiver.as_mut()?;
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            update = receiver.recv() => update,
        }
    }

    /// Consumes updates until the terminal one.
    ///
    /// # Errors
    /// `AlreadySubscribed` if a handler owns the updates, `Closed` if the
    /// channel closed before a terminal update.
    pub async fn wait_terminal(&mut self) -> ChannelResult<StatusUpdate> {
        if self.receiver.is_none() {
            return Err(ChannelError::AlreadySubscribed(self.job_id.clone()));
        }
        while let Some(update) = self.next().await {
            if update.status.is_terminal() {
                return Ok(update);
            }
        }
        Err(ChannelError::Closed(self.job_id.clone()))
    }

    /// Hands every update to `handler` on a spawned task.
    ///
    /// # Errors
    /// `AlreadySubscribed` on a second registration or after the updates
    /// were already consumed through [`next`](Self::next).
    pub fn on_status<F>(&mut self, mut handler: F) -> ChannelResult<JoinHandle<()>>
    where
        F: FnMut(StatusUpdate) + Send + 'static,
    {
        let mut receiver =
            self.receiver.take().ok_or_else(|| ChannelError::AlreadySubscribed(self.job_id.clone()))?;
        let cancel = self.cancel.clone();

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    update = receiver.recv() => match update {
                        Some(update) => handler(update),
                        None => break,
                    },
                }
            }
        }))
    }
}

impl Drop for JobChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn pump(
    job: Arc<Mutex<Job>>,
    mut source: Box<dyn StatusSource>,
    sender: mpsc::UnboundedSender<StatusUpdate>,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    let job_id = job.lock().unwrap_or_else(PoisonError::into_inner).job_id.clone();
    let deliver = |update: StatusUpdate| {
        if !job.lock().unwrap_or_else(PoisonError::into_inner).apply(&update) {
            debug!(job_id = %job_id, status = %update.status, "Dropping update for a finished job");
            return Ok(());
        }
        sender.send(update).map_err(|_| ())
    };

    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(job_id = %job_id, "Job channel cancelled");
                break;
            }
            item = source.next_update() => item,
        };

        let update = match item {
            Ok(Some(update)) => update,
            Ok(None) => {
                warn!(job_id = %job_id, "Status stream ended before a terminal status");
                let _ = deliver(StatusUpdate::failure(UNKNOWN_ERROR));
                break;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Job channel transport error");
                let _ = deliver(StatusUpdate::failure(UNKNOWN_ERROR));
                break;
            }
        };

        let terminal = update.status.is_terminal();
        debug!(job_id = %job_id, status = %update.status, "Job status update");
        if deliver(update).is_err() || terminal {
            break;
        }
    }

    source.close().await;
    finished.cancel();
}
