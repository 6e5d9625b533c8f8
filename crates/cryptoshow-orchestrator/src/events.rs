//! Session event broadcasting.
//!
//! Front ends subscribe to observe job progress and scene changes without
//! polling the session.

use crate::animation::AnimationPhase;
use crate::error::{Result, SessionError};
use cryptoshow_core::{ChannelError, JobChannel, JobKind, JobStatus, StatusUpdate, UNKNOWN_ERROR};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Capacity of the event channel.
const EVENT_CAPACITY: usize = 100;

/// Events emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A job was accepted by the backend.
    JobSubmitted {
        /// Job ID.
        job_id: String,
        /// Job kind.
        kind: JobKind,
    },
    /// A status update arrived for a job.
    JobStatus {
        /// Job ID.
        job_id: String,
        /// New status.
        status: JobStatus,
        /// Progress or error text.
        message: Option<String>,
    },
    /// A structure finished loading.
    StructureLoaded {
        /// Structure name.
        name: String,
        /// True for the primary.
        primary: bool,
    },
    /// The scene collection changed.
    SceneChanged {
        /// Number of structures.
        structures: usize,
        /// Number of candidates.
        candidates: usize,
    },
    /// The animation state machine moved.
    AnimationPhaseChanged {
        /// New phase.
        phase: AnimationPhase,
    },
    /// An operation failed.
    Error {
        /// User-facing text.
        message: String,
    },
}

/// Broadcasts session events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Emits an event. Events nobody listens to are dropped.
    pub fn emit(&self, event: SessionEvent) {
        debug!("Session event: {:?}", event);
        let _ = self.sender.send(event);
    }
}

/// Follows a job channel to its terminal update, re-emitting every update.
///
/// # Returns
/// The Success update, or `None` if `cancel` fired first. The channel is
/// closed on cancellation.
///
/// # Errors
/// `JobFailed` with the backend text verbatim on Failure, `Channel` if the
/// channel closed without a terminal update.
pub async fn follow_job(
    events: &EventBus,
    channel: &mut JobChannel,
    cancel: &CancellationToken,
) -> Result<Option<StatusUpdate>> {
    let job_id = channel.job_id().to_string();
    loop {
        let update = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(job_id = %job_id, "Stopped following job");
                channel.close();
                return Ok(None);
            }
            update = channel.next() => update,
        };

        let Some(update) = update else {
            return Err(ChannelError::Closed(job_id).into());
        };
        events.emit(SessionEvent::JobStatus {
            job_id: job_id.clone(),
            status: update.status,
            message: update.message.clone(),
        });

        match update.status {
            JobStatus::Success => return Ok(Some(update)),
            JobStatus::Failure => {
                let message = update.message.unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                return Err(SessionError::JobFailed { job_id, message });
            }
            JobStatus::Pending | JobStatus::Progress | JobStatus::Unknown => {}
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
