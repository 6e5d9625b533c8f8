//! In-memory status source replaying a fixed script.

use super::StatusSource;
use crate::error::{ChannelError, ChannelResult};
use crate::job::{JobKind, StatusUpdate, decode_status_message};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Step {
    Frame(String),
    Update(StatusUpdate),
    TransportError(String),
    Pause(Duration),
    Hang,
}

/// A [`StatusSource`] that replays raw frames, decoded updates, pauses and
/// transport errors in order, then ends.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    kind: JobKind,
    steps: VecDeque<Step>,
}

impl ScriptedSource {
    /// Creates an empty script for a job of the given kind.
    pub fn new(kind: JobKind) -> Self {
        Self { kind, steps: VecDeque::new() }
    }

    /// Appends a raw wire frame, decoded as the WebSocket transport would.
    #[must_use]
    pub fn frame(mut self, text: impl Into<String>) -> Self {
        self.steps.push_back(Step::Frame(text.into()));
        self
    }

    /// Appends an already-decoded update.
    #[must_use]
    pub fn update(mut self, update: StatusUpdate) -> Self {
        self.steps.push_back(Step::Update(update));
        self
    }

    /// Appends a transport failure.
    #[must_use]
    pub fn transport_error(mut self, reason: impl Into<String>) -> Self {
        self.steps.push_back(Step::TransportError(reason.into()));
        self
    }

    /// Appends a delay before the next step.
    #[must_use]
    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push_back(Step::Pause(duration));
        self
    }

    /// Appends a step that never completes.
    #[must_use]
    pub fn hang(mut self) -> Self {
        self.steps.push_back(Step::Hang);
        self
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn next_update(&mut self) -> ChannelResult<Option<StatusUpdate>> {
        loop {
            let Some(step) = self.steps.pop_front() else {
                return Ok(None);
            };
            match step {
                Step::Frame(text) => return Ok(Some(decode_status_message(self.kind, &text))),
                Step::Update(update) => return Ok(Some(update)),
                Step::TransportError(reason) => return Err(ChannelError::Transport(reason)),
                Step::Pause(duration) => tokio::time::sleep(duration).await,
                Step::Hang => std::future::pending::<()>().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[tokio::test]
    async fn test_replays_in_order() {
        let mut source = ScriptedSource::new(JobKind::Animation)
            .frame("")
            .pause(Duration::from_millis(1))
            .update(StatusUpdate::progress("halfway"))
            .transport_error("gone");

        let first = source.next_update().await.unwrap().unwrap();
        assert_eq!(first.status, JobStatus::Unknown);

        let second = source.next_update().await.unwrap().unwrap();
        assert_eq!(second.message.as_deref(), Some("halfway"));

        assert!(source.next_update().await.is_err());
        assert!(source.next_update().await.unwrap().is_none());
    }
}
