//! WebSocket push transport for job status.

use super::StatusSource;
use crate::error::{ChannelError, ChannelResult};
use crate::job::{JobKind, StatusUpdate, decode_status_message};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reads status frames from `{ws_base}/ws/task-status/{job_id}`.
///
/// The connection is opened lazily on the first read.
pub struct WebSocketSource {
    url: String,
    kind: JobKind,
    socket: Option<Socket>,
}

impl WebSocketSource {
    /// Creates a source for the given status socket URL.
    pub fn new(url: impl Into<String>, kind: JobKind) -> Self {
        Self { url: url.into(), kind, socket: None }
    }

    /// The socket URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn socket(&mut self) -> ChannelResult<&mut Socket> {
        if self.socket.is_none() {
            debug!(url = %self.url, "Connecting status socket");
            let (socket, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
                ChannelError::Transport(format!("Failed to connect to {}: {}", self.url, e))
            })?;
            self.socket = Some(socket);
        }
        self.socket
            .as_mut()
            .ok_or_else(|| ChannelError::Transport(format!("No socket for {}", self.url)))
    }
}

#[async_trait]
impl StatusSource for WebSocketSource {
    async fn next_update(&mut self) -> ChannelResult<Option<StatusUpdate>> {
        let kind = self.kind;
        let socket = self.socket().await?;

        loop {
            let message = match socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(ChannelError::Transport(e.to_string())),
                None => return Ok(None),
            };

            match message {
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                other => {
                    let text = other
                        .to_text()
                        .map_err(|e| ChannelError::Transport(format!("Non-text frame: {}", e)))?;
                    return Ok(Some(decode_status_message(kind, text)));
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                debug!(url = %self.url, error = %e, "Status socket close failed");
            }
        }
    }
}
