//! WebSocket Transport
//!
//! `StreamConnector` backed by `tokio-tungstenite` over rustls.
//!
//! Each session runs one task that owns both halves of the socket: it writes
//! outbound frames, answers pings, and forwards text frames to the session's
//! inbound channel. `InboundFrame::Closed` is always the last frame sent.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::application::ports::{
    InboundFrame, OutboundFrame, StreamConnector, TransportError, TransportSession,
};

/// Default inbound buffer, in frames.
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

/// Production WebSocket connector.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    inbound_capacity: usize,
}

impl WebSocketConnector {
    /// Create a connector with the given inbound buffer size.
    #[must_use]
    pub const fn new(inbound_capacity: usize) -> Self {
        Self { inbound_capacity }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_INBOUND_CAPACITY)
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<TransportSession, TransportError> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Open(e.to_string()))?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(self.inbound_capacity.max(1));

        tokio::spawn(run_session(ws_stream, out_rx, in_tx));

        Ok(TransportSession {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

async fn run_session<S>(
    ws_stream: S,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound: mpsc::Sender<InboundFrame>,
) where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(e) = write.send(Message::text(text)).await {
                        tracing::warn!(error = %e, "WebSocket write failed");
                        break Some(e.to_string());
                    }
                }
                Some(OutboundFrame::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(InboundFrame::Text(text.as_str().to_string())).await.is_err() {
                        // Session reader dropped.
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        break Some(e.to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Server sent close frame");
                    break frame.map(|f| f.reason.as_str().to_string()).filter(|r| !r.is_empty());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket read failed");
                    break Some(e.to_string());
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    break None;
                }
            },
        }
    };

    let _ = inbound.send(InboundFrame::Closed { reason }).await;
}
