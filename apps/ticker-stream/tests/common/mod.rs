//! Shared fixtures for integration tests: an in-memory transport and
//! listener counters.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use ticker_stream::{
    CatalogEntry, CatalogError, ClientConfig, InboundFrame, OutboundFrame, StreamClient,
    StreamConnector, SymbolCatalog, TransportError, TransportSession,
};

/// Server side of one fake session.
pub struct Wire {
    pub outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    pub inbound: mpsc::Sender<InboundFrame>,
}

impl Wire {
    /// Deliver a text frame to the client.
    pub async fn push(&self, text: &str) {
        self.inbound
            .send(InboundFrame::Text(text.to_string()))
            .await
            .unwrap();
    }

    /// Close the session from the server side.
    pub async fn hang_up(&self) {
        self.inbound
            .send(InboundFrame::Closed { reason: None })
            .await
            .unwrap();
    }

    /// Every text frame the client has written so far.
    pub fn drain_text(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            if let OutboundFrame::Text(text) = frame {
                out.push(text);
            }
        }
        out
    }
}

/// In-memory `StreamConnector` that records every open.
#[derive(Default)]
pub struct FakeConnector {
    opens: AtomicUsize,
    urls: Mutex<Vec<String>>,
    wires: Mutex<Vec<Wire>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    fail_next: Mutex<Option<String>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A connector whose first open waits until the returned sender fires.
    pub fn gated() -> (Arc<Self>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let connector = Self::default();
        *connector.gate.lock() = Some(rx);
        (Arc::new(connector), tx)
    }

    /// Make the next open fail.
    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock() = Some(reason.to_string());
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Take the server side of the `index`-th session.
    pub fn take_wire(&self, index: usize) -> Wire {
        self.wires.lock().remove(index)
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn open(&self, url: &str) -> Result<TransportSession, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let failure = self.fail_next.lock().take();
        if let Some(reason) = failure {
            return Err(TransportError::Open(reason));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(64);
        self.wires.lock().push(Wire {
            outbound: out_rx,
            inbound: in_tx,
        });
        Ok(TransportSession {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Catalog stub for clients that never fetch.
pub struct NoCatalog;

#[async_trait]
impl SymbolCatalog for NoCatalog {
    async fn fetch_symbol_catalog(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(Vec::new())
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        api_key: ticker_stream::ApiKey::new("test-key"),
        stream_url: "wss://streamer.test/v2".to_string(),
        ..ClientConfig::default()
    }
}

pub fn client_with(connector: &Arc<FakeConnector>) -> StreamClient {
    StreamClient::with_parts(
        &test_config(),
        Arc::clone(connector) as Arc<dyn StreamConnector>,
        Arc::new(NoCatalog),
    )
}

/// Counts invocations of the three event channels.
#[derive(Default)]
pub struct EventCounts {
    pub accepted: AtomicUsize,
    pub rejected: AtomicUsize,
    pub prices: AtomicUsize,
    pub closes: AtomicUsize,
}

impl EventCounts {
    pub fn attach(client: &StreamClient) -> Arc<Self> {
        let counts = Arc::new(Self::default());

        let c = Arc::clone(&counts);
        client.on_connection(move |ok| {
            if ok {
                c.accepted.fetch_add(1, Ordering::SeqCst);
            } else {
                c.rejected.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });
        let c = Arc::clone(&counts);
        client.on_price(move |_| {
            c.prices.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let c = Arc::clone(&counts);
        client.on_close(move || {
            c.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        counts
    }

    pub fn snapshot(&self) -> (usize, usize, usize, usize) {
        (
            self.accepted.load(Ordering::SeqCst),
            self.rejected.load(Ordering::SeqCst),
            self.prices.load(Ordering::SeqCst),
            self.closes.load(Ordering::SeqCst),
        )
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Give the reader task time to drain queued frames.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub fn sub_add(base: &str) -> String {
    format!(r#"{{"action":"SubAdd","subs":["5~CCCAGG~{base}~USD"]}}"#)
}

pub fn sub_remove(base: &str) -> String {
    format!(r#"{{"action":"SubRemove","subs":["5~CCCAGG~{base}~USD"]}}"#)
}
