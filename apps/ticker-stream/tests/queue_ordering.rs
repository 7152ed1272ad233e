//! Queue Ordering Property Tests
//!
//! Any mix of subscribe/unsubscribe issued while the transport is still
//! opening reaches the wire exactly once per call, in call order.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::{FakeConnector, client_with, sub_add, sub_remove, wait_for};
use ticker_stream::ConnectionState;

#[derive(Debug, Clone, Copy)]
enum Op {
    Subscribe(&'static str),
    Unsubscribe(&'static str),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let symbol = prop::sample::select(vec!["BTC", "ETH", "SOL", "DOGE"]);
    (any::<bool>(), symbol).prop_map(|(add, s)| {
        if add {
            Op::Subscribe(s)
        } else {
            Op::Unsubscribe(s)
        }
    })
}

async fn run_ops(ops: &[Op]) -> (Vec<String>, Vec<String>) {
    let (connector, release) = FakeConnector::gated();
    let client = Arc::new(client_with(&connector));

    let pending = Arc::clone(&client);
    let connecting = tokio::spawn(async move { pending.connect().await });
    wait_for(|| client.state() == ConnectionState::Connecting).await;

    let expected: Vec<String> = ops
        .iter()
        .map(|op| match *op {
            Op::Subscribe(s) => {
                client.subscribe(s).unwrap();
                sub_add(s)
            }
            Op::Unsubscribe(s) => {
                client.unsubscribe(s).unwrap();
                sub_remove(s)
            }
        })
        .collect();

    release.send(()).unwrap();
    connecting.await.unwrap().unwrap();

    let mut wire = connector.take_wire(0);
    (expected, wire.drain_text())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn queued_requests_flush_exactly_once_in_order(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (expected, sent) = runtime.block_on(run_ops(&ops));
        prop_assert_eq!(sent, expected);
    }
}
