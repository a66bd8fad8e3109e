//! cyphal-udp integration test harness.
//!
//! Every scenario wires two in-process nodes together: frames popped from one
//! node's TX queue are fed straight into the other node's `rx_accept`, with
//! the test in control of ordering, duplication, loss and timestamps.
//!
//!   cargo test --test integration
//!   RUST_LOG=cyphal_udp=trace cargo test --test integration -- --nocapture
//!
//! Nodes use a `BudgetAllocator` so that each scenario can finish by
//! checking that every buffer went back where it came from.

mod roundtrip;
mod subscriptions;

use std::sync::Once;

use anyhow::{bail, Context, Result};
use cyphal_udp::{
    BudgetAllocator, Instance, Microsecond, RxOutcome, RxTransfer, TransportConfig, TxQueue,
};
use tracing_subscriber::EnvFilter;

// ── Harness ───────────────────────────────────────────────────────────────────

static LOGGING: Once = Once::new();

/// Install a fmt subscriber driven by RUST_LOG, once per test binary.
pub fn init_logging() {
    LOGGING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// One endpoint: an instance plus its (single-interface) TX queue.
pub struct Node {
    pub ins: Instance<BudgetAllocator>,
    pub tx: TxQueue,
}

/// Build a node the way an application would: from config text.
pub fn node(node_id: Option<u16>, mtu_bytes: usize) -> Result<Node> {
    init_logging();
    let id_line = match node_id {
        Some(id) => format!("id = {id}\n"),
        None => String::new(),
    };
    let text = format!(
        "[node]\n{id_line}local_ip_addr = \"192.168.1.1\"\n\n\
         [tx]\nmtu_bytes = {mtu_bytes}\nqueue_capacity = 4096\n"
    );
    let config = TransportConfig::from_toml_str(&text).context("harness config")?;
    let ins = Instance::from_config(&config, BudgetAllocator::unlimited())?;
    let tx = TxQueue::from_config(&config);
    tracing::debug!(?node_id, mtu_bytes, "harness node up");
    Ok(Node { ins, tx })
}

/// Pop every queued frame in transmission order, copying the bytes out and
/// returning the buffers to the sender's allocator.
pub fn drain(node: &mut Node) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Some(key) = node.tx.peek().map(|item| item.key()) {
        if let Some(item) = node.tx.pop(key) {
            frames.push(item.frame.to_vec());
            node.ins.release(item.into_frame());
        }
    }
    frames
}

/// Feed frames into a node, collecting completed transfers. Any error fails
/// the call.
pub fn deliver(
    node: &mut Node,
    timestamp_usec: Microsecond,
    frames: &[Vec<u8>],
    redundant_transport_index: u8,
) -> Result<Vec<RxTransfer>> {
    let mut out = Vec::new();
    for (i, frame) in frames.iter().enumerate() {
        let outcome = node
            .ins
            .rx_accept(timestamp_usec, frame, redundant_transport_index)
            .with_context(|| format!("frame {i} of {}", frames.len()))?;
        if let RxOutcome::Rejected(reason) = &outcome {
            bail!("frame {i} rejected: {reason}");
        }
        if let Some(transfer) = outcome.into_transfer() {
            out.push(transfer);
        }
    }
    Ok(out)
}

/// Hand received payloads back to the receiver's allocator.
pub fn release_all(node: &mut Node, transfers: Vec<RxTransfer>) {
    for transfer in transfers {
        node.ins.release(transfer.payload);
    }
}

/// Fail if any buffer is still outstanding.
pub fn assert_no_leaks(node: &Node, who: &str) {
    let alloc = node.ins.allocator();
    assert_eq!(
        alloc.fragments(),
        0,
        "{who}: {} fragments ({} bytes) still allocated",
        alloc.fragments(),
        alloc.allocated_bytes()
    );
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_harness_nodes_come_up_clean() {
    let a = node(Some(1), 1408).expect("node a");
    let b = node(None, 600).expect("node b");
    assert_eq!(a.ins.node_id(), Some(1));
    assert_eq!(b.ins.node_id(), None);
    assert_eq!(b.tx.mtu_bytes(), 600);
    assert_eq!(a.tx.capacity(), 4096);
    assert_no_leaks(&a, "a");
    assert_no_leaks(&b, "b");
}
