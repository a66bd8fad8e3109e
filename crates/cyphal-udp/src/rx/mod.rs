//! Receive pipeline: parse, route by port-ID, reassemble.
//!
//! ```text
//!   datagram ─► RxFrame::parse ─► destination check ─► subscription lookup
//!                                                          │
//!                          RxTransfer ◄─ RxSession::update ◄┘
//! ```
//!
//! The only variable-complexity steps are the subscription lookup, which is
//! logarithmic in the number of subscriptions of that transfer kind, and the
//! payload copy.

mod frame;
mod session;
mod subscription;

pub use frame::RejectReason;
pub use session::RxSession;
pub use subscription::RxSubscription;

use crate::error::{ArgumentError, Result};
use crate::instance::Instance;
use crate::memory::Allocator;
use crate::transfer::{Microsecond, RxTransfer};
use crate::wire::TransferKind;

use frame::RxFrame;

/// What became of an accepted datagram. Errors are reported separately.
#[derive(Debug)]
pub enum RxOutcome {
    /// A transfer was completed. Its payload buffer now belongs to the caller.
    Transfer(RxTransfer),
    /// The frame was consumed by a session but completed nothing: the middle
    /// of a multi-frame transfer, a redundant duplicate, or a frame that
    /// failed the transfer CRC.
    Pending,
    /// Nobody is subscribed to the frame's port.
    NoMatch,
    /// Not a valid Cyphal/UDP frame for this node.
    Rejected(RejectReason),
}

impl RxOutcome {
    pub fn into_transfer(self) -> Option<RxTransfer> {
        match self {
            RxOutcome::Transfer(transfer) => Some(transfer),
            _ => None,
        }
    }
}

impl<A: Allocator> Instance<A> {
    /// Start receiving transfers of `kind` on `port_id`.
    ///
    /// An existing subscription on the same port is torn down first, along
    /// with every session buffer it owns. Returns true if the subscription is
    /// new, false if it replaced an existing one.
    pub fn rx_subscribe(
        &mut self,
        kind: TransferKind,
        port_id: u16,
        extent: usize,
        transfer_id_timeout_usec: Microsecond,
    ) -> Result<bool> {
        check_port_id(kind, port_id)?;
        let replaced = self.rx_unsubscribe(kind, port_id)?;
        self.subscriptions[kind.index()].insert(
            port_id,
            RxSubscription::new(port_id, extent, transfer_id_timeout_usec),
        );
        tracing::debug!(?kind, port_id, extent, transfer_id_timeout_usec, replaced, "subscribed");
        Ok(!replaced)
    }

    /// Stop receiving on `port_id`, freeing all reassembly state. Returns
    /// whether a subscription existed; a port-ID out of range for `kind` is
    /// an argument error.
    pub fn rx_unsubscribe(&mut self, kind: TransferKind, port_id: u16) -> Result<bool> {
        check_port_id(kind, port_id)?;
        match self.subscriptions[kind.index()].remove(&port_id) {
            Some(subscription) => {
                subscription.release(&mut self.allocator);
                tracing::debug!(?kind, port_id, "unsubscribed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Feed one received datagram (header included) into the pipeline.
    ///
    /// `redundant_transport_index` identifies the network interface the
    /// datagram arrived on; with a single interface, pass zero.
    ///
    /// Fails with `OutOfMemory` if a payload buffer could not be allocated and
    /// with `OutOfOrder` if a multi-frame transfer skipped a frame; in both
    /// cases the affected transfer is discarded.
    pub fn rx_accept(
        &mut self,
        timestamp_usec: Microsecond,
        datagram: &[u8],
        redundant_transport_index: u8,
    ) -> Result<RxOutcome> {
        let frame = match RxFrame::parse(timestamp_usec, datagram, self.verify_header_crc) {
            Ok(frame) => frame,
            Err(reason) => {
                tracing::trace!(
                    %reason,
                    len = datagram.len(),
                    head = %hex::encode(&datagram[..datagram.len().min(8)]),
                    "frame rejected"
                );
                return Ok(RxOutcome::Rejected(reason));
            }
        };

        if let Some(destination) = frame.destination_node_id {
            if self.node_id() != Some(destination) {
                tracing::trace!(destination, local = ?self.node_id(), "mis-addressed frame");
                return Ok(RxOutcome::Rejected(RejectReason::Misaddressed(destination)));
            }
        }

        let kind = frame.metadata.transfer_kind;
        let port_id = frame.metadata.port_id;
        let Some(subscription) = self.subscriptions[kind.index()].get_mut(&port_id) else {
            tracing::trace!(?kind, port_id, "no subscription");
            return Ok(RxOutcome::NoMatch);
        };

        let accepted =
            subscription.accept(&mut self.allocator, &frame, redundant_transport_index)?;
        let outcome = match accepted {
            Some(transfer) => {
                tracing::trace!(
                    ?kind,
                    port_id = transfer.metadata.port_id,
                    source = ?transfer.metadata.remote_node_id,
                    transfer_id = transfer.metadata.transfer_id,
                    size = transfer.payload_size(),
                    "transfer received"
                );
                RxOutcome::Transfer(transfer)
            }
            None => RxOutcome::Pending,
        };
        Ok(outcome)
    }
}

fn check_port_id(kind: TransferKind, port_id: u16) -> Result<()> {
    if port_id <= kind.port_id_max() {
        return Ok(());
    }
    let err = match kind {
        TransferKind::Message => ArgumentError::SubjectIdOutOfRange(port_id),
        TransferKind::Request | TransferKind::Response => {
            ArgumentError::ServiceIdOutOfRange(port_id)
        }
    };
    Err(err.into())
}
