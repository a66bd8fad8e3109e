//! Subscriptions and their session tables.

use std::collections::HashMap;

use crate::crc::{TransferCrc, CRC_SIZE};
use crate::error::{Error, Result};
use crate::memory::Allocator;
use crate::rx::frame::RxFrame;
use crate::rx::session::RxSession;
use crate::transfer::{Microsecond, RxTransfer};

/// Interest in one port of one transfer kind.
///
/// Sessions are created on demand, one per remote node that has started a
/// transfer on this port, and live until the subscription is dropped.
#[derive(Debug)]
pub struct RxSubscription {
    port_id: u16,
    extent: usize,
    transfer_id_timeout_usec: Microsecond,
    sessions: HashMap<u16, RxSession>,
}

impl RxSubscription {
    pub(crate) fn new(port_id: u16, extent: usize, transfer_id_timeout_usec: Microsecond) -> Self {
        Self {
            port_id,
            extent,
            transfer_id_timeout_usec,
            sessions: HashMap::new(),
        }
    }

    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    /// Maximum payload bytes retained per transfer; the rest is truncated.
    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn transfer_id_timeout_usec(&self) -> Microsecond {
        self.transfer_id_timeout_usec
    }

    /// Reassembly state for transfers from `node_id`, if any have been seen.
    pub fn session(&self, node_id: u16) -> Option<&RxSession> {
        self.sessions.get(&node_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn accept<A: Allocator>(
        &mut self,
        allocator: &mut A,
        frame: &RxFrame<'_>,
        redundant_transport_index: u8,
    ) -> Result<Option<RxTransfer>> {
        let Some(source) = frame.metadata.remote_node_id else {
            return self.accept_anonymous(allocator, frame);
        };

        if !self.sessions.contains_key(&source) {
            // Without the first frame the transfer cannot be received anyway.
            if !frame.start_of_transfer {
                return Ok(None);
            }
            tracing::debug!(
                port_id = self.port_id,
                source,
                transfer_id = frame.metadata.transfer_id,
                transport = redundant_transport_index,
                "rx session created"
            );
            let session = RxSession::new(
                frame.timestamp_usec,
                frame.metadata.transfer_id,
                redundant_transport_index,
            );
            self.sessions.insert(source, session);
        }

        match self.sessions.get_mut(&source) {
            Some(session) => session.update(
                allocator,
                frame,
                redundant_transport_index,
                self.transfer_id_timeout_usec,
                self.extent,
            ),
            None => Ok(None),
        }
    }

    /// Anonymous transfers carry no state: the frame is checked against its
    /// CRC trailer and the data copied out.
    fn accept_anonymous<A: Allocator>(
        &self,
        allocator: &mut A,
        frame: &RxFrame<'_>,
    ) -> Result<Option<RxTransfer>> {
        let mut crc = TransferCrc::new();
        crc.update(frame.payload);
        if frame.payload.len() < CRC_SIZE || !crc.residue_matches() {
            tracing::trace!(
                port_id = self.port_id,
                len = frame.payload.len(),
                "anonymous transfer CRC mismatch"
            );
            return Ok(None);
        }
        let size = self.extent.min(frame.payload.len() - CRC_SIZE);
        let mut payload = allocator.allocate(size).ok_or(Error::OutOfMemory)?;
        payload.truncate(size);
        payload[..size].copy_from_slice(&frame.payload[..size]);
        Ok(Some(RxTransfer {
            metadata: frame.metadata,
            timestamp_usec: frame.timestamp_usec,
            payload,
        }))
    }

    /// Tear down every session and return their buffers.
    pub(crate) fn release<A: Allocator>(self, allocator: &mut A) {
        for (_, session) in self.sessions {
            session.release(allocator);
        }
    }
}
