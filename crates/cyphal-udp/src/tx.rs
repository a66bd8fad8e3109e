//! Transmission queue.
//!
//! `push` turns a transfer into one frame, or a chain of frames when the
//! payload plus its CRC does not fit into one MTU, and files every frame
//! into a priority-ordered queue. The caller drains the queue with `peek` and
//! `pop` and hands the frames to its sockets.
//!
//! Frames are ordered by priority, then transfer-ID, with insertion order
//! breaking ties. Within one transfer the frames always leave in index order.

use std::collections::BTreeMap;

use bytes::BytesMut;
use zerocopy::AsBytes;

use crate::config::TransportConfig;
use crate::crc::{transfer_crc_trailer, CRC_SIZE};
use crate::error::{ArgumentError, Error, Result};
use crate::instance::Instance;
use crate::memory::Allocator;
use crate::specifier::{make_session_specifier, SessionSpecifier};
use crate::transfer::{node_id_to_wire, transfer_id_mask, Microsecond, TransferMetadata};
use crate::wire::{encode_data_specifier, FrameHeader, Priority, HEADER_SIZE, MTU_MAX};

/// Position of a frame in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxItemKey {
    priority: Priority,
    transfer_id: u64,
    sequence: u64,
}

impl TxItemKey {
    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn transfer_id(&self) -> u64 {
        self.transfer_id
    }
}

/// One queued frame.
#[derive(Debug)]
pub struct TxQueueItem {
    key: TxItemKey,
    next_in_transfer: Option<TxItemKey>,

    /// Frames still queued past this time should be dropped by the caller.
    pub deadline_usec: Microsecond,

    pub specifier: SessionSpecifier,

    /// Header, payload slice and CRC bytes, ready for the socket. Allocated
    /// from the instance allocator.
    pub frame: BytesMut,
}

impl TxQueueItem {
    pub fn key(&self) -> TxItemKey {
        self.key
    }

    /// The following frame of the same transfer, if this is not the last.
    pub fn next_in_transfer(&self) -> Option<TxItemKey> {
        self.next_in_transfer
    }

    pub fn header(&self) -> Option<FrameHeader> {
        FrameHeader::parse(&self.frame).map(|(header, _)| header)
    }

    /// Frame bytes after the header.
    pub fn data(&self) -> &[u8] {
        self.frame.get(HEADER_SIZE..).unwrap_or_default()
    }

    pub fn into_frame(self) -> BytesMut {
        self.frame
    }
}

#[derive(Debug)]
pub struct TxQueue {
    capacity: usize,
    mtu_bytes: usize,
    items: BTreeMap<TxItemKey, TxQueueItem>,
    sequence: u64,
}

impl TxQueue {
    /// `capacity` bounds the number of queued frames. `mtu_bytes` includes
    /// the header and is clamped to `MTU_MAX` at push time.
    pub fn new(capacity: usize, mtu_bytes: usize) -> Self {
        Self {
            capacity,
            mtu_bytes,
            items: BTreeMap::new(),
            sequence: 0,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.tx.queue_capacity, config.tx.mtu_bytes)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn mtu_bytes(&self) -> usize {
        self.mtu_bytes
    }

    /// Takes effect from the next push; queued frames are unaffected.
    pub fn set_mtu_bytes(&mut self, mtu_bytes: usize) {
        self.mtu_bytes = mtu_bytes;
    }

    /// Enqueue a transfer. Returns the number of frames it occupies.
    ///
    /// Either every frame of the transfer is queued or none is: on
    /// `OutOfMemory` the queue and the allocator are left as they were.
    pub fn push<A: Allocator>(
        &mut self,
        instance: &mut Instance<A>,
        deadline_usec: Microsecond,
        metadata: &TransferMetadata,
        payload: &[u8],
    ) -> Result<usize> {
        let mtu = self.mtu_bytes.min(MTU_MAX);
        if mtu <= HEADER_SIZE {
            return Err(ArgumentError::MtuTooSmall(self.mtu_bytes).into());
        }
        let specifier =
            make_session_specifier(metadata, instance.node_id(), instance.local_ip_addr())?;

        let frame_data_max = mtu - HEADER_SIZE;
        let stream_len = payload.len() + CRC_SIZE;
        let frame_count = stream_len.div_ceil(frame_data_max);
        if frame_count > 1 && instance.node_id().is_none() {
            return Err(ArgumentError::AnonymousMultiFrame.into());
        }
        if self.items.len() + frame_count > self.capacity {
            tracing::warn!(
                port_id = metadata.port_id,
                frames = frame_count,
                queued = self.items.len(),
                capacity = self.capacity,
                "tx queue full"
            );
            return Err(Error::OutOfMemory);
        }

        let transfer_id = transfer_id_mask(metadata.transfer_id);
        let source = node_id_to_wire(instance.node_id());
        let destination = node_id_to_wire(metadata.remote_node_id);
        let data_specifier = encode_data_specifier(metadata.transfer_kind, metadata.port_id);
        let trailer = transfer_crc_trailer(payload);

        let mut frames: Vec<BytesMut> = Vec::with_capacity(frame_count);
        let mut offset = 0;
        for index in 1..=frame_count {
            let chunk = (stream_len - offset).min(frame_data_max);
            let Some(mut frame) = instance.allocator.allocate(HEADER_SIZE + chunk) else {
                for frame in frames {
                    instance.allocator.free(frame);
                }
                tracing::warn!(
                    port_id = metadata.port_id,
                    transfer_id,
                    frame_index = index,
                    frames = frame_count,
                    "tx frame allocation failed"
                );
                return Err(Error::OutOfMemory);
            };
            let header = FrameHeader::new(
                metadata.priority,
                source,
                destination,
                data_specifier,
                transfer_id,
                index as u32,
                index == frame_count,
            );
            let (head, data) = frame.split_at_mut(HEADER_SIZE);
            head.copy_from_slice(header.as_bytes());
            copy_stream(data, payload, &trailer, offset);
            offset += chunk;
            frames.push(frame);
        }

        let mut key = self.next_key(metadata.priority, transfer_id);
        let mut frames = frames.into_iter().peekable();
        while let Some(frame) = frames.next() {
            let next_in_transfer =
                frames.peek().map(|_| self.next_key(metadata.priority, transfer_id));
            self.items.insert(
                key,
                TxQueueItem {
                    key,
                    next_in_transfer,
                    deadline_usec,
                    specifier,
                    frame,
                },
            );
            if let Some(next) = next_in_transfer {
                key = next;
            }
        }

        tracing::debug!(
            kind = ?metadata.transfer_kind,
            port_id = metadata.port_id,
            transfer_id,
            size = payload.len(),
            frames = frame_count,
            "transfer enqueued"
        );
        Ok(frame_count)
    }

    /// The next frame to transmit, left in the queue.
    pub fn peek(&self) -> Option<&TxQueueItem> {
        self.items.values().next()
    }

    /// Remove a frame, typically the one just peeked. The frame buffer passes
    /// to the caller, who returns it with `Instance::release`.
    pub fn pop(&mut self, key: TxItemKey) -> Option<TxQueueItem> {
        self.items.remove(&key)
    }

    /// Remove a frame together with every later frame of its transfer, e.g.
    /// when the transfer missed its deadline.
    pub fn pop_transfer(&mut self, key: TxItemKey) -> Vec<TxQueueItem> {
        let mut removed = Vec::new();
        let mut next = Some(key);
        while let Some(key) = next {
            let Some(item) = self.items.remove(&key) else {
                break;
            };
            next = item.next_in_transfer;
            removed.push(item);
        }
        removed
    }

    /// Queued frames in transmission order.
    pub fn iter(&self) -> impl Iterator<Item = &TxQueueItem> {
        self.items.values()
    }

    fn next_key(&mut self, priority: Priority, transfer_id: u64) -> TxItemKey {
        let key = TxItemKey {
            priority,
            transfer_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);
        key
    }
}

/// Fill `dst` with bytes `offset..` of the stream `payload ++ trailer`.
fn copy_stream(dst: &mut [u8], payload: &[u8], trailer: &[u8; CRC_SIZE], offset: usize) {
    let from_payload = payload.len().saturating_sub(offset).min(dst.len());
    let (head, tail) = dst.split_at_mut(from_payload);
    if from_payload > 0 {
        head.copy_from_slice(&payload[offset..offset + from_payload]);
    }
    let crc_offset = (offset + from_payload).saturating_sub(payload.len());
    tail.copy_from_slice(&trailer[crc_offset..crc_offset + tail.len()]);
}
