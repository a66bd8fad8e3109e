//! Per-source reassembly state.
//!
//! One session exists per (subscription, remote node) pair once that node has
//! sent the first frame of a transfer. A session accumulates exactly one
//! transfer at a time and is locked to the redundant interface it first heard
//! that transfer on; the same transfer arriving over another interface is
//! ignored unless the current interface goes quiet for longer than the
//! transfer-ID timeout.

use bytes::BytesMut;

use crate::crc::{TransferCrc, CRC_SIZE};
use crate::error::{Error, Result};
use crate::memory::Allocator;
use crate::rx::frame::RxFrame;
use crate::transfer::{transfer_id_distance, transfer_id_next, Microsecond, RxTransfer};

#[derive(Debug)]
pub struct RxSession {
    transfer_timestamp_usec: Microsecond,
    /// Every payload byte seen so far, the CRC trailer included.
    total_payload_size: usize,
    /// Bytes retained in `payload`, at most the subscription extent.
    payload_size: usize,
    /// Allocated on the first write, at extent size.
    payload: Option<BytesMut>,
    crc: TransferCrc,
    transfer_id: u64,
    redundant_transport_index: u8,
    last_frame_index: u32,
}

impl RxSession {
    pub(crate) fn new(
        timestamp_usec: Microsecond,
        transfer_id: u64,
        redundant_transport_index: u8,
    ) -> Self {
        Self {
            transfer_timestamp_usec: timestamp_usec,
            total_payload_size: 0,
            payload_size: 0,
            payload: None,
            crc: TransferCrc::new(),
            transfer_id,
            redundant_transport_index,
            last_frame_index: 0,
        }
    }

    /// Timestamp of the first frame of the current (or last) transfer.
    pub fn transfer_timestamp_usec(&self) -> Microsecond {
        self.transfer_timestamp_usec
    }

    pub fn total_payload_size(&self) -> usize {
        self.total_payload_size
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// The transfer-ID this session expects next.
    pub fn transfer_id(&self) -> u64 {
        self.transfer_id
    }

    pub fn redundant_transport_index(&self) -> u8 {
        self.redundant_transport_index
    }

    /// Index of the last accepted non-final frame; zero between transfers.
    pub fn last_frame_index(&self) -> u32 {
        self.last_frame_index
    }

    pub(crate) fn update<A: Allocator>(
        &mut self,
        allocator: &mut A,
        frame: &RxFrame<'_>,
        redundant_transport_index: u8,
        transfer_id_timeout_usec: Microsecond,
        extent: usize,
    ) -> Result<Option<RxTransfer>> {
        let timed_out = frame.timestamp_usec > self.transfer_timestamp_usec
            && frame.timestamp_usec - self.transfer_timestamp_usec > transfer_id_timeout_usec;
        let not_previous = transfer_id_distance(self.transfer_id, frame.metadata.transfer_id) > 1;
        let same_transport = self.redundant_transport_index == redundant_transport_index;
        let need_restart = timed_out || (same_transport && frame.start_of_transfer && not_previous);

        if need_restart {
            if timed_out {
                tracing::debug!(
                    source = ?frame.metadata.remote_node_id,
                    port_id = frame.metadata.port_id,
                    from = self.redundant_transport_index,
                    to = redundant_transport_index,
                    "transfer-ID timeout, session restarted"
                );
            }
            self.total_payload_size = 0;
            self.payload_size = 0;
            self.crc = TransferCrc::new();
            self.transfer_id = frame.metadata.transfer_id;
            self.redundant_transport_index = redundant_transport_index;
            self.last_frame_index = 0;

            if !frame.start_of_transfer {
                // Missed the start of this transfer; nothing to salvage.
                self.restart(allocator);
                return Ok(None);
            }
        }

        if self.redundant_transport_index != redundant_transport_index
            || self.transfer_id != frame.metadata.transfer_id
        {
            tracing::trace!(
                source = ?frame.metadata.remote_node_id,
                transfer_id = frame.metadata.transfer_id,
                transport = redundant_transport_index,
                "duplicate or foreign frame ignored"
            );
            return Ok(None);
        }

        if !frame.single_frame() {
            let expected = if frame.start_of_transfer { 1 } else { self.last_frame_index + 1 };
            if frame.frame_index != expected {
                tracing::debug!(
                    source = ?frame.metadata.remote_node_id,
                    port_id = frame.metadata.port_id,
                    frame_index = frame.frame_index,
                    expected,
                    "out-of-order frame, session restarted"
                );
                self.last_frame_index = 0;
                self.restart(allocator);
                return Err(Error::OutOfOrder {
                    frame_index: frame.frame_index,
                    expected,
                });
            }
            self.last_frame_index = if frame.end_of_transfer { 0 } else { frame.frame_index };
        }

        self.accept_frame(allocator, frame, extent)
    }

    fn accept_frame<A: Allocator>(
        &mut self,
        allocator: &mut A,
        frame: &RxFrame<'_>,
        extent: usize,
    ) -> Result<Option<RxTransfer>> {
        if frame.start_of_transfer {
            self.transfer_timestamp_usec = frame.timestamp_usec;
        }
        self.crc.update(frame.payload);

        if let Err(err) = self.write_payload(allocator, extent, frame.payload) {
            tracing::debug!(
                source = ?frame.metadata.remote_node_id,
                port_id = frame.metadata.port_id,
                extent,
                "payload allocation failed, session restarted"
            );
            self.restart(allocator);
            return Err(err);
        }
        if !frame.end_of_transfer {
            return Ok(None);
        }

        let transfer = if self.crc.residue_matches() {
            let mut payload = self.payload.take().unwrap_or_default();
            // Strip whatever part of the CRC trailer survived truncation.
            let truncated = self.total_payload_size - self.payload_size;
            let mut size = self.payload_size;
            if truncated < CRC_SIZE {
                size = size.saturating_sub(CRC_SIZE - truncated);
            }
            payload.truncate(size);
            Some(RxTransfer {
                metadata: frame.metadata,
                timestamp_usec: self.transfer_timestamp_usec,
                payload,
            })
        } else {
            tracing::trace!(
                source = ?frame.metadata.remote_node_id,
                transfer_id = frame.metadata.transfer_id,
                total = self.total_payload_size,
                "transfer CRC mismatch, dropped"
            );
            None
        };
        self.restart(allocator);
        Ok(transfer)
    }

    fn write_payload<A: Allocator>(
        &mut self,
        allocator: &mut A,
        extent: usize,
        data: &[u8],
    ) -> Result<()> {
        self.total_payload_size += data.len();

        if self.payload.is_none() && extent > 0 {
            self.payload = Some(allocator.allocate(extent).ok_or(Error::OutOfMemory)?);
        }
        if let Some(buffer) = self.payload.as_mut() {
            let limit = extent.min(buffer.len());
            let count = data.len().min(limit.saturating_sub(self.payload_size));
            buffer[self.payload_size..self.payload_size + count].copy_from_slice(&data[..count]);
            self.payload_size += count;
        }
        Ok(())
    }

    /// Drop the transfer in progress and expect the next transfer-ID.
    fn restart<A: Allocator>(&mut self, allocator: &mut A) {
        if let Some(buffer) = self.payload.take() {
            allocator.free(buffer);
        }
        self.total_payload_size = 0;
        self.payload_size = 0;
        self.crc = TransferCrc::new();
        self.transfer_id = transfer_id_next(self.transfer_id);
    }

    /// Return the payload buffer, if any, to the allocator.
    pub(crate) fn release<A: Allocator>(mut self, allocator: &mut A) {
        if let Some(buffer) = self.payload.take() {
            allocator.free(buffer);
        }
    }
}
