//! The transport instance: local node identity, the memory resource, and the
//! subscription registry. The TX queue is a separate object so that one
//! instance can feed several redundant interfaces, each with its own queue.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use bytes::BytesMut;

use crate::config::TransportConfig;
use crate::error::{ArgumentError, Result};
use crate::memory::{Allocator, HeapAllocator};
use crate::rx::RxSubscription;
use crate::transfer::{Microsecond, NodeId};
use crate::wire::{TransferKind, DEFAULT_TRANSFER_ID_TIMEOUT_USEC, NODE_ID_MAX};

pub struct Instance<A: Allocator = HeapAllocator> {
    node_id: NodeId,
    local_ip_addr: Ipv4Addr,
    pub(crate) allocator: A,
    pub(crate) verify_header_crc: bool,
    default_transfer_id_timeout_usec: Microsecond,
    pub(crate) subscriptions: [BTreeMap<u16, RxSubscription>; TransferKind::COUNT],
}

impl<A: Allocator> Instance<A> {
    /// An anonymous instance with no subscriptions.
    pub fn new(allocator: A) -> Self {
        Self {
            node_id: None,
            local_ip_addr: Ipv4Addr::UNSPECIFIED,
            allocator,
            verify_header_crc: false,
            default_transfer_id_timeout_usec: DEFAULT_TRANSFER_ID_TIMEOUT_USEC,
            subscriptions: Default::default(),
        }
    }

    pub fn from_config(config: &TransportConfig, allocator: A) -> Result<Self> {
        let mut instance = Self::new(allocator);
        instance.set_node_id(config.node.id)?;
        instance.local_ip_addr = config.node.local_ip_addr;
        instance.verify_header_crc = config.rx.verify_header_crc;
        instance.default_transfer_id_timeout_usec = config.rx.transfer_id_timeout_usec;
        Ok(instance)
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// May be changed at any time; typically set once after plug-and-play
    /// node-ID allocation completes.
    pub fn set_node_id(&mut self, node_id: NodeId) -> Result<()> {
        if let Some(id) = node_id {
            if id > NODE_ID_MAX {
                return Err(ArgumentError::NodeIdOutOfRange(id).into());
            }
        }
        tracing::debug!(node_id = ?node_id, "local node-ID set");
        self.node_id = node_id;
        Ok(())
    }

    pub fn local_ip_addr(&self) -> Ipv4Addr {
        self.local_ip_addr
    }

    pub fn set_local_ip_addr(&mut self, addr: Ipv4Addr) {
        self.local_ip_addr = addr;
    }

    pub fn verify_header_crc(&self) -> bool {
        self.verify_header_crc
    }

    /// Drop received frames whose header CRC does not match. Off by default.
    pub fn set_verify_header_crc(&mut self, enabled: bool) {
        self.verify_header_crc = enabled;
    }

    /// The configured transfer-ID timeout, for callers that subscribe without
    /// a port-specific value.
    pub fn default_transfer_id_timeout_usec(&self) -> Microsecond {
        self.default_transfer_id_timeout_usec
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    /// Return a buffer handed out by the engine (a popped TX frame or a
    /// received payload) to the allocator.
    pub fn release(&mut self, buffer: BytesMut) {
        self.allocator.free(buffer);
    }

    pub fn subscription(&self, kind: TransferKind, port_id: u16) -> Option<&RxSubscription> {
        self.subscriptions[kind.index()].get(&port_id)
    }

    /// Active subscriptions of one kind, in port-ID order.
    pub fn subscriptions(&self, kind: TransferKind) -> impl Iterator<Item = &RxSubscription> {
        self.subscriptions[kind.index()].values()
    }
}

impl Default for Instance<HeapAllocator> {
    fn default() -> Self {
        Self::new(HeapAllocator)
    }
}

impl<A: Allocator> std::fmt::Debug for Instance<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("node_id", &self.node_id)
            .field("local_ip_addr", &self.local_ip_addr)
            .field("verify_header_crc", &self.verify_header_crc)
            .field(
                "subscriptions",
                &self.subscriptions.iter().map(BTreeMap::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}
