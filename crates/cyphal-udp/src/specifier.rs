//! Session specifier: the IP/UDP addressing of an outgoing transfer.
//!
//! Destination groups are IPv4 multicast addresses in 239.0.0.0/8:
//!
//! ```text
//!   1110 1111 . 0 sssss m . r ppppppp . pppppppp
//!   \_______/     \___/ |   |  \______________/
//!    prefix      subnet |   |      port-ID
//!                       |   reserved (set for service requests)
//!                       service-not-message
//! ```
//!
//! The source route specifier is the local address with its low 16 bits
//! replaced by the local node-ID.

use std::net::Ipv4Addr;

use crate::error::ArgumentError;
use crate::transfer::{node_id_to_wire, NodeId, TransferMetadata};
use crate::wire::{
    TransferKind, NODE_ID_MAX, SERVICE_ID_MAX, SUBJECT_ID_MAX, UDP_PORT,
};

const MULTICAST_PREFIX: u32 = 0xEF00_0000;
const SUBNET_MASK: u32 = 0x003E_0000;
const TRANSMIT_SUBNET: u32 = 0;
const SERVICE_NOT_MESSAGE: u32 = 1 << 16;
const RESERVED_BIT: u32 = 1 << 15;
const NODE_ID_MASK: u32 = 0xFFFF;

/// Addressing of one outgoing transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSpecifier {
    pub source_route_specifier: Ipv4Addr,
    pub destination_route_specifier: Ipv4Addr,
    /// UDP destination port.
    pub data_specifier: u16,
}

/// Validate `metadata` and derive its addressing. Pure; no side effects.
pub fn make_session_specifier(
    metadata: &TransferMetadata,
    local_node_id: NodeId,
    local_addr: Ipv4Addr,
) -> Result<SessionSpecifier, ArgumentError> {
    if let Some(id) = local_node_id {
        if id > NODE_ID_MAX {
            return Err(ArgumentError::NodeIdOutOfRange(id));
        }
    }

    let destination = match metadata.transfer_kind {
        TransferKind::Message => {
            if metadata.remote_node_id.is_some() {
                return Err(ArgumentError::RemoteNodeOnMessage);
            }
            if metadata.port_id > SUBJECT_ID_MAX {
                return Err(ArgumentError::SubjectIdOutOfRange(metadata.port_id));
            }
            message_group(metadata.port_id)
        }
        kind @ (TransferKind::Request | TransferKind::Response) => {
            if metadata.port_id > SERVICE_ID_MAX {
                return Err(ArgumentError::ServiceIdOutOfRange(metadata.port_id));
            }
            match metadata.remote_node_id {
                None => return Err(ArgumentError::MissingRemoteNode),
                Some(id) if id > NODE_ID_MAX => return Err(ArgumentError::NodeIdOutOfRange(id)),
                Some(_) => {}
            }
            if local_node_id.is_none() {
                return Err(ArgumentError::AnonymousServiceTransfer);
            }
            service_group(metadata.port_id, kind == TransferKind::Request)
        }
    };

    let source =
        (u32::from(local_addr) & !NODE_ID_MASK) | u32::from(node_id_to_wire(local_node_id));

    Ok(SessionSpecifier {
        source_route_specifier: Ipv4Addr::from(source),
        destination_route_specifier: Ipv4Addr::from(destination),
        data_specifier: UDP_PORT,
    })
}

fn message_group(subject_id: u16) -> u32 {
    let subject = u32::from(subject_id) & u32::from(SUBJECT_ID_MAX);
    ((TRANSMIT_SUBNET & SUBNET_MASK) | MULTICAST_PREFIX | subject)
        & !SERVICE_NOT_MESSAGE
        & !RESERVED_BIT
}

fn service_group(service_id: u16, request: bool) -> u32 {
    let reserved = if request { RESERVED_BIT } else { 0 };
    (TRANSMIT_SUBNET & SUBNET_MASK)
        | MULTICAST_PREFIX
        | SERVICE_NOT_MESSAGE
        | reserved
        | (u32::from(service_id) & u32::from(SERVICE_ID_MAX))
}
