use crate::*;
use cyphal_udp::{ArgumentError, Error, Priority, TransferKind, TransferMetadata};

#[test]
fn test_subscribe_and_unsubscribe_lifecycle() {
    let mut rx = node(Some(2), 1408).unwrap();

    assert!(rx.ins.rx_subscribe(TransferKind::Message, 10, 8, 1_000).unwrap());
    assert!(rx.ins.rx_subscribe(TransferKind::Message, 5, 8, 1_000).unwrap());
    assert!(rx.ins.rx_subscribe(TransferKind::Response, 10, 8, 1_000).unwrap());
    assert!(!rx.ins.rx_subscribe(TransferKind::Message, 10, 32, 2_000).unwrap());

    let ports: Vec<u16> =
        rx.ins.subscriptions(TransferKind::Message).map(|s| s.port_id()).collect();
    assert_eq!(ports, vec![5, 10]);
    let sub = rx.ins.subscription(TransferKind::Message, 10).unwrap();
    assert_eq!(sub.extent(), 32);
    assert_eq!(sub.transfer_id_timeout_usec(), 2_000);

    assert!(rx.ins.rx_unsubscribe(TransferKind::Message, 10).unwrap());
    assert!(!rx.ins.rx_unsubscribe(TransferKind::Message, 10).unwrap());
    assert!(rx.ins.subscription(TransferKind::Response, 10).is_some());
    assert!(!rx.ins.rx_unsubscribe(TransferKind::Request, 10).unwrap());
}

#[test]
fn test_subscription_rejects_invalid_port() {
    let mut rx = node(Some(2), 1408).unwrap();
    assert_eq!(
        rx.ins.rx_subscribe(TransferKind::Request, 0x4000, 8, 1_000),
        Err(Error::InvalidArgument(ArgumentError::ServiceIdOutOfRange(0x4000)))
    );
    assert_eq!(
        rx.ins.rx_unsubscribe(TransferKind::Message, 0x8000),
        Err(Error::InvalidArgument(ArgumentError::SubjectIdOutOfRange(0x8000)))
    );
    assert_eq!(rx.ins.subscriptions(TransferKind::Request).count(), 0);
}

#[test]
fn test_resubscribe_with_smaller_extent_mid_transfer() {
    let mut tx = node(Some(7), 24 + 8).unwrap();
    let mut rx = node(Some(8), 1408).unwrap();
    rx.ins.rx_subscribe(TransferKind::Message, 1, 64, 1_000_000).unwrap();

    let meta = TransferMetadata::message(Priority::Nominal, 1, 0);
    tx.tx.push(&mut tx.ins, 0, &meta, &[3u8; 40]).unwrap();
    let frames = drain(&mut tx);

    deliver(&mut rx, 0, &frames[..2], 0).unwrap();
    assert_eq!(rx.ins.allocator().fragments(), 1);

    // The in-flight buffer is sized for the old extent; it must go.
    rx.ins.rx_subscribe(TransferKind::Message, 1, 4, 1_000_000).unwrap();
    assert_no_leaks(&rx, "rx after resubscribe");

    // The rest of the interrupted transfer has no session to land in.
    assert!(deliver(&mut rx, 0, &frames[2..], 0).unwrap().is_empty());

    tx.tx.push(&mut tx.ins, 0, &TransferMetadata { transfer_id: 1, ..meta }, &[3u8; 40]).unwrap();
    let frames = drain(&mut tx);
    let transfers = deliver(&mut rx, 0, &frames, 0).unwrap();
    assert_eq!(&transfers[0].payload[..], &[3u8; 4]);
    release_all(&mut rx, transfers);
}

#[test]
fn test_sessions_are_per_source_node() {
    let mut a = node(Some(1), 24 + 8).unwrap();
    let mut b = node(Some(2), 24 + 8).unwrap();
    let mut rx = node(Some(3), 1408).unwrap();
    rx.ins.rx_subscribe(TransferKind::Message, 50, 64, 1_000_000).unwrap();

    let meta = TransferMetadata::message(Priority::Nominal, 50, 0);
    a.tx.push(&mut a.ins, 0, &meta, &[0xA; 20]).unwrap();
    b.tx.push(&mut b.ins, 0, &meta, &[0xB; 20]).unwrap();
    let fa = drain(&mut a);
    let fb = drain(&mut b);

    // Interleave two senders using the same transfer-ID.
    let mut interleaved = Vec::new();
    for (x, y) in fa.iter().zip(fb.iter()) {
        interleaved.push(x.clone());
        interleaved.push(y.clone());
    }
    let transfers = deliver(&mut rx, 0, &interleaved, 0).unwrap();
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0].metadata.remote_node_id, Some(1));
    assert_eq!(&transfers[0].payload[..], &[0xA; 20]);
    assert_eq!(transfers[1].metadata.remote_node_id, Some(2));
    assert_eq!(&transfers[1].payload[..], &[0xB; 20]);

    let sub = rx.ins.subscription(TransferKind::Message, 50).unwrap();
    assert_eq!(sub.session_count(), 2);
    release_all(&mut rx, transfers);
    rx.ins.rx_unsubscribe(TransferKind::Message, 50).unwrap();
    assert_no_leaks(&rx, "rx");
}

#[test]
fn test_unsubscribed_port_reports_no_match() {
    let mut tx = node(Some(1), 1408).unwrap();
    let mut rx = node(Some(2), 1408).unwrap();
    rx.ins.rx_subscribe(TransferKind::Message, 1, 8, 1_000).unwrap();

    let meta = TransferMetadata::message(Priority::Nominal, 2, 0);
    tx.tx.push(&mut tx.ins, 0, &meta, &[1]).unwrap();
    let frames = drain(&mut tx);
    assert!(matches!(rx.ins.rx_accept(0, &frames[0], 0).unwrap(), RxOutcome::NoMatch));
    assert_no_leaks(&rx, "rx");
}
