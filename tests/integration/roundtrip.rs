use crate::*;
use cyphal_udp::{Priority, TransferKind, TransferMetadata};

#[test]
fn test_single_frame_message_scenario() {
    let mut tx = node(Some(0x27), 1408).unwrap();
    let mut rx = node(Some(0x42), 1408).unwrap();

    assert!(rx.ins.rx_subscribe(TransferKind::Message, 2222, 16, 1_000_000).unwrap());

    let meta = TransferMetadata::message(Priority::Slow, 2222, 11);
    assert_eq!(tx.tx.push(&mut tx.ins, 0, &meta, &[1, 1, 1]).unwrap(), 1);
    let frames = drain(&mut tx);
    assert_eq!(frames.len(), 1);

    let transfers = deliver(&mut rx, 100, &frames, 0).unwrap();
    assert_eq!(transfers.len(), 1);
    let transfer = &transfers[0];
    assert_eq!(&transfer.payload[..], &[1, 1, 1]);
    assert_eq!(transfer.payload_size(), 3);
    assert_eq!(transfer.metadata.transfer_id, 11);
    assert_eq!(transfer.metadata.priority, Priority::Slow);
    assert_eq!(transfer.metadata.port_id, 2222);
    assert_eq!(transfer.metadata.remote_node_id, Some(0x27));
    assert_eq!(transfer.timestamp_usec, 100);

    release_all(&mut rx, transfers);
    rx.ins.rx_unsubscribe(TransferKind::Message, 2222).unwrap();
    assert_no_leaks(&tx, "tx");
    assert_no_leaks(&rx, "rx");
}

#[test]
fn test_multi_frame_round_trip_over_every_mtu() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    for mtu in [25usize, 28, 29, 100, 577, 1408] {
        let mut tx = node(Some(1), mtu).unwrap();
        let mut rx = node(Some(2), 1408).unwrap();
        rx.ins.rx_subscribe(TransferKind::Message, 100, 4096, 1_000_000).unwrap();

        let meta = TransferMetadata::message(Priority::Nominal, 100, 7);
        let count = tx.tx.push(&mut tx.ins, 0, &meta, &payload).unwrap();
        let frames = drain(&mut tx);
        assert_eq!(frames.len(), count, "mtu {mtu}");
        assert!(frames.iter().all(|f| f.len() <= mtu), "mtu {mtu}: oversized frame");

        let transfers = deliver(&mut rx, 0, &frames, 0).unwrap();
        assert_eq!(transfers.len(), 1, "mtu {mtu}");
        assert_eq!(&transfers[0].payload[..], &payload[..], "mtu {mtu}");

        release_all(&mut rx, transfers);
        rx.ins.rx_unsubscribe(TransferKind::Message, 100).unwrap();
        assert_no_leaks(&rx, "rx");
        assert_no_leaks(&tx, "tx");
    }
}

#[test]
fn test_round_trip_truncates_to_extent() {
    let mut tx = node(Some(1), 64).unwrap();
    let mut rx = node(Some(2), 1408).unwrap();
    rx.ins.rx_subscribe(TransferKind::Message, 5, 10, 1_000_000).unwrap();

    let payload: Vec<u8> = (0..200).collect();
    let meta = TransferMetadata::message(Priority::High, 5, 0);
    tx.tx.push(&mut tx.ins, 0, &meta, &payload).unwrap();
    let frames = drain(&mut tx);
    assert!(frames.len() > 1);

    let transfers = deliver(&mut rx, 0, &frames, 0).unwrap();
    assert_eq!(&transfers[0].payload[..], &payload[..10]);
    release_all(&mut rx, transfers);
}

#[test]
fn test_request_response_exchange() {
    let mut client = node(Some(10), 1408).unwrap();
    let mut server = node(Some(20), 1408).unwrap();
    server.ins.rx_subscribe(TransferKind::Request, 0x133, 64, 1_000_000).unwrap();
    client.ins.rx_subscribe(TransferKind::Response, 0x133, 64, 1_000_000).unwrap();

    let request = TransferMetadata::request(Priority::Fast, 0x133, 20, 3);
    client.tx.push(&mut client.ins, 0, &request, b"ping").unwrap();
    let item = client.tx.peek().unwrap();
    assert_eq!(u32::from(item.specifier.destination_route_specifier), 0xEF01_8133);
    let frames = drain(&mut client);

    let received = deliver(&mut server, 10, &frames, 0).unwrap();
    assert_eq!(received.len(), 1);
    let req = &received[0].metadata;
    assert_eq!(req.transfer_kind, TransferKind::Request);
    assert_eq!(req.remote_node_id, Some(10));

    // Responses reuse the request's transfer-ID and go back to its source.
    let response = TransferMetadata::response(req.priority, req.port_id, 10, req.transfer_id);
    release_all(&mut server, received);
    server.tx.push(&mut server.ins, 20, &response, b"pong").unwrap();
    assert_eq!(
        u32::from(server.tx.peek().unwrap().specifier.destination_route_specifier),
        0xEF01_0133
    );
    let frames = drain(&mut server);

    let replies = deliver(&mut client, 30, &frames, 0).unwrap();
    assert_eq!(&replies[0].payload[..], b"pong");
    assert_eq!(replies[0].metadata.transfer_id, 3);
    assert_eq!(replies[0].metadata.remote_node_id, Some(20));
    release_all(&mut client, replies);

    // A third node does not accept a response addressed to node 10.
    let mut bystander = node(Some(11), 1408).unwrap();
    bystander.ins.rx_subscribe(TransferKind::Response, 0x133, 64, 1_000_000).unwrap();
    server.tx.push(&mut server.ins, 40, &response, b"pong").unwrap();
    let frames = drain(&mut server);
    let outcome = bystander.ins.rx_accept(50, &frames[0], 0).unwrap();
    assert!(matches!(outcome, RxOutcome::Rejected(cyphal_udp::RejectReason::Misaddressed(10))));
}

#[test]
fn test_anonymous_message_round_trip() {
    let mut tx = node(None, 1408).unwrap();
    let mut rx = node(Some(2), 1408).unwrap();
    rx.ins.rx_subscribe(TransferKind::Message, 7, 2, 1_000_000).unwrap();

    let meta = TransferMetadata::message(Priority::Optional, 7, 0);
    tx.tx.push(&mut tx.ins, 0, &meta, &[9, 8, 7]).unwrap();
    let frames = drain(&mut tx);

    // Stateless: the same frame is delivered every time, truncated to extent.
    for _ in 0..3 {
        let transfers = deliver(&mut rx, 0, &frames, 0).unwrap();
        assert_eq!(transfers[0].metadata.remote_node_id, None);
        assert_eq!(&transfers[0].payload[..], &[9, 8]);
        release_all(&mut rx, transfers);
    }
    assert_eq!(rx.ins.subscription(TransferKind::Message, 7).unwrap().session_count(), 0);
    assert_no_leaks(&rx, "rx");
}
