//! Handshake message fragmentation in both directions.

use std::time::{Duration, Instant};

use dtls_auth::message::*;
use dtls_auth::Config;

use crate::common::*;

/// Client past the cookie exchange, and the server flight answering it.
fn awaiting_server_flight() -> (dtls_auth::Client, TestServer, Vec<Vec<u8>>) {
    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.handle_timeout(Instant::now()).unwrap();
    let hello = collect_packets(&mut client);
    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    let hello = collect_packets(&mut client);
    let flight = server.server_flight(&hello[0]);

    (client, server, flight)
}

/// The Certificate message cut into three fragments.
fn certificate_fragments(certificate: &[u8]) -> Vec<Vec<u8>> {
    let len = certificate.len() - Header::LEN;
    let third = len / 3;
    vec![
        fragment(certificate, 0, third),
        fragment(certificate, third, third),
        fragment(certificate, 2 * third, len - 2 * third),
    ]
}

#[test]
fn certificate_fragments_in_any_order() {
    init_log();

    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in orders {
        let (mut client, mut server, flight) = awaiting_server_flight();
        let fragments = certificate_fragments(&flight[1]);

        let datagram = server.datagram(&flight[..1]);
        client.handle_packet(&datagram).unwrap();
        assert_eq!(client.state_name(), "ExpectingCertificate");

        for (i, &index) in order.iter().enumerate() {
            let datagram = server.datagram(&[fragments[index].clone()]);
            client.handle_packet(&datagram).unwrap();

            let expected = if i < 2 {
                "ExpectingCertificate"
            } else {
                "ExpectingServerKeyExchange"
            };
            assert_eq!(client.state_name(), expected, "{:?}", order);
        }

        let datagram = server.datagram(&flight[2..]);
        client.handle_packet(&datagram).unwrap();
        assert_eq!(client.state_name(), "ExpectingChangeCipherSpec");

        let sent = collect_packets(&mut client);
        server.client_flight(&sent);
        client.handle_packet(&server.finish_flight()).unwrap();
        assert!(client.is_connected(), "{:?}", order);
    }
}

#[test]
fn missing_fragment_stalls_until_it_arrives() {
    init_log();

    let (mut client, mut server, flight) = awaiting_server_flight();
    let fragments = certificate_fragments(&flight[1]);

    let mut messages = vec![flight[0].clone(), fragments[0].clone(), fragments[2].clone()];
    messages.extend_from_slice(&flight[2..]);
    let datagram = server.datagram(&messages);
    client.handle_packet(&datagram).unwrap();

    assert_eq!(client.state_name(), "ExpectingCertificate");
    assert!(collect_packets(&mut client).is_empty());

    // Key exchange and done are already buffered behind the gap.
    let datagram = server.datagram(&[fragments[1].clone()]);
    client.handle_packet(&datagram).unwrap();
    assert_eq!(client.state_name(), "ExpectingChangeCipherSpec");
    assert_eq!(collect_packets(&mut client).len(), 1);
}

#[test]
fn overlapping_fragments_do_not_complete() {
    init_log();

    let (mut client, mut server, flight) = awaiting_server_flight();
    let certificate = &flight[1];
    let len = certificate.len() - Header::LEN;
    let half = len / 2;

    // Together these cover the whole body, but overlap by 40 bytes.
    let messages = vec![
        flight[0].clone(),
        fragment(certificate, 0, half + 40),
        fragment(certificate, half, len - half),
        flight[2].clone(),
        flight[3].clone(),
    ];
    let datagram = server.datagram(&messages);
    client.handle_packet(&datagram).unwrap();

    assert_eq!(client.state_name(), "ExpectingCertificate");
    assert!(collect_packets(&mut client).is_empty());

    // The missing tail, cut to fit exactly.
    let datagram = server.datagram(&[fragment(certificate, half + 40, len - half - 40)]);
    client.handle_packet(&datagram).unwrap();
    assert_eq!(client.state_name(), "ExpectingChangeCipherSpec");
}

#[test]
fn several_fragments_in_one_record() {
    init_log();

    let (mut client, mut server, flight) = awaiting_server_flight();
    let fragments = certificate_fragments(&flight[1]);

    let mut record = flight[0].clone();
    for f in fragments.iter().rev() {
        record.extend_from_slice(f);
    }
    let datagram = server.datagram(&[record]);
    client.handle_packet(&datagram).unwrap();
    assert_eq!(client.state_name(), "ExpectingServerKeyExchange");
}

#[test]
fn client_hello_fragmented_to_mtu() {
    init_log();

    const MTU: usize = 101;
    let cookie = [7u8; 64];

    let config = Config::builder()
        .rng_seed(Some(42))
        .mtu(MTU)
        .build()
        .unwrap();
    let mut client = new_client(config);
    let mut server = TestServer::new();

    let now = Instant::now();
    client.handle_timeout(now).unwrap();
    let hello = collect_packets(&mut client);
    assert_eq!(hello.len(), 1);
    assert!(hello[0].len() <= MTU);
    server.client_hello(&hello[0]);

    client
        .handle_packet(&server.hello_verify_with(&cookie))
        .unwrap();
    let sent = collect_packets(&mut client);
    assert_eq!(sent.len(), 2);
    client.handle_timeout(now).unwrap();

    let body = reassemble(&mut server, &sent);
    let (_, hello) = ClientHello::parse(&body).unwrap();
    assert_eq!(&hello.cookie[..], &cookie[..]);

    // The resend is cut the same way.
    client
        .handle_timeout(now + Duration::from_millis(200))
        .unwrap();
    let resent = collect_packets(&mut client);
    assert_eq!(resent.len(), sent.len());
    assert_eq!(reassemble(&mut server, &resent), body);
}

/// Check the fragments of one ClientHello and put its body back together.
fn reassemble(server: &mut TestServer, datagrams: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut total = None;

    for datagram in datagrams {
        assert!(datagram.len() <= 101, "datagram of {}", datagram.len());

        for record in server.read(datagram) {
            for (header, fragment) in record.handshakes() {
                assert_eq!(header.msg_type, MessageType::ClientHello);
                assert_eq!(header.message_seq, message_seq::CLIENT_HELLO_WITH_COOKIE);
                assert_eq!(header.fragment_offset as usize, body.len());
                assert_eq!(header.fragment_length as usize, fragment.len());
                assert_eq!(*total.get_or_insert(header.length), header.length);
                body.extend_from_slice(&fragment);
            }
        }
    }

    assert_eq!(Some(body.len() as u32), total);
    body
}
