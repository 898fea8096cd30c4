//! Flight retransmission, duplicate handling and restart.

use std::time::{Duration, Instant};

use dtls_auth::message::*;

use crate::common::*;

const RTO: Duration = Duration::from_millis(200);

#[test]
fn client_hello_resent_without_limit() {
    init_log();

    let mut now = Instant::now();
    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.handle_timeout(now).unwrap();
    let drained = drain(&mut client);
    assert_eq!(drained.packets.len(), 1);
    assert_eq!(drained.timeout, Some(now + RTO));

    let original = server.read(&drained.packets[0]).remove(0);

    for round in 1..=25u64 {
        now += RTO;
        client.handle_timeout(now).unwrap();
        let drained = drain(&mut client);
        assert_eq!(drained.packets.len(), 1, "round {}", round);
        assert_eq!(drained.timeout, Some(now + RTO));

        let resent = server.read(&drained.packets[0]).remove(0);
        assert_eq!(resent.plaintext, original.plaintext);
        assert_eq!(resent.sequence_number, round);
    }
}

#[test]
fn nothing_resent_before_deadline() {
    init_log();

    let now = Instant::now();
    let mut client = new_client(config());
    client.handle_timeout(now).unwrap();
    collect_packets(&mut client);

    client.handle_timeout(now + RTO / 2).unwrap();
    assert!(collect_packets(&mut client).is_empty());

    client.handle_timeout(now + RTO - Duration::from_millis(1)).unwrap();
    assert!(collect_packets(&mut client).is_empty());
}

/// Run up to the point where the client's key exchange flight is out.
///
/// Also returns the server flight messages, for repeating them.
fn at_client_flight(
    now: Instant,
) -> (dtls_auth::Client, TestServer, Vec<Vec<u8>>, Vec<Vec<u8>>) {
    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.handle_timeout(now).unwrap();
    let hello = collect_packets(&mut client);
    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    let hello = collect_packets(&mut client);
    let flight = server.server_flight(&hello[0]);
    let datagram = server.datagram(&flight);
    client.handle_packet(&datagram).unwrap();

    let sent = collect_packets(&mut client);
    assert_eq!(sent.len(), 1);

    // The caller answers the immediate timeout, which starts the timer.
    client.handle_timeout(now).unwrap();
    (client, server, sent, flight)
}

#[test]
fn flight_sent_from_packet_waits_a_full_interval() {
    //! The flight answering a packet is timed from the next timeout call,
    //! not from whenever the timer was last driven.
    init_log();

    let start = Instant::now();
    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.handle_timeout(start).unwrap();
    let hello = collect_packets(&mut client);
    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    let hello = collect_packets(&mut client);
    let flight = server.server_flight(&hello[0]);
    client.handle_packet(&server.datagram(&flight)).unwrap();

    let drained = drain(&mut client);
    assert_eq!(drained.packets.len(), 1);
    assert_eq!(drained.timeout, Some(start));

    // Well past the old deadline. This only starts the timer.
    let now = start + RTO + Duration::from_millis(100);
    client.handle_timeout(now).unwrap();
    let drained = drain(&mut client);
    assert!(drained.packets.is_empty());
    assert_eq!(drained.timeout, Some(now + RTO));

    client.handle_timeout(now + RTO - Duration::from_millis(1)).unwrap();
    assert!(collect_packets(&mut client).is_empty());

    client.handle_timeout(now + RTO).unwrap();
    let resent = collect_packets(&mut client);
    assert_eq!(resent.len(), 1);
    assert_eq!(server.read(&resent[0]).len(), 3);
}

#[test]
fn client_flight_resent_with_fresh_sequence_numbers() {
    init_log();

    let now = Instant::now();
    let (mut client, mut server, sent, _) = at_client_flight(now);
    server.client_flight(&sent);

    client.handle_timeout(now + RTO).unwrap();
    let resent = collect_packets(&mut client);
    assert_eq!(resent.len(), 1);

    let before = server.read(&sent[0]);
    let after = server.read(&resent[0]);
    assert_eq!(before.len(), 3);
    assert_eq!(after.len(), 3);

    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.content_type, b.content_type);
        assert_eq!(a.epoch, b.epoch);
        assert_eq!(a.plaintext, b.plaintext);
        assert!(b.sequence_number > a.sequence_number);
    }

    // Epoch 0: two ClientHellos, then key exchange and ChangeCipherSpec.
    assert_eq!(before[0].sequence_number, 2);
    assert_eq!(before[1].sequence_number, 3);
    assert_eq!(after[0].sequence_number, 4);
    assert_eq!(after[1].sequence_number, 5);
    // Epoch 1 starts from zero.
    assert_eq!(before[2].sequence_number, 0);
    assert_eq!(after[2].sequence_number, 1);

    // A server that only saw the resend still completes the handshake.
    client.handle_packet(&server.finish_flight()).unwrap();
    assert!(client.is_connected());
}

#[test]
fn server_seeing_flight_twice_transcribes_it_once() {
    init_log();

    let now = Instant::now();
    let (mut client, mut server, mut sent, _) = at_client_flight(now);

    client.handle_timeout(now + RTO).unwrap();
    sent.extend(collect_packets(&mut client));
    assert_eq!(sent.len(), 2);

    let records = server.client_flight(&sent);
    assert_eq!(records.len(), 6);

    client.handle_packet(&server.finish_flight()).unwrap();
    assert!(client.is_connected());
}

#[test]
fn repeated_server_flight_triggers_resend() {
    //! A repeated ServerHelloDone means our flight got lost. It is answered
    //! at once instead of waiting for the timer.
    init_log();

    let now = Instant::now();
    let (mut client, mut server, sent, flight) = at_client_flight(now);
    server.client_flight(&sent);

    // Same messages, fresh record sequence numbers.
    let datagram = server.datagram(&flight);
    client.handle_packet(&datagram).unwrap();

    let resent = collect_packets(&mut client);
    assert_eq!(resent.len(), 1);
    let records = server.read(&resent[0]);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].sequence_number, 4);
    assert_eq!(records[2].sequence_number, 1);
    assert_eq!(client.state_name(), "ExpectingChangeCipherSpec");

    // Only the ServerHelloDone triggers it.
    let datagram = server.datagram(&flight[..3]);
    client.handle_packet(&datagram).unwrap();
    assert!(collect_packets(&mut client).is_empty());
}

#[test]
fn lost_server_finished_recovered_by_timer() {
    init_log();

    let now = Instant::now();
    let (mut client, mut server, sent, _) = at_client_flight(now);
    server.client_flight(&sent);

    // First answer lost.
    let _lost = server.finish_flight();

    client.handle_timeout(now + RTO).unwrap();
    assert_eq!(collect_packets(&mut client).len(), 1);

    client.handle_packet(&server.finish_flight()).unwrap();
    let drained = drain(&mut client);
    assert_eq!(drained.connected, 1);
    assert!(drained.packets.is_empty());
}

#[test]
fn no_resend_once_established() {
    init_log();

    let now = Instant::now();
    let (mut client, _server) = established(config(), now);

    client.handle_timeout(now + RTO * 10).unwrap();
    let drained = drain(&mut client);
    assert!(drained.packets.is_empty());

    let timeout = drained.timeout.unwrap();
    assert!(timeout > now + Duration::from_secs(24 * 60 * 60));
}

#[test]
fn restart_begins_a_fresh_attempt() {
    init_log();

    let now = Instant::now();
    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.handle_timeout(now).unwrap();
    let hello = collect_packets(&mut client);
    let (_, body) = server.client_hello(&hello[0]);
    let (_, first) = ClientHello::parse(&body).unwrap();
    let first_random = first.random;

    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    collect_packets(&mut client);

    client.send_application_data(b"dropped").unwrap();
    client.restart(now + RTO).unwrap();
    assert_eq!(client.state_name(), "ExpectingServerHello");

    let hello = collect_packets(&mut client);
    assert_eq!(hello.len(), 1);

    let records = server.read(&hello[0]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sequence_number, 0);

    let (header, body) = server.client_hello(&hello[0]);
    assert_eq!(header.message_seq, message_seq::CLIENT_HELLO);
    let (_, restarted) = ClientHello::parse(&body).unwrap();
    assert!(restarted.cookie.is_empty());
    assert_ne!(restarted.random, first_random);

    // The restarted client completes a handshake. The queued data is gone.
    server.reset();
    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    let hello = collect_packets(&mut client);
    let flight = server.server_flight(&hello[0]);
    let datagram = server.datagram(&flight);
    client.handle_packet(&datagram).unwrap();
    let flight = collect_packets(&mut client);
    server.client_flight(&flight);
    client.handle_packet(&server.finish_flight()).unwrap();

    let drained = drain(&mut client);
    assert_eq!(drained.connected, 1);
    assert!(drained.packets.is_empty());
}
