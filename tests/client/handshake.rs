//! Full handshakes against the scripted server, and the fatal paths.

use std::time::Instant;

use dtls_auth::message::*;
use dtls_auth::{Config, Error};

use crate::common::*;

#[test]
fn handshake_with_cookie_exchange_flushes_queued_data() {
    //! The queued payload leaves as exactly one record, right after Connected.
    init_log();

    let now = Instant::now();
    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.send_application_data(b"hello").unwrap();

    let drained = handshake(&mut client, &mut server, now);
    assert!(client.is_connected());
    assert_eq!(client.state_name(), "Established");
    assert_eq!(drained.connected, 1);
    assert_eq!(drained.order, vec!["connected", "packet"]);

    let records = server.read(&drained.packets[0]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content_type, ContentType::ApplicationData);
    assert_eq!(records[0].epoch, 1);
    assert_eq!(records[0].plaintext, b"hello");

    let reply = server.app_data(b"welcome");
    client.handle_packet(&reply).unwrap();
    let drained = drain(&mut client);
    assert_eq!(drained.app_data, vec![b"welcome".to_vec()]);
    assert!(drained.packets.is_empty());
}

#[test]
fn client_hello_offers_one_profile() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();
    client.handle_timeout(Instant::now()).unwrap();

    let packets = collect_packets(&mut client);
    assert_eq!(packets.len(), 1);

    let records = server.read(&packets[0]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].version, ProtocolVersion::DTLS1_2);
    assert_eq!(records[0].epoch, 0);
    assert_eq!(records[0].sequence_number, 0);

    let (header, body) = server.client_hello(&packets[0]);
    assert_eq!(header.message_seq, message_seq::CLIENT_HELLO);

    let (rest, hello) = ClientHello::parse(&body).unwrap();
    assert!(rest.is_empty());
    assert_eq!(hello.client_version, ProtocolVersion::DTLS1_2);
    assert!(hello.session_id.is_empty());
    assert!(hello.cookie.is_empty());
    assert_eq!(
        &hello.cipher_suites[..],
        &[CipherSuite::ECDHE_RSA_AES128_GCM_SHA256]
    );
    assert_eq!(&hello.compression_methods[..], &[CompressionMethod::Null]);
    assert_eq!(hello.extensions.len(), 1);
    assert_eq!(
        hello.extensions[0].extension_type,
        ExtensionType::SupportedGroups
    );
    assert_eq!(hello.extensions[0].extension_data, &[0x00, 0x02, 0x00, 0x1D]);
}

#[test]
fn client_hello_echoes_cookie() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();
    client.handle_timeout(Instant::now()).unwrap();

    let first = collect_packets(&mut client);
    // The HelloVerifyRequest travels in a DTLS 1.0 record.
    client.handle_packet(&server.hello_verify(&first[0])).unwrap();

    let second = collect_packets(&mut client);
    assert_eq!(second.len(), 1);

    let records = server.read(&second[0]);
    assert_eq!(records[0].sequence_number, 1);

    let (header, body) = server.client_hello(&second[0]);
    assert_eq!(header.message_seq, message_seq::CLIENT_HELLO_WITH_COOKIE);
    let (_, hello) = ClientHello::parse(&body).unwrap();
    assert_eq!(&hello.cookie[..], COOKIE);
}

#[test]
fn repeated_hello_verify_is_ignored() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();
    client.handle_timeout(Instant::now()).unwrap();

    let first = collect_packets(&mut client);
    let hello_verify = server.hello_verify(&first[0]);
    client.handle_packet(&hello_verify).unwrap();
    assert_eq!(collect_packets(&mut client).len(), 1);

    // Same cookie again, in a fresh record.
    let again = server.hello_verify_with(COOKIE);
    client.handle_packet(&again).unwrap();
    assert!(collect_packets(&mut client).is_empty());
    assert_eq!(client.state_name(), "ExpectingServerHello");
}

#[test]
fn hello_verify_with_empty_cookie_is_ignored() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();
    client.handle_timeout(Instant::now()).unwrap();
    collect_packets(&mut client);

    client.handle_packet(&server.hello_verify_with(&[])).unwrap();
    assert!(collect_packets(&mut client).is_empty());
}

/// Run the cookie exchange, then deliver the whole server flight in one datagram.
fn deliver_server_flight(
    client: &mut dtls_auth::Client,
    server: &mut TestServer,
) -> Result<(), Error> {
    client.handle_timeout(Instant::now()).unwrap();
    let hello = collect_packets(client);
    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    let hello = collect_packets(client);

    let flight = server.server_flight(&hello[0]);
    let datagram = server.datagram(&flight);
    client.handle_packet(&datagram)
}

#[test]
fn server_hello_version_mismatch_is_fatal() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();
    server.version = ProtocolVersion::DTLS1_0;

    let result = deliver_server_flight(&mut client, &mut server);
    assert!(matches!(result, Err(Error::UnexpectedProtocolVersion(0xFEFF))));
    assert!(collect_packets(&mut client).is_empty());

    // Poisoned until restarted.
    assert!(matches!(
        client.handle_timeout(Instant::now()),
        Err(Error::Closed)
    ));
    assert!(matches!(
        client.send_application_data(b"x"),
        Err(Error::Closed)
    ));
}

#[test]
fn server_hello_unknown_suite_is_fatal() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();
    server.cipher_suite = CipherSuite::Unknown(0xC030);

    let result = deliver_server_flight(&mut client, &mut server);
    assert!(matches!(result, Err(Error::UnsupportedCipherSuite(0xC030))));
}

#[test]
fn empty_certificate_chain_is_fatal() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.handle_timeout(Instant::now()).unwrap();
    let hello = collect_packets(&mut client);
    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    let hello = collect_packets(&mut client);

    let mut flight = server.server_flight(&hello[0]);
    flight[1] = message(MessageType::Certificate, message_seq::CERTIFICATE, &[0, 0, 0]);
    let datagram = server.datagram(&flight);

    let result = client.handle_packet(&datagram);
    assert!(matches!(result, Err(Error::CertificateError(_))));
    assert!(matches!(client.handle_packet(&datagram), Err(Error::Closed)));
}

#[test]
fn bad_key_exchange_signature_is_fatal() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();
    server.corrupt_signature = true;

    let result = deliver_server_flight(&mut client, &mut server);
    assert!(matches!(result, Err(Error::BadServerSignature(_))));
    assert!(!client.is_connected());
}

#[test]
fn bad_key_exchange_signature_tolerated_when_configured() {
    init_log();

    let config = Config::builder()
        .rng_seed(Some(42))
        .verify_server_signature(false)
        .build()
        .unwrap();
    let mut client = new_client(config);
    let mut server = TestServer::new();
    server.corrupt_signature = true;

    let drained = handshake(&mut client, &mut server, Instant::now());
    assert_eq!(drained.connected, 1);
    assert!(client.is_connected());
}

#[test]
fn finished_mismatch_is_fatal() {
    init_log();

    let now = Instant::now();
    let mut client = new_client(config());
    let mut server = TestServer::new();
    server.corrupt_finished = true;

    deliver_server_flight(&mut client, &mut server).unwrap();
    let flight = collect_packets(&mut client);
    server.client_flight(&flight);

    let result = client.handle_packet(&server.finish_flight());
    assert!(matches!(result, Err(Error::FinishedMismatch)));
    assert!(!client.is_connected());
    assert_eq!(drain(&mut client).connected, 0);
}

#[test]
fn client_flight_is_key_exchange_change_cipher_spec_finished() {
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();

    deliver_server_flight(&mut client, &mut server).unwrap();
    assert_eq!(client.state_name(), "ExpectingChangeCipherSpec");

    let flight = collect_packets(&mut client);
    assert_eq!(flight.len(), 1, "whole flight fits one datagram");

    let seen = server.client_flight(&flight);
    assert_eq!(
        seen,
        vec![
            (ContentType::Handshake, 0),
            (ContentType::ChangeCipherSpec, 0),
            (ContentType::Handshake, 1),
        ]
    );
}

#[test]
fn server_flight_in_reverse_order() {
    init_log();

    let now = Instant::now();
    let mut client = new_client(config());
    let mut server = TestServer::new();

    client.handle_timeout(now).unwrap();
    let hello = collect_packets(&mut client);
    client.handle_packet(&server.hello_verify(&hello[0])).unwrap();
    let hello = collect_packets(&mut client);

    let flight = server.server_flight(&hello[0]);
    for m in flight.iter().skip(1).rev() {
        let datagram = server.datagram(&[m.clone()]);
        client.handle_packet(&datagram).unwrap();
        assert!(collect_packets(&mut client).is_empty());
        assert_eq!(client.state_name(), "ExpectingServerHello");
    }

    let datagram = server.datagram(&flight[..1]);
    client.handle_packet(&datagram).unwrap();
    assert_eq!(client.state_name(), "ExpectingChangeCipherSpec");

    let flight = collect_packets(&mut client);
    server.client_flight(&flight);
    client.handle_packet(&server.finish_flight()).unwrap();
    assert!(client.is_connected());
}

#[test]
fn server_finished_before_change_cipher_spec() {
    //! The Finished waits in reassembly until the ChangeCipherSpec lets its
    //! epoch be opened. Delivered first, it is dropped and must come again.
    init_log();

    let mut client = new_client(config());
    let mut server = TestServer::new();

    deliver_server_flight(&mut client, &mut server).unwrap();
    let flight = collect_packets(&mut client);
    server.client_flight(&flight);

    let datagram = server.finish_flight();
    let (rest, change_cipher_spec) = Record::parse(&datagram).unwrap();
    let ccs_len = datagram.len() - rest.len();

    client.handle_packet(&datagram[ccs_len..]).unwrap();
    assert_eq!(client.state_name(), "ExpectingChangeCipherSpec");
    assert_eq!(
        change_cipher_spec.header.content_type,
        ContentType::ChangeCipherSpec
    );

    client.handle_packet(&datagram[..ccs_len]).unwrap();
    assert_eq!(client.state_name(), "ExpectingFinished");

    client.handle_packet(&server.finish_flight()).unwrap();
    assert!(client.is_connected());
}

#[test]
fn close_notify_keeps_connection() {
    init_log();

    let (mut client, mut server) = established(config(), Instant::now());

    let mut alert = dtls_auth::Buf::new();
    Alert::new(AlertLevel::Warning, Alert::CLOSE_NOTIFY).serialize(&mut alert);
    let record = server.record(ContentType::Alert, 1, &alert);

    client.handle_packet(&record).unwrap();
    assert!(client.is_connected());
}

#[test]
fn fatal_alert_after_connect() {
    init_log();

    let (mut client, mut server) = established(config(), Instant::now());

    let mut alert = dtls_auth::Buf::new();
    Alert::new(AlertLevel::Fatal, Alert::HANDSHAKE_FAILURE).serialize(&mut alert);
    let record = server.record(ContentType::Alert, 1, &alert);

    assert!(matches!(
        client.handle_packet(&record),
        Err(Error::PeerAlert(40))
    ));
    assert!(matches!(
        client.send_application_data(b"late"),
        Err(Error::Closed)
    ));
}
