//! DTLS 1.2 client
//!
//! This module implements the client side of the one handshake profile this
//! crate speaks: ECDHE with X25519, an RSA-signed ServerKeyExchange and
//! AES-128-GCM records.
//!
//! The client is sans-IO. Datagrams go in through
//! [`Client::handle_packet`], time goes in through [`Client::handle_timeout`]
//! and everything the caller has to act on comes out of
//! [`Client::poll_output`].
//!
//! Client flow:
//!
//! 1. ClientHello
//! 2. (HelloVerifyRequest → ClientHello with cookie)
//! 3. ServerHello, Certificate, ServerKeyExchange, ServerHelloDone
//! 4. ClientKeyExchange, ChangeCipherSpec, Finished
//! 5. ChangeCipherSpec, Finished
//! 6. Application data
//!
//! Handshake messages that do not fit the current state are ignored rather
//! than rejected. Loss and reordering are repaired by resending the last
//! flight on a fixed interval.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::buffer::{Buf, BufferPool, ToBuf};
use crate::crypto::prf::{self, MASTER_SECRET_LEN, VERIFY_DATA_LEN};
use crate::crypto::{AeadRecordProtection, KeyPair, ServerPublicKey, Side};
use crate::epoch::{Epoch, Epochs, Inbound};
use crate::message::message_seq;
use crate::message::{Alert, AlertLevel, Certificate, CipherSuite, ClientHello};
use crate::message::{ClientKeyExchange, CompressionMethod, ContentType, Cookie, ExtensionType};
use crate::message::{Finished, Handshake, Header, HelloVerifyRequest, MessageType, NamedCurve};
use crate::message::{ProtocolVersion, Random, Record, ServerHello, ServerKeyExchange};
use crate::message::{CHANGE_CIPHER_SPEC, CURVE_TYPE_NAMED_CURVE, MAX_PLAINTEXT_LEN};
use crate::queue::{QueueRx, QueueTx};
use crate::reassembly::{Insert, Message, Reassembler};
use crate::rng::SeededRng;
use crate::timer::FlightTimer;
use crate::{Config, Error, Output};

/// Epoch number the handshake negotiates.
const NEGOTIATED_EPOCH: u16 = 1;

const DISTANT_FUTURE: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// DTLS 1.2 client
pub struct Client {
    config: Arc<Config>,
    rng: SeededRng,

    /// Current client state.
    state: State,

    /// Record protection for the current and negotiated epochs.
    epochs: Epochs,

    /// Everything learned or derived during this connection attempt.
    negotiation: Negotiation,

    /// Inbound handshake messages not yet processed.
    reassembler: Reassembler,

    buffers_free: BufferPool,
    queue_tx: QueueTx,
    queue_rx: QueueRx,

    /// Plaintext records of the last flight, kept for resends.
    flight_saved_records: Vec<Entry>,
    flight_timer: FlightTimer,

    /// Caller-level cap on the whole handshake.
    handshake_deadline: Option<Instant>,

    /// Local events
    local_events: VecDeque<LocalEvent>,

    /// Data that is sent before we are connected.
    queued_data: VecDeque<Buf>,

    /// The last now we seen
    last_now: Option<Instant>,

    /// Set by a fatal error. Only `restart` clears it.
    closed: bool,
}

#[derive(Default)]
struct Negotiation {
    client_random: Option<Random>,
    server_random: Option<Random>,
    cookie: Cookie,
    server_key: Option<ServerPublicKey>,
    key_pair: Option<KeyPair>,
    master_secret: Option<Zeroizing<[u8; MASTER_SECRET_LEN]>>,
    expected_server_verify: Option<[u8; VERIFY_DATA_LEN]>,
    /// Every handshake message since the cookie exchange, headers normalised.
    transcript: Buf,
    peer_change_cipher_spec: bool,
}

#[derive(Debug)]
struct Entry {
    content_type: ContentType,
    epoch: u16,
    fragment: Buf,
}

/// Outcome of checking an inbound handshake fragment against the state.
///
/// Fatal problems are returned as `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Accept,
    Ignore(&'static str),
}

impl Client {
    /// Create a new DTLS client.
    ///
    /// Nothing is sent until the first [`Client::handle_timeout`].
    pub fn new(config: Arc<Config>) -> Client {
        let rng = SeededRng::new(config.rng_seed());
        let flight_timer = FlightTimer::new(config.flight_rto());

        Client {
            config,
            rng,
            state: State::Initializing,
            epochs: Epochs::default(),
            negotiation: Negotiation::default(),
            reassembler: Reassembler::new(),
            buffers_free: BufferPool::default(),
            queue_tx: QueueTx::new(),
            queue_rx: QueueRx::new(),
            flight_saved_records: Vec::new(),
            flight_timer,
            handshake_deadline: None,
            local_events: VecDeque::new(),
            queued_data: VecDeque::new(),
            last_now: None,
            closed: false,
        }
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Whether the handshake has completed.
    pub fn is_connected(&self) -> bool {
        self.state == State::Established
    }

    /// Feed one received datagram.
    ///
    /// Records that fail to parse, belong to another epoch or repeat an earlier
    /// sequence number are dropped. An error is fatal for this connection
    /// attempt.
    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        let result = self.process_datagram(packet);
        self.close_on_error(result)
    }

    /// Drive the handshake.
    ///
    /// The first call sends the ClientHello. Later calls resend the last flight
    /// when its timer has expired.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.ensure_open()?;
        let result = self.process_timeout(now);
        self.close_on_error(result)
    }

    /// Next thing for the caller to act on.
    ///
    /// `buf` must hold the larger of the configured MTU and
    /// [`MAX_RECORD_LEN`](crate::message::MAX_RECORD_LEN) (`13 + 24 + 16384`),
    /// the size of one record carrying a full plaintext.
    pub fn poll_output<'a>(&mut self, buf: &'a mut [u8]) -> Output<'a> {
        let now = self.last_now.unwrap_or_else(Instant::now);

        if let Some(event) = self.local_events.pop_front() {
            return event.into_output();
        }

        if let Some(data) = self.queue_rx.pop_front() {
            let len = data.len();
            assert!(
                len <= buf.len(),
                "Output buffer too small for application data {} > {}",
                len,
                buf.len()
            );
            buf[..len].copy_from_slice(&data);
            self.buffers_free.push(data);
            return Output::ApplicationData(&buf[..len]);
        }

        if let Some(packet) = self.queue_tx.pop_front() {
            let len = packet.len();
            assert!(
                len <= buf.len(),
                "Output buffer too small for packet {} > {}",
                len,
                buf.len()
            );
            buf[..len].copy_from_slice(&packet);
            self.buffers_free.push(packet);
            return Output::Packet(&buf[..len]);
        }

        Output::Timeout(self.poll_timeout(now))
    }

    /// Send application data.
    ///
    /// Once connected, every call produces exactly one protected record.
    /// Before that the data is queued and flushed right after the handshake
    /// completes.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;

        if data.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::ApplicationDataTooLarge(data.len()));
        }

        if self.state != State::Established {
            if self.queued_data.len() >= self.config.max_queued_app_data() {
                return Err(Error::ApplicationQueueFull);
            }
            trace!("Queue {} bytes until connected", data.len());
            self.queued_data.push_back(data.to_buf());
            return Ok(());
        }

        self.create_record(ContentType::ApplicationData, NEGOTIATED_EPOCH, false, data)
    }

    /// Abandon the current attempt and start over with fresh randomness.
    ///
    /// Clears all keys, queued data and pending output. The new ClientHello
    /// is available from `poll_output` straight away.
    pub fn restart(&mut self, now: Instant) -> Result<(), Error> {
        debug!("Restart handshake from {:?}", self.state);

        self.state = State::Initializing;
        self.epochs = Epochs::default();
        self.negotiation = Negotiation::default();
        self.reassembler.clear();
        self.flight_timer = FlightTimer::new(self.config.flight_rto());
        self.handshake_deadline = None;
        self.local_events.clear();
        self.last_now = None;
        self.closed = false;

        for buf in self.queue_tx.drain(..) {
            self.buffers_free.push(buf);
        }
        for buf in self.queue_rx.drain(..) {
            self.buffers_free.push(buf);
        }
        for buf in self.queued_data.drain(..) {
            self.buffers_free.push(buf);
        }
        for entry in self.flight_saved_records.drain(..) {
            self.buffers_free.push(entry.fragment);
        }

        self.handle_timeout(now)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn close_on_error<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            warn!("Connection attempt failed in {}: {}", self.state.name(), e);
            self.closed = true;
        }
        result
    }

    fn process_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.last_now = Some(now);

        if self.negotiation.client_random.is_none() {
            self.negotiation.client_random = Some(Random::new(&mut self.rng));
            self.handshake_deadline = self.config.handshake_timeout().map(|t| now + t);
        }

        if let Some(deadline) = self.handshake_deadline {
            if now >= deadline {
                return Err(Error::Timeout("handshake"));
            }
        }

        self.make_progress()?;

        if self.flight_timer.poll_expired(now) {
            debug!(
                "Flight timeout in {} (resend {}), next in {}s",
                self.state.name(),
                self.flight_timer.fired(),
                self.flight_timer.rto().as_secs_f32()
            );
            self.flight_resend("flight timeout")?;
        }

        Ok(())
    }

    fn poll_timeout(&self, now: Instant) -> Instant {
        if self.closed {
            return now + DISTANT_FUTURE;
        }

        // A flight left from handle_packet. The next handle_timeout arms it.
        if self.flight_timer.is_unarmed() {
            return now;
        }

        [self.flight_timer.deadline(), self.handshake_deadline]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now + DISTANT_FUTURE)
    }

    fn make_progress(&mut self) -> Result<(), Error> {
        loop {
            let prev_state = self.state;

            let new_state = prev_state.make_progress(self)?;
            if prev_state != new_state {
                self.state = new_state;
                trace!("{:?} -> {:?}", prev_state, new_state);
            } else {
                break;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------------

    fn process_datagram(&mut self, packet: &[u8]) -> Result<(), Error> {
        let mut rest = packet;

        while !rest.is_empty() {
            let (next, record) = match Record::parse(rest) {
                Ok(v) => v,
                Err(e) => {
                    debug!("Discard rest of datagram: {}", Error::from(e));
                    break;
                }
            };
            rest = next;

            self.process_record(&record)?;
            self.make_progress()?;
        }

        Ok(())
    }

    fn process_record(&mut self, record: &Record) -> Result<(), Error> {
        let mut plaintext = self.buffers_free.pop();

        let result = match self.epochs.open(record, &mut plaintext) {
            Ok(Inbound::Accepted(epoch)) => {
                self.dispatch(record.header.content_type, epoch, &plaintext)
            }
            Ok(Inbound::Dropped(reason)) => {
                trace!(
                    "Drop {:?} record {}:{}: {}",
                    record.header.content_type,
                    record.header.sequence.epoch,
                    record.header.sequence.sequence_number,
                    reason
                );
                Ok(())
            }
            Err(e) => Err(e),
        };

        self.buffers_free.push(plaintext);
        result
    }

    fn dispatch(&mut self, content_type: ContentType, epoch: u16, plaintext: &[u8]) -> Result<(), Error> {
        match content_type {
            ContentType::Handshake => {
                let mut rest = plaintext;
                while !rest.is_empty() {
                    let (next, handshake) = match Handshake::parse(rest) {
                        Ok(v) => v,
                        Err(e) => {
                            debug!("Discard rest of handshake record: {}", Error::from(e));
                            break;
                        }
                    };
                    rest = next;
                    self.handle_handshake(epoch, &handshake)?;
                }
            }

            ContentType::ChangeCipherSpec => {
                if plaintext != &CHANGE_CIPHER_SPEC[..] {
                    debug!("Ignore malformed ChangeCipherSpec");
                } else if self.state == State::ExpectingChangeCipherSpec && epoch == 0 {
                    self.negotiation.peer_change_cipher_spec = true;
                } else {
                    trace!("Ignore ChangeCipherSpec in {}", self.state.name());
                }
            }

            ContentType::Alert => {
                let alert = match Alert::parse(plaintext) {
                    Ok((_, alert)) => alert,
                    Err(_) => {
                        debug!("Ignore malformed alert");
                        return Ok(());
                    }
                };

                match alert.level {
                    AlertLevel::Fatal => return Err(Error::PeerAlert(alert.description)),
                    _ if alert.description == Alert::CLOSE_NOTIFY => {
                        debug!("Peer sent close_notify");
                    }
                    _ => warn!("Peer sent warning alert: {}", alert.description),
                }
            }

            ContentType::ApplicationData => {
                if self.state == State::Established && epoch == NEGOTIATED_EPOCH {
                    let mut data = self.buffers_free.pop();
                    data.extend_from_slice(plaintext);
                    self.queue_rx.push_back(data);
                } else {
                    debug!("Ignore application data in {}", self.state.name());
                }
            }

            ContentType::Unknown(value) => {
                trace!("Ignore record with unknown content type {}", value);
            }
        }

        Ok(())
    }

    fn handle_handshake(&mut self, epoch: u16, handshake: &Handshake) -> Result<(), Error> {
        let header = &handshake.header;

        if header.msg_type == MessageType::HelloVerifyRequest {
            return self.handle_hello_verify(epoch, handshake);
        }

        match self.classify(epoch, header) {
            Disposition::Accept => match self.reassembler.insert(header, handshake.fragment) {
                Insert::Accepted => {}
                Insert::Duplicate => {
                    trace!("Duplicate fragment of {:?}", header.msg_type);
                }
                Insert::Rejected(reason) => {
                    debug!("Reject fragment of {:?}: {}", header.msg_type, reason);
                }
            },
            Disposition::Ignore(reason) => {
                debug!(
                    "Ignore {:?} message_seq {} in {}: {}",
                    header.msg_type,
                    header.message_seq,
                    self.state.name(),
                    reason
                );

                // The server only repeats its last flight when ours got lost.
                if self.state.awaits_server_finish()
                    && header.msg_type == MessageType::ServerHelloDone
                {
                    self.flight_resend("peer resent ServerHelloDone")?;
                }
            }
        }

        Ok(())
    }

    /// Decide whether a handshake fragment may enter reassembly.
    fn classify(&self, epoch: u16, header: &Header) -> Disposition {
        let Some(expected_seq) = self.state.expected_message_seq() else {
            return Disposition::Ignore("no handshake message expected");
        };

        let Some(msg_type) = server_message_type(header.message_seq) else {
            return Disposition::Ignore("message_seq out of range");
        };

        if header.msg_type != msg_type {
            return Disposition::Ignore("message type does not match message_seq");
        }

        let expected_epoch = if msg_type == MessageType::Finished {
            NEGOTIATED_EPOCH
        } else {
            0
        };
        if epoch != expected_epoch {
            return Disposition::Ignore("wrong epoch");
        }

        if header.message_seq < expected_seq {
            return Disposition::Ignore("already processed");
        }

        Disposition::Accept
    }

    fn handle_hello_verify(&mut self, epoch: u16, handshake: &Handshake) -> Result<(), Error> {
        if self.state != State::ExpectingServerHello || epoch != 0 {
            debug!("Ignore HelloVerifyRequest in {}", self.state.name());
            return Ok(());
        }

        if handshake.header.is_fragment() {
            debug!("Ignore fragmented HelloVerifyRequest");
            return Ok(());
        }

        let (_, hello_verify) = HelloVerifyRequest::parse(handshake.fragment)?;

        match hello_verify.server_version {
            ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2 => {}
            v => return Err(Error::UnexpectedProtocolVersion(v.as_u16())),
        }

        if hello_verify.cookie.is_empty() {
            debug!("Ignore HelloVerifyRequest without cookie");
            return Ok(());
        }

        if hello_verify.cookie == self.negotiation.cookie {
            trace!("Ignore repeated HelloVerifyRequest");
            return Ok(());
        }

        debug!(
            "HelloVerifyRequest with {} byte cookie",
            hello_verify.cookie.len()
        );

        // The cookie exchange is not part of the transcript.
        self.negotiation.cookie = hello_verify.cookie;
        self.negotiation.transcript.clear();
        self.negotiation.client_random = Some(Random::new(&mut self.rng));
        self.reassembler.clear();

        self.send_client_hello()
    }

    /// Take the next complete message for `state` and add it to the transcript.
    fn next_message(&mut self, state: State) -> Option<Message> {
        let message_seq = state.expected_message_seq()?;
        let message = self.reassembler.take(message_seq)?;

        message.header.serialize(&mut self.negotiation.transcript);
        self.negotiation
            .transcript
            .extend_from_slice(&message.body);

        trace!(
            "Process {:?} ({} bytes)",
            message.header.msg_type,
            message.body.len()
        );

        Some(message)
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    fn send_client_hello(&mut self) -> Result<(), Error> {
        let random = self
            .negotiation
            .client_random
            .ok_or_else(|| Error::CryptoError("No client random".to_string()))?;

        let message_seq = if self.negotiation.cookie.is_empty() {
            message_seq::CLIENT_HELLO
        } else {
            message_seq::CLIENT_HELLO_WITH_COOKIE
        };

        self.flight_begin();

        let mut body = self.buffers_free.pop();
        ClientHello::new(random, self.negotiation.cookie).serialize(&mut body);
        let result = self.create_handshake(MessageType::ClientHello, message_seq, 0, &body);
        self.buffers_free.push(body);

        result
    }

    /// ClientKeyExchange, ChangeCipherSpec and Finished as one flight.
    fn send_client_flight(&mut self) -> Result<(), Error> {
        let master = self
            .negotiation
            .master_secret
            .clone()
            .ok_or_else(|| Error::CryptoError("No master secret".to_string()))?;
        let public = *self
            .negotiation
            .key_pair
            .as_ref()
            .ok_or_else(|| Error::CryptoError("No key pair".to_string()))?
            .public();
        let (client_random, server_random) = self.randoms()?;

        self.flight_begin();

        let mut body = self.buffers_free.pop();
        ClientKeyExchange::new(&public).serialize(&mut body);
        self.create_handshake(
            MessageType::ClientKeyExchange,
            message_seq::CLIENT_KEY_EXCHANGE,
            0,
            &body,
        )?;

        self.create_record(ContentType::ChangeCipherSpec, 0, true, &CHANGE_CIPHER_SPEC)?;

        let protection =
            AeadRecordProtection::new(Side::Client, &master[..], &client_random, &server_random)?;
        self.epochs
            .install_next(Epoch::new(NEGOTIATED_EPOCH, Box::new(protection)));

        let verify_data = prf::verify_data(
            &master[..],
            prf::LABEL_CLIENT_FINISHED,
            &self.negotiation.transcript,
        )?;
        body.clear();
        Finished::new(verify_data).serialize(&mut body);
        self.create_handshake(
            MessageType::Finished,
            message_seq::CLIENT_FINISHED,
            NEGOTIATED_EPOCH,
            &body,
        )?;
        self.buffers_free.push(body);

        // The server's Finished covers ours as well.
        self.negotiation.expected_server_verify = Some(prf::verify_data(
            &master[..],
            prf::LABEL_SERVER_FINISHED,
            &self.negotiation.transcript,
        )?);

        Ok(())
    }

    fn flush_queued_data(&mut self) -> Result<(), Error> {
        while let Some(data) = self.queued_data.pop_front() {
            trace!("Flush {} queued bytes", data.len());
            let result =
                self.create_record(ContentType::ApplicationData, NEGOTIATED_EPOCH, false, &data);
            self.buffers_free.push(data);
            result?;
        }
        Ok(())
    }

    fn flight_begin(&mut self) {
        for entry in self.flight_saved_records.drain(..) {
            self.buffers_free.push(entry.fragment);
        }
        self.flight_timer.begin();
    }

    fn flight_resend(&mut self, reason: &str) -> Result<(), Error> {
        debug!(
            "Resend flight of {} records: {}",
            self.flight_saved_records.len(),
            reason
        );

        let entries = mem::take(&mut self.flight_saved_records);
        let result = entries
            .iter()
            .try_for_each(|e| self.create_record(e.content_type, e.epoch, false, &e.fragment));
        self.flight_saved_records = entries;

        result
    }

    /// Add a handshake message to the transcript and send it, fragmenting
    /// across records when it does not fit the remaining datagram space.
    fn create_handshake(
        &mut self,
        msg_type: MessageType,
        message_seq: u16,
        epoch: u16,
        body: &[u8],
    ) -> Result<(), Error> {
        let total_len = body.len();

        Header::whole(msg_type, message_seq, total_len as u32)
            .serialize(&mut self.negotiation.transcript);
        self.negotiation.transcript.extend_from_slice(body);

        let fixed_overhead = self
            .epochs
            .get_mut(epoch)
            .map(|e| e.record_len(Header::LEN))
            .ok_or_else(|| Error::CryptoError(format!("No keys for epoch {}", epoch)))?;

        let mut fragment = self.buffers_free.pop();
        let mut offset = 0;

        // At least one record, even for an empty body.
        loop {
            let used = self.queue_tx.back().map(|b| b.len()).unwrap_or(0);
            let available = self.config.mtu().saturating_sub(used);

            let available_for_body = if available > fixed_overhead {
                available - fixed_overhead
            } else {
                self.config.mtu().saturating_sub(fixed_overhead)
            };

            let chunk_len = (total_len - offset).min(available_for_body);

            fragment.clear();
            Header {
                msg_type,
                length: total_len as u32,
                message_seq,
                fragment_offset: offset as u32,
                fragment_length: chunk_len as u32,
            }
            .serialize(&mut fragment);
            fragment.extend_from_slice(&body[offset..offset + chunk_len]);

            if let Err(e) = self.create_record(ContentType::Handshake, epoch, true, &fragment) {
                self.buffers_free.push(fragment);
                return Err(e);
            }

            offset += chunk_len;
            if offset >= total_len {
                break;
            }
        }

        self.buffers_free.push(fragment);
        Ok(())
    }

    /// Seal one record, packing it into the last queued datagram when it fits.
    fn create_record(
        &mut self,
        content_type: ContentType,
        epoch: u16,
        save_fragment: bool,
        fragment: &[u8],
    ) -> Result<(), Error> {
        if save_fragment {
            let mut clone = self.buffers_free.pop();
            clone.extend_from_slice(fragment);
            self.flight_saved_records.push(Entry {
                content_type,
                epoch,
                fragment: clone,
            });
        }

        let Some(sealer) = self.epochs.get_mut(epoch) else {
            return Err(Error::CryptoError(format!("No keys for epoch {}", epoch)));
        };

        let record_len = sealer.record_len(fragment.len());
        let mtu = self.config.mtu();

        let can_append = self
            .queue_tx
            .back()
            .map(|b| b.len() + record_len <= mtu)
            .unwrap_or(false);

        if !can_append && self.queue_tx.len() >= self.config.max_queue_tx() {
            warn!(
                "Transmit queue full (max {}): {:?}",
                self.config.max_queue_tx(),
                self.queue_tx
            );
            return Err(Error::TransmitQueueFull);
        }

        if can_append {
            if let Some(datagram) = self.queue_tx.back_mut() {
                sealer.seal(content_type, fragment, datagram)?;
            }
        } else {
            let mut datagram = self.buffers_free.pop();
            sealer.seal(content_type, fragment, &mut datagram)?;
            self.queue_tx.push_back(datagram);
        }

        Ok(())
    }

    fn randoms(&self) -> Result<([u8; 32], [u8; 32]), Error> {
        match (self.negotiation.client_random, self.negotiation.server_random) {
            (Some(c), Some(s)) => Ok((c.to_bytes(), s.to_bytes())),
            _ => Err(Error::CryptoError("Hello randoms not exchanged".to_string())),
        }
    }
}

/// Server handshake message expected at each `message_seq`.
fn server_message_type(message_seq: u16) -> Option<MessageType> {
    Some(match message_seq {
        message_seq::SERVER_HELLO => MessageType::ServerHello,
        message_seq::CERTIFICATE => MessageType::Certificate,
        message_seq::SERVER_KEY_EXCHANGE => MessageType::ServerKeyExchange,
        message_seq::SERVER_HELLO_DONE => MessageType::ServerHelloDone,
        message_seq::SERVER_FINISHED => MessageType::Finished,
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initializing,
    ExpectingServerHello,
    ExpectingCertificate,
    ExpectingServerKeyExchange,
    ExpectingServerHelloDone,
    ExpectingChangeCipherSpec,
    ExpectingFinished,
    Established,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Initializing => "Initializing",
            State::ExpectingServerHello => "ExpectingServerHello",
            State::ExpectingCertificate => "ExpectingCertificate",
            State::ExpectingServerKeyExchange => "ExpectingServerKeyExchange",
            State::ExpectingServerHelloDone => "ExpectingServerHelloDone",
            State::ExpectingChangeCipherSpec => "ExpectingChangeCipherSpec",
            State::ExpectingFinished => "ExpectingFinished",
            State::Established => "Established",
        }
    }

    /// `message_seq` of the next server handshake message.
    fn expected_message_seq(&self) -> Option<u16> {
        match self {
            State::Initializing | State::Established => None,
            State::ExpectingServerHello => Some(message_seq::SERVER_HELLO),
            State::ExpectingCertificate => Some(message_seq::CERTIFICATE),
            State::ExpectingServerKeyExchange => Some(message_seq::SERVER_KEY_EXCHANGE),
            State::ExpectingServerHelloDone => Some(message_seq::SERVER_HELLO_DONE),
            State::ExpectingChangeCipherSpec | State::ExpectingFinished => {
                Some(message_seq::SERVER_FINISHED)
            }
        }
    }

    fn awaits_server_finish(&self) -> bool {
        matches!(
            self,
            State::ExpectingChangeCipherSpec | State::ExpectingFinished
        )
    }

    fn make_progress(self, client: &mut Client) -> Result<Self, Error> {
        match self {
            State::Initializing => self.initializing(client),
            State::ExpectingServerHello => self.expecting_server_hello(client),
            State::ExpectingCertificate => self.expecting_certificate(client),
            State::ExpectingServerKeyExchange => self.expecting_server_key_exchange(client),
            State::ExpectingServerHelloDone => self.expecting_server_hello_done(client),
            State::ExpectingChangeCipherSpec => self.expecting_change_cipher_spec(client),
            State::ExpectingFinished => self.expecting_finished(client),
            State::Established => Ok(self),
        }
    }

    fn initializing(self, client: &mut Client) -> Result<Self, Error> {
        // The random is drawn by the first handle_timeout.
        if client.negotiation.client_random.is_none() {
            return Ok(self);
        }

        client.send_client_hello()?;
        Ok(State::ExpectingServerHello)
    }

    fn expecting_server_hello(self, client: &mut Client) -> Result<Self, Error> {
        let Some(message) = client.next_message(self) else {
            return Ok(self);
        };

        let (_, server_hello) = ServerHello::parse(&message.body)?;

        if server_hello.server_version != ProtocolVersion::DTLS1_2 {
            return Err(Error::UnexpectedProtocolVersion(
                server_hello.server_version.as_u16(),
            ));
        }

        if server_hello.cipher_suite != CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 {
            return Err(Error::UnsupportedCipherSuite(
                server_hello.cipher_suite.as_u16(),
            ));
        }

        if server_hello.compression_method != CompressionMethod::Null {
            return Err(Error::UnsupportedCompression(
                server_hello.compression_method.as_u8(),
            ));
        }

        for extension in server_hello.parsed_extensions()? {
            match extension.extension_type {
                ExtensionType::SupportedGroups
                | ExtensionType::EcPointFormats
                | ExtensionType::RenegotiationInfo => {}
                other => debug!("Ignore ServerHello extension {:?}", other),
            }
        }

        client.negotiation.server_random = Some(server_hello.random);
        client.buffers_free.push(message.body);

        Ok(State::ExpectingCertificate)
    }

    fn expecting_certificate(self, client: &mut Client) -> Result<Self, Error> {
        let Some(message) = client.next_message(self) else {
            return Ok(self);
        };

        let server_key = {
            let (_, certificate) = Certificate::parse(&message.body)?;
            let leaf = certificate
                .leaf()
                .ok_or_else(|| Error::CertificateError("Empty certificate chain".to_string()))?;
            ServerPublicKey::from_certificate(leaf)?
        };

        client.negotiation.server_key = Some(server_key);
        client.buffers_free.push(message.body);

        Ok(State::ExpectingServerKeyExchange)
    }

    fn expecting_server_key_exchange(self, client: &mut Client) -> Result<Self, Error> {
        let Some(message) = client.next_message(self) else {
            return Ok(self);
        };

        let (_, ske) = ServerKeyExchange::parse(&message.body)?;

        if ske.curve_type != CURVE_TYPE_NAMED_CURVE {
            return Err(Error::ParseError(format!(
                "Unsupported ECCurveType {}",
                ske.curve_type
            )));
        }

        if ske.named_curve != NamedCurve::X25519 {
            return Err(Error::UnsupportedCurve(ske.named_curve.as_u16()));
        }

        let (client_random, server_random) = client.randoms()?;

        let server_key = client
            .negotiation
            .server_key
            .as_ref()
            .ok_or_else(|| Error::CertificateError("No server certificate".to_string()))?;
        let signed = ske.signed_content(&client_random, &server_random);

        if let Err(e) = server_key.verify(ske.signature_algorithm, &signed, ske.signature) {
            if client.config.verify_server_signature() {
                return Err(e);
            }
            warn!("Continue despite ServerKeyExchange signature failure: {}", e);
        }

        let key_pair = KeyPair::generate(&mut client.rng);
        let shared = key_pair.agree(ske.public).ok_or_else(|| {
            Error::ParseError(format!("Bad X25519 public value length {}", ske.public.len()))
        })?;

        let master = prf::master_secret(&shared[..], &client_random, &server_random)?;

        client.negotiation.key_pair = Some(key_pair);
        client.negotiation.master_secret = Some(master);
        client.buffers_free.push(message.body);

        Ok(State::ExpectingServerHelloDone)
    }

    fn expecting_server_hello_done(self, client: &mut Client) -> Result<Self, Error> {
        let Some(message) = client.next_message(self) else {
            return Ok(self);
        };

        if !message.body.is_empty() {
            return Err(Error::ParseError(format!(
                "ServerHelloDone with {} byte body",
                message.body.len()
            )));
        }
        client.buffers_free.push(message.body);

        client.send_client_flight()?;

        Ok(State::ExpectingChangeCipherSpec)
    }

    fn expecting_change_cipher_spec(self, client: &mut Client) -> Result<Self, Error> {
        if !client.negotiation.peer_change_cipher_spec {
            return Ok(self);
        }

        client.epochs.peer_switched();

        Ok(State::ExpectingFinished)
    }

    fn expecting_finished(self, client: &mut Client) -> Result<Self, Error> {
        let Some(message) = client.next_message(self) else {
            return Ok(self);
        };

        let (_, finished) = Finished::parse(&message.body)?;
        client.buffers_free.push(message.body);

        let expected = client
            .negotiation
            .expected_server_verify
            .ok_or_else(|| Error::CryptoError("No expected verify data".to_string()))?;

        if !bool::from(finished.verify_data.ct_eq(&expected)) {
            return Err(Error::FinishedMismatch);
        }

        client.epochs.promote();
        client.flight_timer.stop();
        client.handshake_deadline = None;
        for entry in client.flight_saved_records.drain(..) {
            client.buffers_free.push(entry.fragment);
        }

        client.local_events.push_back(LocalEvent::Connected);
        client.flush_queued_data()?;

        Ok(State::Established)
    }
}

#[derive(Debug)]
enum LocalEvent {
    Connected,
}

impl LocalEvent {
    fn into_output<'a>(self) -> Output<'a> {
        match self {
            LocalEvent::Connected => Output::Connected,
        }
    }
}
