//! Blocking datagram driver around the sans-IO [`Client`].
//!
//! [`DtlsSocket`] pumps datagrams between a [`Datagram`] transport and the
//! client, and turns client output into [`Event`]s. It owns no threads. The
//! caller drives it by calling [`DtlsSocket::poll_event`] in a loop.

use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::message::MAX_RECORD_LEN;
use crate::{Client, Config, Error, Output};

/// Largest datagram we accept from the transport.
const RECV_BUF_LEN: usize = 65_535;

/// A connected, message-oriented transport.
pub trait Datagram {
    /// Send one datagram.
    fn send(&self, datagram: &[u8]) -> io::Result<usize>;

    /// Receive one datagram, waiting at most `timeout`.
    ///
    /// `Ok(None)` when nothing arrived in time.
    fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;
}

impl Datagram for UdpSocket {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, datagram)
    }

    fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        // A zero read timeout is rejected by the OS.
        self.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;

        match self.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) => match e.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Ok(None),
                // ICMP port unreachable from an earlier send. The flight is resent anyway.
                io::ErrorKind::ConnectionRefused => {
                    debug!("Peer unreachable: {}", e);
                    Ok(None)
                }
                _ => Err(e),
            },
        }
    }
}

/// Something the application should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The handshake completed. Fired once per connection attempt.
    Ready,
    /// Decrypted application data.
    Message(Vec<u8>),
}

/// A DTLS client bound to a datagram transport.
pub struct DtlsSocket<T: Datagram = UdpSocket> {
    transport: T,
    client: Client,
    out_buf: Vec<u8>,
    recv_buf: Vec<u8>,
    events: VecDeque<Event>,
}

impl DtlsSocket<UdpSocket> {
    /// Resolve `host`, connect a UDP socket to it and send the ClientHello.
    pub fn connect(host: &str, port: u16, config: Arc<Config>) -> Result<Self, Error> {
        let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No address for {}:{}", host, port),
            )
        })?;

        let local: SocketAddr = match addr {
            SocketAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
            SocketAddr::V6(_) => ([0u16; 8], 0).into(),
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(addr)?;
        debug!("UDP socket {} connected to {}", socket.local_addr()?, addr);

        Self::new(socket, config)
    }
}

impl<T: Datagram> DtlsSocket<T> {
    /// Start a handshake over an already connected transport.
    pub fn new(transport: T, config: Arc<Config>) -> Result<Self, Error> {
        let out_len = config.mtu().max(MAX_RECORD_LEN);

        let mut socket = DtlsSocket {
            transport,
            client: Client::new(config),
            out_buf: vec![0; out_len],
            recv_buf: vec![0; RECV_BUF_LEN],
            events: VecDeque::new(),
        };

        socket.client.handle_timeout(Instant::now())?;
        socket.flush()?;

        Ok(socket)
    }

    /// Whether the handshake has completed.
    pub fn is_ready(&self) -> bool {
        self.client.is_connected()
    }

    /// Send application data, or queue it until the handshake completes.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.client.send_application_data(data)?;
        self.flush()?;
        Ok(())
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Retransmissions happen while waiting. Any error is fatal for the
    /// current attempt. Use [`DtlsSocket::restart_connection`] to try again.
    pub fn poll_event(&mut self, timeout: Duration) -> Result<Option<Event>, Error> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(event) = self.events.pop_front() {
                return Ok(Some(event));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let next_timeout = self.flush()?;
            let wait = next_timeout.min(deadline).saturating_duration_since(now);

            if let Some(n) = self.transport.recv_timeout(&mut self.recv_buf, wait)? {
                self.client.handle_packet(&self.recv_buf[..n])?;
            }

            self.client.handle_timeout(Instant::now())?;
            self.flush()?;
        }
    }

    /// Discard the current session and handshake again over the same transport.
    pub fn restart_connection(&mut self) -> Result<(), Error> {
        self.events.clear();
        self.client.restart(Instant::now())?;
        self.flush()?;
        Ok(())
    }

    /// Send every pending datagram and collect events.
    ///
    /// Returns when the client next wants a timeout.
    fn flush(&mut self) -> Result<Instant, Error> {
        loop {
            match self.client.poll_output(&mut self.out_buf) {
                Output::Packet(p) => {
                    self.transport.send(p)?;
                }
                Output::Connected => self.events.push_back(Event::Ready),
                Output::ApplicationData(data) => {
                    self.events.push_back(Event::Message(data.to_vec()))
                }
                Output::Timeout(t) => return Ok(t),
            }
        }
    }
}
