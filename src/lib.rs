//! dtls-auth
//!
//! A DTLS 1.2 client for a single, fixed handshake profile:
//! `TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256` over X25519.
//!
//! The key agreement and the AEAD are implemented in this crate on top of
//! the AES block cipher. Hashing, HMAC, certificate parsing and RSA signature
//! verification come from RustCrypto.
//!
//! The protocol core is [`Client`], a sans-IO state machine: the caller feeds
//! datagrams and time, and polls for output. [`DtlsSocket`] drives a client
//! over a UDP socket (or any [`Datagram`] transport).
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dtls_auth::{Config, DtlsSocket, Event};
//!
//! # fn main() -> Result<(), dtls_auth::Error> {
//! let config = Arc::new(Config::default());
//! let mut socket = DtlsSocket::connect("auth.example.net", 4433, config)?;
//!
//! // Queued until the handshake completes.
//! socket.send(b"hello")?;
//!
//! while let Some(event) = socket.poll_event(Duration::from_secs(5))? {
//!     match event {
//!         Event::Ready => println!("connected"),
//!         Event::Message(data) => println!("{} bytes", data.len()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

use std::time::Instant;

mod buffer;
mod client;
mod config;
pub mod crypto;
mod epoch;
mod error;
pub mod message;
mod queue;
mod reassembly;
mod rng;
mod socket;
mod timer;
mod window;

pub use buffer::Buf;
pub use client::Client;
pub use config::{Config, ConfigBuilder};
pub use error::Error;
pub use rng::SeededRng;
pub use socket::{Datagram, DtlsSocket, Event};

/// Output from [`Client::poll_output`].
#[derive(Debug)]
pub enum Output<'a> {
    /// A datagram to send to the server.
    Packet(&'a [u8]),
    /// The next time [`Client::handle_timeout`] should be called.
    ///
    /// Returned once nothing else is pending.
    Timeout(Instant),
    /// The handshake completed.
    Connected,
    /// Decrypted application data from the server.
    ApplicationData(&'a [u8]),
}
