use std::io;

use thiserror::Error;

/// Errors surfaced by the DTLS client.
///
/// Any error returned from [`Client::handle_packet`](crate::Client::handle_packet) or
/// [`Client::handle_timeout`](crate::Client::handle_timeout) is fatal for the current
/// connection attempt. The client must be restarted before it accepts further input.
#[derive(Debug, Error)]
pub enum Error {
    /// More bytes were needed to parse a message.
    #[error("Parse incomplete")]
    ParseIncomplete,

    /// A handshake message could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The server spoke a protocol version other than DTLS 1.2.
    #[error("Unexpected protocol version: {0:#06x}")]
    UnexpectedProtocolVersion(u16),

    /// The server selected a cipher suite we did not offer.
    #[error("Unsupported cipher suite: {0:#06x}")]
    UnsupportedCipherSuite(u16),

    /// The server selected a compression method other than null.
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u8),

    /// The server key exchange used a curve other than X25519.
    #[error("Unsupported curve: {0}")]
    UnsupportedCurve(u16),

    /// A hello extension block was malformed.
    #[error("Malformed extension: {0}")]
    MalformedExtension(&'static str),

    /// AEAD tag verification of an inbound record failed.
    #[error("Record authentication failed")]
    AuthenticationFailed,

    /// The server's Finished verify data did not match the transcript.
    #[error("Server Finished verify data mismatch")]
    FinishedMismatch,

    /// The ServerKeyExchange signature did not verify against the certificate key.
    #[error("Bad ServerKeyExchange signature: {0}")]
    BadServerSignature(String),

    /// The server certificate could not be used.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// A cryptographic primitive failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// The peer sent a fatal alert.
    #[error("Peer sent fatal alert: {0}")]
    PeerAlert(u8),

    /// Too much application data queued while the handshake is pending.
    #[error("Application data queue full")]
    ApplicationQueueFull,

    /// Too many outgoing datagrams are waiting for `poll_output`.
    #[error("Transmit queue full")]
    TransmitQueueFull,

    /// Application data larger than a single record can carry.
    #[error("Application data too large: {0} bytes")]
    ApplicationDataTooLarge(usize),

    /// A protected record carried more than 16384 bytes of plaintext.
    #[error("Record overflow: {0} bytes of plaintext")]
    RecordOverflow(usize),

    /// The connection attempt was aborted by an earlier error.
    #[error("Connection closed, restart required")]
    Closed,

    /// The caller-level handshake timeout expired.
    #[error("Timeout: {0}")]
    Timeout(&'static str),

    /// The configuration is invalid.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// The datagram transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Error::ParseError(format!("{:?} at {} remaining bytes", e.code, e.input.len()))
            }
        }
    }
}
