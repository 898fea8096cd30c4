//! Wire formats for the DTLS 1.2 records and handshake messages we speak.
//!
//! Every message has a nom `parse` borrowing from the datagram and a
//! `serialize` writing into a [`Buf`](crate::buffer::Buf). Parsers only check
//! framing. Semantic checks (versions, suites, curves) happen in the client.

mod alert;
mod certificate;
mod client_hello;
mod client_key_exchange;
mod extension;
mod finished;
mod handshake;
mod hello_verify;
mod id;
mod random;
mod record;
mod server_hello;
mod server_key_exchange;

pub use alert::{Alert, AlertLevel};
pub use certificate::Certificate;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use extension::{Extension, ExtensionType, NamedCurve, SupportedGroups};
pub use finished::Finished;
pub use handshake::{Handshake, Header, MessageType};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, SessionId};
pub use random::Random;
pub use record::{ContentType, Record, RecordHeader, Sequence};
pub use server_hello::ServerHello;
pub use server_key_exchange::{ServerKeyExchange, CURVE_TYPE_NAMED_CURVE};

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;

/// Explicit nonce carried in front of every AEAD record fragment.
pub const EXPLICIT_NONCE_LEN: usize = 8;

/// GCM tag appended to every AEAD record fragment.
pub const TAG_LEN: usize = 16;

/// Per-record expansion of an AEAD-protected fragment.
pub const AEAD_OVERHEAD: usize = EXPLICIT_NONCE_LEN + TAG_LEN;

/// Largest plaintext carried by a single record.
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Largest protected record on the wire: header, AEAD overhead and a full
/// plaintext. `13 + 24 + 16384`.
pub const MAX_RECORD_LEN: usize = Record::HEADER_LEN + AEAD_OVERHEAD + MAX_PLAINTEXT_LEN;

/// Body of a ChangeCipherSpec record.
pub const CHANGE_CIPHER_SPEC: [u8; 1] = [1];

/// `rsa_pkcs1_sha256`: hash sha256(4), signature rsa(1).
pub const SIGNATURE_RSA_PKCS1_SHA256: u16 = 0x0401;

/// Handshake message sequence numbers of the fixed client flow.
///
/// One counter runs through the whole conversation. The cookie-bearing
/// ClientHello takes sequence 1, same as the ServerHello answering it.
pub mod message_seq {
    pub const CLIENT_HELLO: u16 = 0;
    pub const CLIENT_HELLO_WITH_COOKIE: u16 = 1;
    pub const SERVER_HELLO: u16 = 1;
    pub const CERTIFICATE: u16 = 2;
    pub const SERVER_KEY_EXCHANGE: u16 = 3;
    pub const SERVER_HELLO_DONE: u16 = 4;
    pub const CLIENT_KEY_EXCHANGE: u16 = 5;
    pub const CLIENT_FINISHED: u16 = 6;
    pub const SERVER_FINISHED: u16 = 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    DTLS1_0,
    DTLS1_2,
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, Self::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    ECDHE_RSA_AES128_GCM_SHA256,
    Unknown(u16),
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xC02F => CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
            _ => CipherSuite::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 => 0xC02F,
            CipherSuite::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Unknown(u8),
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Unknown(0xff)
    }
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}
