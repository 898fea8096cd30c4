use arrayvec::ArrayVec;
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{CipherSuite, CompressionMethod, ProtocolVersion};
use super::{Cookie, Extension, ExtensionType, Random, SessionId};
use crate::buffer::Buf;

/// supported_groups payload advertising x25519 alone.
const SUPPORTED_GROUPS_X25519: &[u8] = &[0x00, 0x02, 0x00, 0x1D];

#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Cookie,
    pub cipher_suites: ArrayVec<CipherSuite, 32>,
    pub compression_methods: ArrayVec<CompressionMethod, 4>,
    pub extensions: ArrayVec<Extension<'a>, 16>,
}

impl ClientHello<'static> {
    /// The one hello we send: DTLS 1.2, no session, one suite, null
    /// compression and the supported-groups extension.
    pub fn new(random: Random, cookie: Cookie) -> Self {
        let mut cipher_suites = ArrayVec::new();
        cipher_suites.push(CipherSuite::ECDHE_RSA_AES128_GCM_SHA256);

        let mut compression_methods = ArrayVec::new();
        compression_methods.push(CompressionMethod::Null);

        let mut extensions = ArrayVec::new();
        extensions.push(Extension::new(
            ExtensionType::SupportedGroups,
            SUPPORTED_GROUPS_X25519,
        ));

        ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random,
            session_id: SessionId::empty(),
            cookie,
            cipher_suites,
            compression_methods,
            extensions,
        }
    }
}

impl<'a> ClientHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        let (input, mut suites_input) = take(cipher_suites_len)(input)?;
        let mut cipher_suites = ArrayVec::new();
        while !suites_input.is_empty() {
            let (rest, suite) = CipherSuite::parse(suites_input)?;
            // Offers beyond capacity are ignored.
            let _ = cipher_suites.try_push(suite);
            suites_input = rest;
        }

        let (input, compression_methods_len) = be_u8(input)?;
        let (input, compression_input) = take(compression_methods_len)(input)?;
        let mut compression_methods = ArrayVec::new();
        for byte in compression_input {
            let _ = compression_methods.try_push(CompressionMethod::from_u8(*byte));
        }

        if cipher_suites.is_empty() || compression_methods.is_empty() {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        let (input, extensions) = if input.is_empty() {
            (input, ArrayVec::new())
        } else {
            let (input, extensions_len) = be_u16(input)?;
            let (input, block) = take(extensions_len)(input)?;
            let extensions = Extension::parse_block(block)
                .map_err(|_| Err::Failure(Error::new(block, ErrorKind::LengthValue)))?;
            (input, extensions)
        };

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cookie.serialize(output);

        output.extend_from_slice(&((self.cipher_suites.len() * 2) as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            suite.serialize(output);
        }

        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }

        if !self.extensions.is_empty() {
            let extensions_len: usize = self
                .extensions
                .iter()
                .map(|e| 4 + e.extension_data.len())
                .sum();
            output.extend_from_slice(&(extensions_len as u16).to_be_bytes());
            for extension in &self.extensions {
                extension.serialize(output);
            }
        }
    }
}
