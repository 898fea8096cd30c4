use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::ProtocolVersion;
use crate::buffer::Buf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Epoch and 48-bit record sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Sequence {
    pub epoch: u16,
    /// Only the low 48 bits go on the wire.
    pub sequence_number: u64,
}

impl Sequence {
    pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 48) - 1;

    pub fn new(epoch: u16, sequence_number: u64) -> Self {
        Sequence {
            epoch,
            sequence_number,
        }
    }

    /// `epoch(2) || sequence_number(6)`, as used for the explicit nonce and AAD.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = self.sequence_number.to_be_bytes();
        out[..2].copy_from_slice(&self.epoch.to_be_bytes());
        out
    }
}

fn be_u48(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, bytes) = take(6_usize)(input)?;
    let mut value = [0u8; 8];
    value[2..].copy_from_slice(bytes);
    Ok((input, u64::from_be_bytes(value)))
}

/// The 13-byte record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub sequence: Sequence,
    pub length: u16,
}

impl RecordHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                sequence: Sequence::new(epoch, sequence_number),
                length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.extend_from_slice(&self.sequence.to_bytes());
        output.extend_from_slice(&self.length.to_be_bytes());
    }
}

/// A record as found on the wire, borrowing its fragment from the datagram.
#[derive(Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub header: RecordHeader,
    pub fragment: &'a [u8],
}

impl<'a> Record<'a> {
    pub const HEADER_LEN: usize = 13;

    /// Parse one record.
    ///
    /// Only DTLS 1.0 and 1.2 record versions are accepted. Servers commonly
    /// stamp their first flight with 1.0.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Record<'a>> {
        let (rest, header) = RecordHeader::parse(input)?;
        if matches!(header.version, ProtocolVersion::Unknown(_)) {
            return Err(Err::Failure(Error::new(input, ErrorKind::Verify)));
        }
        let (rest, fragment) = take(header.length as usize)(rest)?;
        Ok((rest, Record { header, fragment }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.header.serialize(output);
        output.extend_from_slice(self.fragment);
    }
}
