use arrayvec::ArrayVec;
use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::Error;

/// Upper bound on extensions accepted in one hello.
const MAX_EXTENSIONS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension<'a> {
    pub extension_type: ExtensionType,
    pub extension_data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn new(extension_type: ExtensionType, extension_data: &'a [u8]) -> Self {
        Extension {
            extension_type,
            extension_data,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, extension_data) = take(extension_length)(input)?;

        Ok((
            input,
            Extension {
                extension_type,
                extension_data,
            },
        ))
    }

    /// Parse the contents of an extensions block (after its `u16` length).
    ///
    /// The entries must exactly fill `block`.
    pub fn parse_block(mut block: &'a [u8]) -> Result<ArrayVec<Extension<'a>, MAX_EXTENSIONS>, Error> {
        let mut extensions = ArrayVec::new();
        while !block.is_empty() {
            let (rest, extension) = Extension::parse(block)
                .map_err(|_| Error::MalformedExtension("truncated extension"))?;
            extensions
                .try_push(extension)
                .map_err(|_| Error::MalformedExtension("too many extensions"))?;
            block = rest;
        }
        Ok(extensions)
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.extension_type.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.extension_data.len() as u16).to_be_bytes());
        output.extend_from_slice(self.extension_data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    /// `elliptic_curves`, renamed `supported_groups` in later RFCs.
    SupportedGroups,
    EcPointFormats,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x000A => ExtensionType::SupportedGroups,
            0x000B => ExtensionType::EcPointFormats,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }
}

/// Named elliptic curve (RFC 8422). We only implement X25519.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    X25519,
    Unknown(u16),
}

impl NamedCurve {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x001D => NamedCurve::X25519,
            _ => NamedCurve::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedCurve::X25519 => 0x001D,
            NamedCurve::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedCurve> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedCurve::from_u16(value)))
    }
}

/// Body of the supported-groups extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedGroups {
    pub curves: ArrayVec<NamedCurve, 16>,
}

impl Default for SupportedGroups {
    /// Advertises X25519 only.
    fn default() -> Self {
        let mut curves = ArrayVec::new();
        curves.push(NamedCurve::X25519);
        SupportedGroups { curves }
    }
}

impl SupportedGroups {
    pub fn parse(input: &[u8]) -> IResult<&[u8], SupportedGroups> {
        let (input, list_len) = be_u16(input)?;
        let (input, mut list) = take(list_len as usize)(input)?;

        let mut curves = ArrayVec::new();
        while list.len() >= 2 {
            let (rest, curve) = NamedCurve::parse(list)?;
            list = rest;
            // Entries past our capacity are of no interest.
            let _ = curves.try_push(curve);
        }

        Ok((input, SupportedGroups { curves }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&((self.curves.len() * 2) as u16).to_be_bytes());
        for curve in &self.curves {
            output.extend_from_slice(&curve.as_u16().to_be_bytes());
        }
    }
}
