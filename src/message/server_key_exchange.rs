use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::NamedCurve;
use crate::buffer::Buf;

/// ECCurveType `named_curve`.
pub const CURVE_TYPE_NAMED_CURVE: u8 = 3;

/// ECDHE ServerKeyExchange with a signature over the parameters.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerKeyExchange<'a> {
    pub curve_type: u8,
    pub named_curve: NamedCurve,
    pub public: &'a [u8],
    /// Raw `ServerECDHParams` bytes, curve type through public point.
    pub params: &'a [u8],
    /// SignatureAndHashAlgorithm as one `u16`, hash in the high byte.
    pub signature_algorithm: u16,
    pub signature: &'a [u8],
}

impl<'a> ServerKeyExchange<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        let start = input;
        let (input, curve_type) = be_u8(input)?;
        let (input, named_curve) = NamedCurve::parse(input)?;
        let (input, public_len) = be_u8(input)?;
        let (input, public) = take(public_len)(input)?;
        let params = &start[..start.len() - input.len()];

        let (input, signature_algorithm) = be_u16(input)?;
        let (input, signature_len) = be_u16(input)?;
        let (input, signature) = take(signature_len)(input)?;

        Ok((
            input,
            ServerKeyExchange {
                curve_type,
                named_curve,
                public,
                params,
                signature_algorithm,
                signature,
            },
        ))
    }

    /// Write `ServerECDHParams` for a named curve.
    pub fn serialize_params(named_curve: NamedCurve, public: &[u8], output: &mut Buf) {
        output.push(CURVE_TYPE_NAMED_CURVE);
        output.extend_from_slice(&named_curve.as_u16().to_be_bytes());
        output.push(public.len() as u8);
        output.extend_from_slice(public);
    }

    /// Bytes covered by the server's signature.
    pub fn signed_content(&self, client_random: &[u8; 32], server_random: &[u8; 32]) -> Buf {
        let mut out = Buf::new();
        out.extend_from_slice(client_random);
        out.extend_from_slice(server_random);
        out.extend_from_slice(self.params);
        out
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(self.params);
        output.extend_from_slice(&self.signature_algorithm.to_be_bytes());
        output.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        output.extend_from_slice(self.signature);
    }
}
