use arrayvec::ArrayVec;
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u24;
use nom::{Err, IResult};

use crate::buffer::Buf;

/// Longest chain we accept.
const MAX_CHAIN: usize = 16;

/// Certificate message: a 24-bit length-prefixed list of 24-bit
/// length-prefixed DER certificates, leaf first.
#[derive(Debug, PartialEq, Eq)]
pub struct Certificate<'a> {
    pub certificate_list: ArrayVec<&'a [u8], MAX_CHAIN>,
}

impl<'a> Certificate<'a> {
    pub fn new(certificate_list: ArrayVec<&'a [u8], MAX_CHAIN>) -> Self {
        Certificate { certificate_list }
    }

    /// The server's own certificate.
    pub fn leaf(&self) -> Option<&'a [u8]> {
        self.certificate_list.first().copied()
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, total_len) = be_u24(input)?;
        let (input, mut list) = take(total_len as usize)(input)?;

        let mut certificate_list = ArrayVec::new();
        while !list.is_empty() {
            let (rest, cert_len) = be_u24(list)?;
            let (rest, cert) = take(cert_len as usize)(rest)?;
            if certificate_list.try_push(cert).is_err() {
                return Err(Err::Failure(Error::new(list, ErrorKind::TooLarge)));
            }
            list = rest;
        }

        Ok((input, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        let total: usize = self.certificate_list.iter().map(|c| 3 + c.len()).sum();
        output.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
        for cert in &self.certificate_list {
            output.extend_from_slice(&(cert.len() as u32).to_be_bytes()[1..]);
            output.extend_from_slice(cert);
        }
    }
}
