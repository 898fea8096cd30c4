use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;

/// ECDHE ClientKeyExchange: the client's ephemeral public point.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientKeyExchange<'a> {
    pub public: &'a [u8],
}

impl<'a> ClientKeyExchange<'a> {
    pub fn new(public: &'a [u8]) -> Self {
        ClientKeyExchange { public }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        let (input, len) = be_u8(input)?;
        let (input, public) = take(len)(input)?;
        Ok((input, ClientKeyExchange { public }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.public.len() as u8);
        output.extend_from_slice(self.public);
    }
}
