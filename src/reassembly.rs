//! Reassembly of fragmented inbound handshake messages.
//!
//! Each message gets a buffer sized to its declared total length. Fragments
//! are copied in at their offset and the covered `{offset, len}` ranges are
//! kept sorted. A message is ready once the ranges tile `[0, length)` exactly.
//! A fragment that partly overlaps one already held is rejected, so the held
//! ranges never overlap and a clean resend can still complete the message.

use std::collections::BTreeMap;

use crate::buffer::Buf;
use crate::message::{Header, MessageType};

/// Largest handshake message we are willing to buffer.
const MAX_MESSAGE_LEN: u32 = 1 << 17;

/// How many distinct future messages may be pending at once.
const MAX_PENDING: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Range {
    offset: u32,
    len: u32,
}

impl Range {
    fn end(&self) -> u32 {
        self.offset + self.len
    }

    fn overlaps(&self, other: &Range) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// A complete handshake message.
#[derive(Debug)]
pub struct Message {
    /// Header normalised to a single unfragmented message.
    pub header: Header,
    pub body: Buf,
}

/// Result of feeding one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Accepted,
    Duplicate,
    Rejected(&'static str),
}

#[derive(Debug)]
struct Partial {
    msg_type: MessageType,
    length: u32,
    buffer: Buf,
    ranges: Vec<Range>,
}

impl Partial {
    fn new(header: &Header) -> Self {
        let mut buffer = Buf::new();
        buffer.resize(header.length as usize, 0);
        Partial {
            msg_type: header.msg_type,
            length: header.length,
            buffer,
            ranges: Vec::new(),
        }
    }

    fn insert(&mut self, header: &Header, fragment: &[u8]) -> Insert {
        if header.msg_type != self.msg_type || header.length != self.length {
            return Insert::Rejected("fragment disagrees with earlier fragments");
        }

        let range = Range {
            offset: header.fragment_offset,
            len: header.fragment_length,
        };
        let start = range.offset as usize;
        let end = start + range.len as usize;
        if end > self.buffer.len() || fragment.len() != range.len as usize {
            return Insert::Rejected("fragment out of range");
        }

        // Empty fragments add nothing to a non-empty message.
        if range.len == 0 && self.length > 0 {
            return Insert::Duplicate;
        }

        match self.ranges.binary_search(&range) {
            Ok(_) => Insert::Duplicate,
            Err(_) if self.ranges.iter().any(|r| r.overlaps(&range)) => {
                Insert::Rejected("fragment overlaps an earlier fragment")
            }
            Err(index) => {
                self.buffer[start..end].copy_from_slice(fragment);
                self.ranges.insert(index, range);
                Insert::Accepted
            }
        }
    }

    fn is_complete(&self) -> bool {
        if self.ranges.is_empty() {
            return false;
        }

        let mut covered = 0;
        for range in &self.ranges {
            if range.offset != covered {
                return false;
            }
            covered += range.len;
        }

        covered == self.length
    }
}

/// Pending inbound handshake messages keyed by `message_seq`.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: BTreeMap<u16, Partial>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment.
    ///
    /// The fragment bounds are assumed to lie within the declared length,
    /// which [`Handshake::parse`](crate::message::Handshake::parse) ensures.
    pub fn insert(&mut self, header: &Header, fragment: &[u8]) -> Insert {
        if header.length > MAX_MESSAGE_LEN {
            return Insert::Rejected("message too large");
        }

        if !self.pending.contains_key(&header.message_seq) && self.pending.len() >= MAX_PENDING {
            return Insert::Rejected("too many pending messages");
        }

        self.pending
            .entry(header.message_seq)
            .or_insert_with(|| Partial::new(header))
            .insert(header, fragment)
    }

    /// Take the message with `message_seq` if all its bytes have arrived.
    ///
    /// Anything pending below `message_seq` is stale and dropped.
    pub fn take(&mut self, message_seq: u16) -> Option<Message> {
        self.pending = self.pending.split_off(&message_seq);

        if !self.pending.get(&message_seq)?.is_complete() {
            return None;
        }

        let partial = self.pending.remove(&message_seq)?;
        Some(Message {
            header: Header::whole(partial.msg_type, message_seq, partial.length),
            body: partial.buffer,
        })
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
