//! Per-epoch record state and the current/next epoch pair.
//!
//! An [`Epoch`] owns its protection, its outgoing sequence counter and its
//! replay window. [`Epochs`] is replaced wholesale on every transition:
//! plaintext epoch 0 only, then epoch 0 alongside the negotiated epoch while
//! the ChangeCipherSpecs cross, then the negotiated epoch alone.

use std::mem;

use crate::buffer::Buf;
use crate::crypto::{NullProtection, RecordProtection};
use crate::message::{ContentType, ProtocolVersion, Record, RecordHeader, Sequence, MAX_PLAINTEXT_LEN};
use crate::window::ReplayWindow;
use crate::Error;

#[derive(Debug)]
pub struct Epoch {
    number: u16,
    next_seq: u64,
    replay: ReplayWindow,
    protection: Box<dyn RecordProtection>,
}

impl Epoch {
    pub fn new(number: u16, protection: Box<dyn RecordProtection>) -> Self {
        Epoch {
            number,
            next_seq: 0,
            replay: ReplayWindow::new(),
            protection,
        }
    }

    /// The unprotected handshake epoch.
    pub fn initial() -> Self {
        Self::new(0, Box::new(NullProtection))
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    /// Wire size of a record carrying `plaintext_len` bytes.
    pub fn record_len(&self, plaintext_len: usize) -> usize {
        Record::HEADER_LEN + self.protection.overhead() + plaintext_len
    }

    /// Append one protected record to `out` using the next sequence number.
    pub fn seal(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
        out: &mut Buf,
    ) -> Result<(), Error> {
        if self.next_seq > Sequence::MAX_SEQUENCE_NUMBER {
            return Err(Error::CryptoError(format!(
                "Sequence numbers exhausted in epoch {}",
                self.number
            )));
        }

        let mut header = RecordHeader {
            content_type,
            version: ProtocolVersion::DTLS1_2,
            sequence: Sequence::new(self.number, self.next_seq),
            length: 0,
        };

        let mut fragment = Buf::new();
        self.protection.encrypt(&header, plaintext, &mut fragment)?;
        header.length = fragment.len() as u16;

        header.serialize(out);
        out.extend_from_slice(&fragment);
        self.next_seq += 1;

        Ok(())
    }

    /// Unprotect `record` into `out`.
    ///
    /// Returns `Ok(false)` for a replayed or too-old sequence number. A failed
    /// authentication is an error and leaves the replay window untouched.
    pub fn open(&mut self, record: &Record, out: &mut Buf) -> Result<bool, Error> {
        let seq = record.header.sequence.sequence_number;
        if !self.replay.is_fresh(seq) {
            return Ok(false);
        }

        self.protection
            .decrypt(&record.header, record.fragment, out)?;
        self.replay.mark(seq);

        Ok(true)
    }
}

/// Outcome of routing an inbound record to an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Plaintext was written. Carries the epoch the record belonged to.
    Accepted(u16),
    Dropped(&'static str),
}

#[derive(Debug)]
pub enum Epochs {
    /// Only the unprotected epoch exists.
    Plaintext(Epoch),
    /// Keys for `next` are negotiated. Outbound may use either epoch.
    /// Inbound `next` records are only opened once the peer switched.
    Switching {
        current: Epoch,
        next: Epoch,
        peer_switched: bool,
    },
    /// Handshake complete. Epoch 0 is gone.
    Protected(Epoch),
    /// Transient value while a transition is in progress.
    Empty,
}

impl Default for Epochs {
    fn default() -> Self {
        Epochs::Plaintext(Epoch::initial())
    }
}

impl Epochs {
    /// Look up a writable epoch by number.
    pub fn get_mut(&mut self, number: u16) -> Option<&mut Epoch> {
        match self {
            Epochs::Plaintext(e) | Epochs::Protected(e) if e.number == number => Some(e),
            Epochs::Switching { current, next, .. } => {
                if current.number == number {
                    Some(current)
                } else if next.number == number {
                    Some(next)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Route `record` to the epoch it belongs to and unprotect it.
    pub fn open(&mut self, record: &Record, out: &mut Buf) -> Result<Inbound, Error> {
        let number = record.header.sequence.epoch;

        let epoch = match self {
            Epochs::Plaintext(e) | Epochs::Protected(e) if e.number == number => e,
            Epochs::Switching { current, .. } if current.number == number => current,
            Epochs::Switching {
                next,
                peer_switched: true,
                ..
            } if next.number == number => next,
            _ => return Ok(Inbound::Dropped("no keys for record epoch")),
        };

        if record.fragment.len() > MAX_PLAINTEXT_LEN + epoch.protection.overhead() {
            return Ok(Inbound::Dropped("record exceeds maximum plaintext"));
        }

        if epoch.open(record, out)? {
            Ok(Inbound::Accepted(number))
        } else {
            Ok(Inbound::Dropped("replayed or too old"))
        }
    }

    /// Install the negotiated epoch next to the plaintext one.
    pub fn install_next(&mut self, next: Epoch) {
        *self = match mem::replace(self, Epochs::Empty) {
            Epochs::Plaintext(current) | Epochs::Switching { current, .. } => Epochs::Switching {
                current,
                next,
                peer_switched: false,
            },
            other => other,
        };
    }

    /// The peer's ChangeCipherSpec arrived. Start opening its next-epoch records.
    pub fn peer_switched(&mut self) {
        if let Epochs::Switching { peer_switched, .. } = self {
            *peer_switched = true;
        }
    }

    /// Make the next epoch current and drop the plaintext one.
    pub fn promote(&mut self) {
        *self = match mem::replace(self, Epochs::Empty) {
            Epochs::Switching { next, .. } => Epochs::Protected(next),
            other => other,
        };
    }
}
