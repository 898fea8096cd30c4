/// Sliding anti-replay window for one epoch's record sequence numbers.
///
/// Tracks the highest accepted sequence number and a 64-bit bitmap of the 64
/// sequence numbers at and below it. Bit `n` set means `max_seq - n` was seen.
///
/// Checking and marking are separate steps: a record is only marked once its
/// AEAD tag has verified, so forged records cannot poison the window.
#[derive(Debug, Default, Clone)]
pub struct ReplayWindow {
    max_seq: u64,
    window: u64,
}

/// Number of sequence numbers tracked behind the high-water mark.
pub const WINDOW_SIZE: u64 = 64;

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `seqno` would be accepted. Does not change state.
    pub fn is_fresh(&self, seqno: u64) -> bool {
        if self.window == 0 || seqno > self.max_seq {
            return true;
        }
        let offset = self.max_seq - seqno;
        if offset >= WINDOW_SIZE {
            return false;
        }
        self.window & (1u64 << offset) == 0
    }

    /// Mark `seqno` as seen. The caller checks [`ReplayWindow::is_fresh`] first.
    pub fn mark(&mut self, seqno: u64) {
        if self.window == 0 {
            self.max_seq = seqno;
            self.window = 1;
        } else if seqno > self.max_seq {
            let delta = seqno - self.max_seq;
            self.window = if delta >= WINDOW_SIZE {
                1
            } else {
                (self.window << delta) | 1
            };
            self.max_seq = seqno;
        } else {
            let offset = self.max_seq - seqno;
            if offset < WINDOW_SIZE {
                self.window |= 1u64 << offset;
            }
        }
    }
}
