use std::time::{Duration, Instant};

/// Fixed-interval retransmission timer for the current flight.
///
/// There is no backoff and no retry cap: while a flight is outstanding the
/// timer fires every `rto` until the flight is acknowledged by the server's
/// next flight, or the timer is stopped.
#[derive(Debug, Clone)]
pub struct FlightTimer {
    rto: Duration,
    state: Timeout,
    fired: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// No flight outstanding.
    Disabled,
    /// A flight was sent; the deadline is set on the next `handle_timeout`.
    Unarmed,
    Armed(Instant),
}

impl FlightTimer {
    pub fn new(rto: Duration) -> Self {
        Self {
            rto,
            state: Timeout::Disabled,
            fired: 0,
        }
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Start timing a freshly sent flight.
    ///
    /// The flight may have been produced while handling a packet, when no
    /// current time is known. The deadline is set by the next `poll_expired`.
    pub fn begin(&mut self) {
        self.fired = 0;
        self.state = Timeout::Unarmed;
    }

    pub fn stop(&mut self) {
        self.state = Timeout::Disabled;
    }

    /// Returns true if the flight must be resent now, re-arming the timer.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.state {
            Timeout::Disabled => false,
            Timeout::Unarmed => {
                self.state = Timeout::Armed(now + self.rto);
                false
            }
            Timeout::Armed(deadline) if now >= deadline => {
                self.fired += 1;
                self.state = Timeout::Armed(now + self.rto);
                true
            }
            Timeout::Armed(_) => false,
        }
    }

    /// A flight went out and waits for the current time to set its deadline.
    pub fn is_unarmed(&self) -> bool {
        self.state == Timeout::Unarmed
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            Timeout::Armed(deadline) => Some(deadline),
            _ => None,
        }
    }

    /// Number of resends of the current flight.
    pub fn fired(&self) -> u32 {
        self.fired
    }
}
