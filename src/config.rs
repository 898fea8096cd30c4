use std::time::Duration;

use crate::message::{Record, AEAD_OVERHEAD};
use crate::Error;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    mtu: usize,
    max_queue_tx: usize,
    max_queued_app_data: usize,
    flight_rto: Duration,
    handshake_timeout: Option<Duration>,
    verify_server_signature: bool,
    rng_seed: Option<u64>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            mtu: 1150,
            max_queue_tx: 10,
            max_queued_app_data: 32,
            flight_rto: Duration::from_millis(200),
            handshake_timeout: None,
            verify_server_signature: true,
            rng_seed: None,
        }
    }

    /// Max transmission unit.
    ///
    /// The largest datagram we will produce.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Max amount of outgoing datagrams waiting for `poll_output`.
    #[inline(always)]
    pub fn max_queue_tx(&self) -> usize {
        self.max_queue_tx
    }

    /// Max number of `send` calls buffered while the handshake is pending.
    #[inline(always)]
    pub fn max_queued_app_data(&self) -> usize {
        self.max_queued_app_data
    }

    /// Retransmission interval for an unanswered flight.
    ///
    /// Fixed, no backoff. Flights are resent indefinitely.
    #[inline(always)]
    pub fn flight_rto(&self) -> Duration {
        self.flight_rto
    }

    /// Optional cap on the entire handshake.
    ///
    /// `None` means the handshake is retried until the caller gives up.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout
    }

    /// Whether a bad ServerKeyExchange signature aborts the handshake.
    ///
    /// When false, the signature is still checked and a failure is logged.
    #[inline(always)]
    pub fn verify_server_signature(&self) -> bool {
        self.verify_server_signature
    }

    /// Seed for deterministic randomness. Testing only.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

/// Builder for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    mtu: usize,
    max_queue_tx: usize,
    max_queued_app_data: usize,
    flight_rto: Duration,
    handshake_timeout: Option<Duration>,
    verify_server_signature: bool,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set the max transmission unit (MTU).
    ///
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the max amount of outgoing datagrams to buffer.
    ///
    /// Defaults to 10.
    pub fn max_queue_tx(mut self, max_queue_tx: usize) -> Self {
        self.max_queue_tx = max_queue_tx;
        self
    }

    /// Set the max number of sends buffered before the handshake completes.
    ///
    /// Defaults to 32.
    pub fn max_queued_app_data(mut self, max: usize) -> Self {
        self.max_queued_app_data = max;
        self
    }

    /// Set the flight retransmission interval.
    ///
    /// Defaults to 200 milliseconds.
    pub fn flight_rto(mut self, rto: Duration) -> Self {
        self.flight_rto = rto;
        self
    }

    /// Set a timeout for the entire handshake.
    ///
    /// Defaults to none.
    pub fn handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set whether a bad ServerKeyExchange signature is fatal.
    ///
    /// Defaults to true.
    pub fn verify_server_signature(mut self, verify: bool) -> Self {
        self.verify_server_signature = verify;
        self
    }

    /// Seed the random generator for reproducible runs.
    ///
    /// Defaults to none. Never set this outside tests.
    pub fn rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Build the configuration.
    ///
    /// Fails with `Error::ConfigError` if the MTU cannot hold a protected
    /// record or the retransmission interval is zero.
    pub fn build(self) -> Result<Config, Error> {
        let min_mtu = Record::HEADER_LEN + AEAD_OVERHEAD + 64;
        if self.mtu < min_mtu {
            return Err(Error::ConfigError(format!(
                "MTU {} below minimum {}",
                self.mtu, min_mtu
            )));
        }

        if self.flight_rto.is_zero() {
            return Err(Error::ConfigError(
                "Flight retransmission interval must be non-zero".to_string(),
            ));
        }

        Ok(Config {
            mtu: self.mtu,
            max_queue_tx: self.max_queue_tx,
            max_queued_app_data: self.max_queued_app_data,
            flight_rto: self.flight_rto,
            handshake_timeout: self.handshake_timeout,
            verify_server_signature: self.verify_server_signature,
            rng_seed: self.rng_seed,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mtu: 1150,
            max_queue_tx: 10,
            max_queued_app_data: 32,
            flight_rto: Duration::from_millis(200),
            handshake_timeout: None,
            verify_server_signature: true,
            rng_seed: None,
        }
    }
}
