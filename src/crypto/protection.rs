//! Record protection strategies.
//!
//! An epoch owns one [`RecordProtection`]. Epoch 0 uses [`NullProtection`].
//! Once keys are negotiated, [`AeadRecordProtection`] seals outgoing fragments
//! as `explicit_nonce(8) || ciphertext || tag(16)` and opens incoming ones.

use std::fmt;

use zeroize::Zeroizing;

use super::gcm::{AesGcm, KEY_LEN, NONCE_LEN};
use super::prf;
use crate::buffer::Buf;
use crate::message::{RecordHeader, AEAD_OVERHEAD, EXPLICIT_NONCE_LEN, MAX_PLAINTEXT_LEN};
use crate::Error;

/// Which end of the connection the keys belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// Turns record plaintext into a wire fragment and back.
pub trait RecordProtection: fmt::Debug + Send {
    /// Append the wire fragment for `plaintext` to `out`.
    ///
    /// `header.length` is ignored. The plaintext length is used instead.
    fn encrypt(&self, header: &RecordHeader, plaintext: &[u8], out: &mut Buf) -> Result<(), Error>;

    /// Append the plaintext of `fragment` to `out`.
    fn decrypt(&self, header: &RecordHeader, fragment: &[u8], out: &mut Buf) -> Result<(), Error>;

    /// Bytes added to every fragment.
    fn overhead(&self) -> usize;
}

/// Identity transform for epoch 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProtection;

impl RecordProtection for NullProtection {
    fn encrypt(&self, _: &RecordHeader, plaintext: &[u8], out: &mut Buf) -> Result<(), Error> {
        out.extend_from_slice(plaintext);
        Ok(())
    }

    fn decrypt(&self, _: &RecordHeader, fragment: &[u8], out: &mut Buf) -> Result<(), Error> {
        out.extend_from_slice(fragment);
        Ok(())
    }

    fn overhead(&self) -> usize {
        0
    }
}

const IV_LEN: usize = 4;
const KEY_BLOCK_LEN: usize = 2 * KEY_LEN + 2 * IV_LEN;

/// AES-128-GCM protection keyed from the master secret.
pub struct AeadRecordProtection {
    write: AesGcm,
    write_iv: [u8; IV_LEN],
    read: AesGcm,
    read_iv: [u8; IV_LEN],
}

impl AeadRecordProtection {
    /// Expand the key block and pick the write/read halves for `side`.
    ///
    /// Key block layout: client key, server key, client IV, server IV.
    pub fn new(
        side: Side,
        master_secret: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<Self, Error> {
        let mut seed = [0u8; 64];
        seed[..32].copy_from_slice(server_random);
        seed[32..].copy_from_slice(client_random);

        let mut block = Buf::new();
        prf::expand(
            &mut block,
            KEY_BLOCK_LEN,
            master_secret,
            prf::LABEL_KEY_EXPANSION,
            &seed,
        )?;

        let mut client_key = Zeroizing::new([0u8; KEY_LEN]);
        let mut server_key = Zeroizing::new([0u8; KEY_LEN]);
        let mut client_iv = [0u8; IV_LEN];
        let mut server_iv = [0u8; IV_LEN];
        client_key.copy_from_slice(&block[..KEY_LEN]);
        server_key.copy_from_slice(&block[KEY_LEN..2 * KEY_LEN]);
        client_iv.copy_from_slice(&block[2 * KEY_LEN..2 * KEY_LEN + IV_LEN]);
        server_iv.copy_from_slice(&block[2 * KEY_LEN + IV_LEN..]);
        block.wipe();

        let client = AesGcm::new(&client_key);
        let server = AesGcm::new(&server_key);

        Ok(match side {
            Side::Client => AeadRecordProtection {
                write: client,
                write_iv: client_iv,
                read: server,
                read_iv: server_iv,
            },
            Side::Server => AeadRecordProtection {
                write: server,
                write_iv: server_iv,
                read: client,
                read_iv: client_iv,
            },
        })
    }
}

fn nonce(iv: &[u8; IV_LEN], explicit: &[u8]) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..IV_LEN].copy_from_slice(iv);
    nonce[IV_LEN..].copy_from_slice(explicit);
    nonce
}

/// `seq(8) || type(1) || version(2) || length(2)`, with the epoch in the
/// top two bytes of the sequence.
fn aad(header: &RecordHeader, plaintext_len: usize) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&header.sequence.to_bytes());
    aad[8] = header.content_type.as_u8();
    aad[9..11].copy_from_slice(&header.version.as_u16().to_be_bytes());
    aad[11..].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
    aad
}

impl RecordProtection for AeadRecordProtection {
    fn encrypt(&self, header: &RecordHeader, plaintext: &[u8], out: &mut Buf) -> Result<(), Error> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::ApplicationDataTooLarge(plaintext.len()));
        }

        let explicit = header.sequence.to_bytes();
        out.extend_from_slice(&explicit);
        self.write.seal(
            &nonce(&self.write_iv, &explicit),
            &aad(header, plaintext.len()),
            plaintext,
            out,
        );
        Ok(())
    }

    fn decrypt(&self, header: &RecordHeader, fragment: &[u8], out: &mut Buf) -> Result<(), Error> {
        let Some(plaintext_len) = fragment.len().checked_sub(AEAD_OVERHEAD) else {
            return Err(Error::AuthenticationFailed);
        };
        if plaintext_len > MAX_PLAINTEXT_LEN {
            return Err(Error::RecordOverflow(plaintext_len));
        }
        let (explicit, sealed) = fragment.split_at(EXPLICIT_NONCE_LEN);

        self.read.open(
            &nonce(&self.read_iv, explicit),
            &aad(header, plaintext_len),
            sealed,
            out,
        )
    }

    fn overhead(&self) -> usize {
        AEAD_OVERHEAD
    }
}

impl fmt::Debug for AeadRecordProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadRecordProtection").finish_non_exhaustive()
    }
}
