//! AES-128-GCM assembled from the AES block cipher, GCTR and GHASH.
//!
//! Only the raw block cipher comes from `aes`. Counter mode, the GF(2^128)
//! universal hash and tag handling are implemented here. All scratch state is
//! on the stack of each call, so one [`AesGcm`] can be shared freely.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::Error;

pub const KEY_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// GHASH reduction constant: x^128 + x^7 + x^2 + x + 1 in reflected bit order.
const R: u128 = 0xe1 << 120;

pub struct AesGcm {
    cipher: Aes128,
    /// Hash subkey H = E(K, 0^128).
    h: u128,
}

impl AesGcm {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let cipher = Aes128::new(key.into());
        let mut zero = [0u8; BLOCK_LEN];
        cipher.encrypt_block(aes::Block::from_mut_slice(&mut zero));
        let h = u128::from_be_bytes(zero);
        zero.zeroize();
        AesGcm { cipher, h }
    }

    /// Encrypt `plaintext` and append `ciphertext || tag` to `out`.
    pub fn seal(&self, nonce: &[u8; NONCE_LEN], aad: &[u8], plaintext: &[u8], out: &mut Buf) {
        let j0 = counter_block(nonce, 1);
        let start = out.len();
        out.extend_from_slice(plaintext);
        self.gctr(inc32(j0), &mut out[start..]);
        let tag = self.tag(j0, aad, &out[start..]);
        out.extend_from_slice(&tag);
    }

    /// Verify and decrypt `ciphertext || tag`, appending the plaintext to `out`.
    ///
    /// Nothing is written to `out` unless the tag verifies.
    pub fn open(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        sealed: &[u8],
        out: &mut Buf,
    ) -> Result<(), Error> {
        let Some(ct_len) = sealed.len().checked_sub(TAG_LEN) else {
            return Err(Error::AuthenticationFailed);
        };
        let (ciphertext, tag) = sealed.split_at(ct_len);

        let j0 = counter_block(nonce, 1);
        let expected = self.tag(j0, aad, ciphertext);
        if !bool::from(expected.ct_eq(tag)) {
            return Err(Error::AuthenticationFailed);
        }

        let start = out.len();
        out.extend_from_slice(ciphertext);
        self.gctr(inc32(j0), &mut out[start..]);
        Ok(())
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        self.cipher.encrypt_block(aes::Block::from_mut_slice(block));
    }

    /// Counter-mode keystream XOR, starting at counter block `icb`.
    fn gctr(&self, icb: [u8; BLOCK_LEN], data: &mut [u8]) {
        let mut counter = icb;
        for chunk in data.chunks_mut(BLOCK_LEN) {
            let mut keystream = counter;
            self.encrypt_block(&mut keystream);
            for (d, k) in chunk.iter_mut().zip(keystream.iter()) {
                *d ^= k;
            }
            counter = inc32(counter);
        }
    }

    fn tag(&self, j0: [u8; BLOCK_LEN], aad: &[u8], ciphertext: &[u8]) -> [u8; TAG_LEN] {
        let mut s = 0u128;
        s = ghash(self.h, s, aad);
        s = ghash(self.h, s, ciphertext);

        let mut lengths = [0u8; BLOCK_LEN];
        lengths[..8].copy_from_slice(&((aad.len() as u64) * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&((ciphertext.len() as u64) * 8).to_be_bytes());
        s = ghash(self.h, s, &lengths);

        let mut tag = j0;
        self.encrypt_block(&mut tag);
        for (t, x) in tag.iter_mut().zip(s.to_be_bytes()) {
            *t ^= x;
        }
        tag
    }
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesGcm(..)")
    }
}

/// `nonce || counter` as a 16-byte block.
fn counter_block(nonce: &[u8; NONCE_LEN], counter: u32) -> [u8; BLOCK_LEN] {
    let mut block = [0u8; BLOCK_LEN];
    block[..NONCE_LEN].copy_from_slice(nonce);
    block[NONCE_LEN..].copy_from_slice(&counter.to_be_bytes());
    block
}

/// Increment the big-endian 32-bit counter in the last four bytes.
fn inc32(mut block: [u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
    let mut ctr = [0u8; 4];
    ctr.copy_from_slice(&block[NONCE_LEN..]);
    let next = u32::from_be_bytes(ctr).wrapping_add(1);
    block[NONCE_LEN..].copy_from_slice(&next.to_be_bytes());
    block
}

/// Absorb `data`, zero-padded to a block boundary, into the accumulator `y`.
fn ghash(h: u128, mut y: u128, data: &[u8]) -> u128 {
    for chunk in data.chunks(BLOCK_LEN) {
        let mut block = [0u8; BLOCK_LEN];
        block[..chunk.len()].copy_from_slice(chunk);
        y = gf_mul(y ^ u128::from_be_bytes(block), h);
    }
    y
}

/// Multiplication in GF(2^128) with GCM's bit ordering.
///
/// Bit 0 of the field element is the most significant bit of the block.
fn gf_mul(x: u128, y: u128) -> u128 {
    let mut z = 0u128;
    let mut v = y;
    for i in 0..128 {
        let bit = (x >> (127 - i)) & 1;
        z ^= v & bit.wrapping_neg();
        let lsb = v & 1;
        v = (v >> 1) ^ (R & lsb.wrapping_neg());
    }
    z
}
