//! Password-derived substitution table.
//!
//! Builds the 256-entry encode/decode permutation pair used by
//! [`crate::conn::StreamConnection`]. The derivation is fixed by the wire
//! protocol: any deviation from the sort key below breaks compatibility
//! with a peer built from the same password.

use md5::{Digest, Md5};

const ROUNDS: u64 = 1024;

/// A password-derived pair of mutually-inverse byte permutations.
#[derive(Debug, Clone)]
pub struct EncryptionTable {
    encode: [u8; 256],
    decode: [u8; 256],
}

impl EncryptionTable {
    /// Derives the table from `password`. Pure: identical passwords always
    /// produce identical tables.
    pub fn new(password: &str) -> Self {
        let a = key_seed(password);

        let mut s: Vec<u8> = (0..=255u8).collect();
        for i in 1..ROUNDS {
            s.sort_by_key(|&x| a % (x as u64 + i));
        }

        let mut encode = [0u8; 256];
        encode.copy_from_slice(&s);

        let mut decode = [0u8; 256];
        for (i, &e) in encode.iter().enumerate() {
            decode[e as usize] = i as u8;
        }

        Self { encode, decode }
    }

    #[inline]
    pub fn encode_byte(&self, b: u8) -> u8 {
        self.encode[b as usize]
    }

    #[inline]
    pub fn decode_byte(&self, b: u8) -> u8 {
        self.decode[b as usize]
    }

    pub fn encode_slice(&self, dst: &mut [u8], src: &[u8]) {
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = self.encode[s as usize];
        }
    }

    pub fn decode_in_place(&self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.decode[*b as usize];
        }
    }

    pub fn encode(&self) -> &[u8; 256] {
        &self.encode
    }

    pub fn decode(&self) -> &[u8; 256] {
        &self.decode
    }

    /// Reconstructs a table from a previously-derived encode permutation,
    /// e.g. one loaded from the on-disk cache (see [`crate::cache`]).
    pub fn from_encode(encode: [u8; 256]) -> Self {
        let mut decode = [0u8; 256];
        for (i, &e) in encode.iter().enumerate() {
            decode[e as usize] = i as u8;
        }
        Self { encode, decode }
    }
}

fn key_seed(password: &str) -> u64 {
    let digest = Md5::digest(password.as_bytes());
    u64::from_le_bytes(digest[..8].try_into().unwrap())
}
