// pot-rust/tests/common/mod.rs

#![allow(dead_code)]

use sha2::{Digest, Sha256};

use pot_rust::error::{PotError, Result};
use pot_rust::node::Entry;

/// Test entry: 32-byte key plus a small integer payload, serialised as a
/// 32-byte buffer with the value big-endian in the last four bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEntry {
    pub key: Vec<u8>,
    pub val: u32,
}

impl MockEntry {
    pub fn new(key: Vec<u8>, val: u32) -> Self {
        MockEntry { key, val }
    }

    /// Deterministic entry `n`: the key is SHA-256 over the 4-byte
    /// big-endian index.
    pub fn det(n: u32) -> Self {
        let digest = Sha256::digest(n.to_be_bytes());
        MockEntry {
            key: digest.to_vec(),
            val: n,
        }
    }
}

impl Entry for MockEntry {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn equal(&self, other: &Self) -> bool {
        self.val == other.val
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; 32];
        buf[28..32].copy_from_slice(&self.val.to_be_bytes());
        Ok(buf)
    }

    fn unmarshal(key: &[u8], payload: &[u8]) -> Result<Self> {
        if payload.len() < 32 {
            return Err(PotError::InvalidBinary(format!(
                "mock entry payload too short: {}",
                payload.len()
            )));
        }
        let mut val = [0u8; 4];
        val.copy_from_slice(&payload[28..32]);
        Ok(MockEntry {
            key: key.to_vec(),
            val: u32::from_be_bytes(val),
        })
    }
}

/// Key with the big-endian encoding of `n` in the first four bytes, zero
/// elsewhere; used by the iteration tests where ordering must be visible.
pub fn numbered_key(n: u32) -> Vec<u8> {
    let mut key = vec![0u8; 32];
    key[..4].copy_from_slice(&n.to_be_bytes());
    key
}
