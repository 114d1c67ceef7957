// pot-rust/src/bmt/hasher.rs

use byteorder::{ByteOrder, LittleEndian};
use sha3::{Digest, Keccak256};

use super::{Segment, MAX_DATA_LENGTH, SEGMENT_SIZE, SPAN_SIZE};
use crate::common::Reference;
use crate::error::{PotError, Result};

/// Computes the Keccak-256 hash of the concatenation of the given slices.
pub fn keccak256(parts: &[&[u8]]) -> Segment {
    let mut hasher = Keccak256::new();
    for p in parts {
        hasher.update(p);
    }
    hasher.finalize().into()
}

/// Incremental BMT hasher for a single chunk.
///
/// Data is written into a zero-padded buffer of [`MAX_DATA_LENGTH`] bytes;
/// `sum` hashes segment pairs level by level and seals the Merkle root with
/// the span header.
pub struct Hasher {
    buf: Box<[u8; MAX_DATA_LENGTH]>,
    len: usize,
    span: [u8; SPAN_SIZE],
}

impl Hasher {
    pub fn new() -> Self {
        Hasher {
            buf: Box::new([0u8; MAX_DATA_LENGTH]),
            len: 0,
            span: [0u8; SPAN_SIZE],
        }
    }

    /// Sets the span header to the little-endian encoding of `span`.
    pub fn set_span(&mut self, span: u64) {
        LittleEndian::write_u64(&mut self.span, span);
    }

    /// Appends data to the chunk buffer.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.len + data.len() > MAX_DATA_LENGTH {
            return Err(PotError::InvalidState(format!(
                "chunk capacity exceeded: {} > {}",
                self.len + data.len(),
                MAX_DATA_LENGTH
            )));
        }
        self.buf[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Returns the chunk address: `keccak256(span ‖ merkle_root)`.
    pub fn sum(&self) -> Segment {
        let root = merkle_root(self.buf.as_ref());
        keccak256(&[&self.span, &root])
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Merkle root of a full (padded) chunk buffer, pair-hashing segments
/// bottom-up.
pub(crate) fn merkle_root(buf: &[u8]) -> Segment {
    debug_assert_eq!(buf.len(), MAX_DATA_LENGTH);
    let mut level: Vec<Segment> = buf
        .chunks_exact(SEGMENT_SIZE)
        .map(|s| {
            let mut seg = [0u8; SEGMENT_SIZE];
            seg.copy_from_slice(s);
            seg
        })
        .collect();
    while level.len() > 1 {
        level = level
            .chunks_exact(2)
            .map(|pair| keccak256(&[&pair[0], &pair[1]]))
            .collect();
    }
    level[0]
}

/// Computes the content address of a byte blob: BMT hash with the span set
/// to the blob length. This is the reference under which a [`LoadSaver`]
/// stores the bytes.
///
/// [`LoadSaver`]: crate::store::LoadSaver
pub fn chunk_address(data: &[u8]) -> Result<Reference> {
    let mut hasher = Hasher::new();
    hasher.set_span(data.len() as u64);
    hasher.write(data)?;
    Ok(hasher.sum())
}
