// pot-rust/src/bmt/mod.rs

//! Binary Merkle Tree hashing over fixed-capacity chunks.
//!
//! A chunk is at most [`MAX_DATA_LENGTH`] bytes, addressed as 128 segments
//! of 32 bytes. Its address is the Keccak-256 hash of the 8-byte
//! little-endian span header concatenated with the Merkle root of the
//! (zero-padded) segments. The same tree yields short inclusion proofs for
//! any single segment.

pub mod hasher;
pub mod proof;

pub use hasher::{chunk_address, keccak256, Hasher};
pub use proof::{verify, Proof, Prover};

/// Size of one BMT segment in bytes.
pub const SEGMENT_SIZE: usize = 32;

/// Number of segments in a full chunk.
pub const BRANCHES: usize = 128;

/// Maximum number of data bytes in a chunk.
pub const MAX_DATA_LENGTH: usize = BRANCHES * SEGMENT_SIZE;

/// Length of the span header prepended when computing a chunk address.
pub const SPAN_SIZE: usize = 8;

/// Number of sister segments in an inclusion proof (log2 of [`BRANCHES`]).
pub const PROOF_LENGTH: usize = 7;

/// A single 32-byte BMT segment.
pub type Segment = [u8; SEGMENT_SIZE];
