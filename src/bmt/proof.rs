// pot-rust/src/bmt/proof.rs

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::hasher::keccak256;
use super::{Segment, BRANCHES, MAX_DATA_LENGTH, PROOF_LENGTH, SEGMENT_SIZE, SPAN_SIZE};
use crate::error::{PotError, Result};

/// Inclusion proof for one 32-byte segment of a chunk.
///
/// `proof_segments` lists the sister segment and sister hashes bottom-up;
/// together with the proved segment and the span header they reconstruct
/// the chunk address. The segment index is not carried in the proof; the
/// verifier derives it from context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(with = "serde_hex::segment")]
    pub prove_segment: Segment,
    #[serde(with = "serde_hex::segments")]
    pub proof_segments: Vec<Segment>,
    #[serde(rename = "chunkSpan", with = "serde_hex::span")]
    pub span: [u8; SPAN_SIZE],
}

/// Builds inclusion proofs over one chunk's padded segment buffer.
pub struct Prover {
    levels: Vec<Vec<Segment>>,
    span: [u8; SPAN_SIZE],
}

impl Prover {
    /// Prepares a prover over `data`, with the span header set to the data
    /// length (the convention used for node chunks).
    pub fn new(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_DATA_LENGTH {
            return Err(PotError::InvalidState(format!(
                "chunk capacity exceeded: {} > {}",
                data.len(),
                MAX_DATA_LENGTH
            )));
        }
        let mut span = [0u8; SPAN_SIZE];
        LittleEndian::write_u64(&mut span, data.len() as u64);

        let mut segments: Vec<Segment> = Vec::with_capacity(BRANCHES);
        for i in 0..BRANCHES {
            let mut seg = [0u8; SEGMENT_SIZE];
            let start = i * SEGMENT_SIZE;
            if start < data.len() {
                let end = usize::min(start + SEGMENT_SIZE, data.len());
                seg[..end - start].copy_from_slice(&data[start..end]);
            }
            segments.push(seg);
        }

        // Precompute every tree level so proofs are simple lookups.
        let mut levels = vec![segments];
        while levels.last().unwrap().len() > 1 {
            let prev = levels.last().unwrap();
            let next: Vec<Segment> = prev
                .chunks_exact(2)
                .map(|pair| keccak256(&[&pair[0], &pair[1]]))
                .collect();
            levels.push(next);
        }
        Ok(Prover { levels, span })
    }

    /// The chunk address the proofs of this prover reconstruct.
    pub fn root(&self) -> Segment {
        keccak256(&[&self.span, &self.levels.last().unwrap()[0]])
    }

    /// Produces the inclusion proof for segment `index`.
    pub fn proof(&self, index: usize) -> Result<Proof> {
        if index >= BRANCHES {
            return Err(PotError::InvalidState(format!(
                "segment index out of range: {index} >= {BRANCHES}"
            )));
        }
        let mut proof_segments = Vec::with_capacity(PROOF_LENGTH);
        let mut i = index;
        for level in &self.levels[..PROOF_LENGTH] {
            proof_segments.push(level[i ^ 1]);
            i >>= 1;
        }
        Ok(Proof {
            prove_segment: self.levels[0][index],
            proof_segments,
            span: self.span,
        })
    }
}

/// Reconstructs the chunk address committed to by `proof` for segment
/// `index`. The caller compares the result against the expected reference.
pub fn verify(proof: &Proof, index: usize) -> Result<Segment> {
    if proof.proof_segments.len() != PROOF_LENGTH {
        return Err(PotError::ProofMismatch(format!(
            "expected {} proof segments, got {}",
            PROOF_LENGTH,
            proof.proof_segments.len()
        )));
    }
    let mut root = proof.prove_segment;
    let mut i = index;
    for sister in &proof.proof_segments {
        root = if i % 2 == 0 {
            keccak256(&[&root, sister])
        } else {
            keccak256(&[sister, &root])
        };
        i >>= 1;
    }
    Ok(keccak256(&[&proof.span, &root]))
}

/// Hex/span encodings for the proof JSON: segments as `0x`-prefixed hex
/// strings, the span as its little-endian `u64` value.
pub(crate) mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        format!("0x{}", hex::encode(bytes))
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, String> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(stripped).map_err(|e| e.to_string())
    }

    pub mod segment {
        use super::*;
        use crate::bmt::{Segment, SEGMENT_SIZE};

        pub fn serialize<S: Serializer>(seg: &Segment, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&encode(seg))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Segment, D::Error> {
            let raw = String::deserialize(d)?;
            let bytes = decode(&raw).map_err(serde::de::Error::custom)?;
            if bytes.len() != SEGMENT_SIZE {
                return Err(serde::de::Error::custom("segment must be 32 bytes"));
            }
            let mut seg = [0u8; SEGMENT_SIZE];
            seg.copy_from_slice(&bytes);
            Ok(seg)
        }
    }

    pub mod segments {
        use super::*;
        use crate::bmt::{Segment, SEGMENT_SIZE};
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(segs: &[Segment], s: S) -> Result<S::Ok, S::Error> {
            let mut seq = s.serialize_seq(Some(segs.len()))?;
            for seg in segs {
                seq.serialize_element(&encode(seg))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Segment>, D::Error> {
            let raw = Vec::<String>::deserialize(d)?;
            raw.into_iter()
                .map(|s| {
                    let bytes = decode(&s).map_err(serde::de::Error::custom)?;
                    if bytes.len() != SEGMENT_SIZE {
                        return Err(serde::de::Error::custom("segment must be 32 bytes"));
                    }
                    let mut seg = [0u8; SEGMENT_SIZE];
                    seg.copy_from_slice(&bytes);
                    Ok(seg)
                })
                .collect()
        }
    }

    pub mod bytes {
        use super::*;

        pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&encode(bytes))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
            let raw = String::deserialize(d)?;
            decode(&raw).map_err(serde::de::Error::custom)
        }
    }

    pub mod span {
        use super::super::SPAN_SIZE;
        use byteorder::{ByteOrder, LittleEndian};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(span: &[u8; SPAN_SIZE], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u64(LittleEndian::read_u64(span))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<[u8; SPAN_SIZE], D::Error> {
            let value = u64::deserialize(d)?;
            let mut span = [0u8; SPAN_SIZE];
            LittleEndian::write_u64(&mut span, value);
            Ok(span)
        }
    }
}
