// pot-rust/src/proof/verifier.rs

//! Off-chain fork-path verification, mirroring the on-chain algorithm: the
//! verifier derives every segment index itself and accepts nothing the
//! chunk hashes do not commit to.

use crate::bmt;
use crate::common::MAX_DEPTH;
use crate::error::{PotError, Result};
use crate::node::format::entry_offset;
use crate::ops::po;
use crate::proof::ForkPathProof;

const BIT_VECTOR_SEGMENT: usize = 1;

fn bit_set(bitmap: &[u8], i: usize) -> bool {
    bitmap[i / 8] & (1 << (7 - i % 8)) != 0
}

fn count_below(bitmap: &[u8], po: usize) -> usize {
    (0..po).filter(|&i| bit_set(bitmap, i)).count()
}

fn mismatch(reason: &str) -> PotError {
    PotError::ProofMismatch(reason.to_string())
}

/// Verifies a fork-path proof against its root reference and target key.
///
/// Checks, in order: the terminal node's key is the target key; each
/// interior node's bitmap has the fork bit at the chained proximity order
/// set; both BMT proofs of every node reconstruct the expected chunk hash;
/// each fork reference hands the chain to the next node; and the entry
/// proof sits at the segment index implied by the terminal bitmap.
pub fn verify_fork_path_proof(proof: &ForkPathProof) -> Result<()> {
    let target = proof.target_key.as_slice();
    let entry_key = proof
        .entry_proof
        .bit_vector_proof
        .proof_segments
        .first()
        .ok_or_else(|| mismatch("missing bit vector proof segments"))?;
    if entry_key.as_slice() != target {
        return Err(mismatch("entry key does not match target key"));
    }

    let mut current = proof.root_reference;
    let mut at = 0usize;
    for fork_ref_proof in &proof.fork_ref_proofs {
        let node_key = fork_ref_proof
            .bit_vector_proof
            .proof_segments
            .first()
            .ok_or_else(|| mismatch("missing bit vector proof segments"))?;
        let bitmap = &fork_ref_proof.bit_vector_proof.prove_segment;

        let fork_po = po(node_key, target, at);
        if fork_po >= MAX_DEPTH {
            return Err(mismatch("fork path node key equals target key"));
        }
        if !bit_set(bitmap, fork_po) {
            return Err(mismatch("fork bit not set in bit vector"));
        }
        let fork_segment = 2 + count_below(bitmap, fork_po);

        if bmt::verify(&fork_ref_proof.bit_vector_proof, BIT_VECTOR_SEGMENT)? != current {
            return Err(mismatch("invalid bit vector proof"));
        }
        if bmt::verify(&fork_ref_proof.fork_reference_proof, fork_segment)? != current {
            return Err(mismatch("invalid fork reference proof"));
        }
        current = fork_ref_proof.fork_reference_proof.prove_segment;
        at = fork_po;
    }

    if bmt::verify(&proof.entry_proof.bit_vector_proof, BIT_VECTOR_SEGMENT)? != current {
        return Err(mismatch("invalid bit vector proof"));
    }
    let bitmap = &proof.entry_proof.bit_vector_proof.prove_segment;
    let forks = (0..MAX_DEPTH).filter(|&i| bit_set(bitmap, i)).count();
    let entry_segment = entry_offset(forks) / 32;
    if bmt::verify(&proof.entry_proof.entry_proof, entry_segment)? != current {
        return Err(mismatch("invalid entry proof"));
    }
    Ok(())
}
