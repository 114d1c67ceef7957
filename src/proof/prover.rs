// pot-rust/src/proof/prover.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bmt::proof::serde_hex;
use crate::bmt::{Prover, Proof};
use crate::common::{Reference, MAX_DEPTH};
use crate::error::{PotError, Result};
use crate::node::format::entry_offset;
use crate::node::{Entry, Node};
use crate::ops::po;
use crate::store::LoadSaver;

const KEY_SIZE: usize = 32;
const HEADER_SIZE: usize = 64;

/// Proofs for one interior node on the fork path: the fork bitmap (segment
/// 1, whose first sister exposes the node key) and the child reference at
/// the proximity order toward the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkRefProof {
    pub bit_vector_proof: Proof,
    pub fork_reference_proof: Proof,
}

/// Proofs for the terminal node: the bitmap proof binds the node key to the
/// target, the entry proof covers the first segment of the entry payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryProof {
    pub bit_vector_proof: Proof,
    pub entry_proof: Proof,
}

/// A chain of BMT proofs from a root reference down to the entry of the
/// target key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkPathProof {
    #[serde(with = "serde_hex::segment")]
    pub root_reference: Reference,
    #[serde(with = "serde_hex::bytes")]
    pub target_key: Vec<u8>,
    pub fork_ref_proofs: Vec<ForkRefProof>,
    pub entry_proof: EntryProof,
}

impl ForkPathProof {
    /// The proved first segment of the entry payload.
    pub fn proved_entry_segment(&self) -> &[u8; 32] {
        &self.entry_proof.entry_proof.prove_segment
    }

    /// Hexified JSON rendering, usable as an on-chain validation parameter.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PotError::InvalidState(format!("proof encoding failed: {e}")))
    }
}

fn bit_set(bitmap: &[u8], i: usize) -> bool {
    bitmap[i / 8] & (1 << (7 - i % 8)) != 0
}

fn count_below(bitmap: &[u8], po: usize) -> usize {
    (0..po).filter(|&i| bit_set(bitmap, i)).count()
}

/// Builds the fork-path proof for `target_key` under a saved root.
///
/// The walk loads every node's bytes back from the store by reference, so
/// the proofs commit to exactly the persisted form. Proving a key that is
/// not in the trie fails with `NotFound`.
pub async fn create_fork_path_proof<E: Entry>(
    root: &Arc<Node<E>>,
    ls: &dyn LoadSaver,
    target_key: &[u8],
) -> Result<ForkPathProof> {
    if target_key.len() != KEY_SIZE {
        return Err(PotError::InvalidState(format!(
            "target key must be {} bytes, got {}",
            KEY_SIZE,
            target_key.len()
        )));
    }
    let root_reference = *root.reference().ok_or_else(|| {
        PotError::InvalidState("root has no reference; save the trie first".to_string())
    })?;

    let mut fork_ref_proofs = Vec::new();
    let mut data = ls.load(&root_reference).await?;
    let mut at = 0usize;
    loop {
        if data.len() < HEADER_SIZE {
            return Err(PotError::InvalidBinary(format!(
                "node too short: {} bytes",
                data.len()
            )));
        }
        if &data[..KEY_SIZE] == target_key {
            let entry_proof = create_entry_proof(&data)?;
            return Ok(ForkPathProof {
                root_reference,
                target_key: target_key.to_vec(),
                fork_ref_proofs,
                entry_proof,
            });
        }
        let (proof, next, next_at) = create_fork_ref_proof(&data, target_key, at)?;
        fork_ref_proofs.push(proof);
        data = ls.load(&next).await?;
        at = next_at;
    }
}

/// Proofs over one interior node: segment 1 (the bitmap) and segment
/// `2 + forkIndex` (the child reference at the proximity order of the
/// target). Returns the child reference and the order for the next level.
fn create_fork_ref_proof(
    data: &[u8],
    target_key: &[u8],
    at: usize,
) -> Result<(ForkRefProof, Reference, usize)> {
    let node_key = &data[..KEY_SIZE];
    let bitmap = &data[KEY_SIZE..HEADER_SIZE];
    let po = po(node_key, target_key, at);
    debug_assert!(po < MAX_DEPTH, "distinct keys differ within the depth");
    if !bit_set(bitmap, po) {
        // No fork toward the target: the key is not in the trie.
        return Err(PotError::NotFound);
    }
    let fork_index = count_below(bitmap, po);

    let prover = Prover::new(data)?;
    let bit_vector_proof = prover.proof(1)?;
    let fork_reference_proof = prover.proof(2 + fork_index)?;
    let next = fork_reference_proof.prove_segment;

    Ok((
        ForkRefProof {
            bit_vector_proof,
            fork_reference_proof,
        },
        next,
        po,
    ))
}

/// Proofs over the terminal node: segment 1 and the first segment of the
/// entry payload, whose index accounts for the padding after the fork
/// sizes.
fn create_entry_proof(data: &[u8]) -> Result<EntryProof> {
    let bitmap = &data[KEY_SIZE..HEADER_SIZE];
    let forks = (0..MAX_DEPTH).filter(|&i| bit_set(bitmap, i)).count();
    let segment_index = entry_offset(forks) / 32;

    let prover = Prover::new(data)?;
    Ok(EntryProof {
        bit_vector_proof: prover.proof(1)?,
        entry_proof: prover.proof(segment_index)?,
    })
}
