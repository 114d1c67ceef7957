// pot-rust/src/proof/mod.rs

//! Fork-path inclusion proofs.
//!
//! A [`ForkPathProof`] convinces a verifier holding only a root reference
//! that a specific key resolves to a specific value in the trie: one pair
//! of BMT proofs per interior node on the path (the fork bitmap and the
//! child reference), chained by the child references, plus an entry proof
//! over the terminal node. Verification needs no other part of the trie.

pub mod prover;
pub mod verifier;

pub use prover::{create_fork_path_proof, EntryProof, ForkPathProof, ForkRefProof};
pub use verifier::verify_fork_path_proof;
