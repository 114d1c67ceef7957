// pot-rust/src/lib.rs

//! Persistent, content-addressed proximity-order trie.
//!
//! The trie orders keys by *proximity order* — the index of the first bit
//! at which two keys differ — rather than by key segmentation. One node
//! shape serves both the in-memory index and the content-addressed store;
//! the same serialisation doubles as a cryptographic commitment from which
//! short per-key inclusion proofs are built and verified.
//!
//! Entry points:
//! - [`Index`]: mutable trie with concurrent readers and one writer;
//! - [`SwarmKvs`]: minimal key-value store over a persisted trie;
//! - [`proof::create_fork_path_proof`] / [`proof::verify_fork_path_proof`]:
//!   inclusion proofs against a saved root reference.
//!
//! ```
//! # use std::sync::Arc;
//! # use pot_rust::{InMemoryStore, LoadSaver, SwarmKvs};
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(InMemoryStore::new());
//! let kvs = SwarmKvs::new(Arc::clone(&store) as Arc<dyn LoadSaver>);
//! kvs.put(&[7u8; 32], b"value").await.unwrap();
//! let reference = kvs.save().await.unwrap();
//!
//! let reloaded = SwarmKvs::with_reference(store, &reference).await.unwrap();
//! assert_eq!(reloaded.get(&[7u8; 32]).await.unwrap(), b"value");
//! # });
//! ```

pub mod bmt;
pub mod common;
pub mod error;
pub mod index;
pub mod kvs;
pub mod mode;
pub mod node;
pub mod ops;
pub mod proof;
pub mod store;

pub use common::{Key, Reference, Value, MAX_DEPTH, REFERENCE_SIZE};
pub use error::{PotError, Result};
pub use index::Index;
pub use kvs::{SwarmEntry, SwarmKvs};
pub use mode::{Mode, SingleOrder, SwarmPot};
pub use node::{CNode, Entry, MemNode, Node};
pub use store::{InMemoryStore, LoadSaver};
