// pot-rust/src/kvs.rs

use std::sync::Arc;

use crate::common::{Key, Reference, Value};
use crate::error::{PotError, Result};
use crate::index::Index;
use crate::mode::{SingleOrder, SwarmPot};
use crate::node::Entry;
use crate::store::LoadSaver;

/// Bit depth of the kvs keys (32-byte keys).
const KVS_DEPTH: usize = 256;

/// A concrete entry: 32-byte key, arbitrary byte value. Equality is on the
/// value side; the serialised payload is the value alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmEntry {
    key: Key,
    val: Value,
}

impl SwarmEntry {
    pub fn new(key: Key, val: Value) -> Result<Self> {
        if key.len() != KVS_DEPTH / 8 {
            return Err(PotError::InvalidState(format!(
                "entry key must be {} bytes, got {}",
                KVS_DEPTH / 8,
                key.len()
            )));
        }
        Ok(SwarmEntry { key, val })
    }

    pub fn value(&self) -> &[u8] {
        &self.val
    }
}

impl Entry for SwarmEntry {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn equal(&self, other: &Self) -> bool {
        self.val == other.val
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.val.clone())
    }

    fn unmarshal(key: &[u8], payload: &[u8]) -> Result<Self> {
        SwarmEntry::new(key.to_vec(), payload.to_vec())
    }
}

/// Minimal key-value store over a content-addressed trie.
pub struct SwarmKvs {
    idx: Index<SwarmEntry, SwarmPot<SwarmEntry>>,
}

impl SwarmKvs {
    /// Creates an empty key-value store persisting through `ls`.
    pub fn new(ls: Arc<dyn LoadSaver>) -> Self {
        let mode = SwarmPot::new(SingleOrder::new(KVS_DEPTH), ls);
        SwarmKvs {
            idx: Index::new(mode),
        }
    }

    /// Loads a key-value store from the given root reference.
    pub async fn with_reference(ls: Arc<dyn LoadSaver>, reference: &[u8]) -> Result<Self> {
        let mode = SwarmPot::new(SingleOrder::new(KVS_DEPTH), ls);
        let idx = Index::with_reference(mode, reference).await?;
        Ok(SwarmKvs { idx })
    }

    /// Retrieves the value associated with the given key.
    pub async fn get(&self, key: &[u8]) -> Result<Value> {
        let entry = self.idx.find(key).await?;
        Ok(entry.value().to_vec())
    }

    /// Stores the given key-value pair.
    pub async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let entry = SwarmEntry::new(key.to_vec(), value.to_vec())?;
        self.idx.add(entry).await
    }

    /// Removes the value at the given key.
    pub async fn delete(&self, key: &[u8]) -> Result<()> {
        self.idx.delete(key).await
    }

    /// Persists the store and returns the root reference.
    pub async fn save(&self) -> Result<Reference> {
        self.idx.save().await
    }

    /// The underlying index, for direct trie access (iteration, proofs).
    pub fn index(&self) -> &Index<SwarmEntry, SwarmPot<SwarmEntry>> {
        &self.idx
    }
}
