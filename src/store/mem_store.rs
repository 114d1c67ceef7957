// pot-rust/src/store/mem_store.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bmt::chunk_address;
use crate::common::{Reference, REFERENCE_SIZE};
use crate::error::{PotError, Result};
use crate::store::LoadSaver;

#[derive(Debug, Default)]
struct InMemoryStoreInner {
    data: HashMap<Reference, Vec<u8>>,
}

/// An in-memory `LoadSaver` keyed by the BMT hash of the stored bytes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<InMemoryStoreInner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.data.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.data.is_empty()
    }
}

#[async_trait]
impl LoadSaver for InMemoryStore {
    async fn load(&self, reference: &[u8]) -> Result<Vec<u8>> {
        if reference.len() != REFERENCE_SIZE {
            return Err(PotError::InvalidReference(reference.len()));
        }
        let mut key: Reference = [0u8; REFERENCE_SIZE];
        key.copy_from_slice(reference);
        let guard = self.inner.read().await;
        guard.data.get(&key).cloned().ok_or(PotError::NotFound)
    }

    async fn save(&self, data: Vec<u8>) -> Result<Reference> {
        let reference = chunk_address(&data)?;
        let mut guard = self.inner.write().await;
        guard.data.entry(reference).or_insert(data);
        Ok(reference)
    }
}
