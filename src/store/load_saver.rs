// pot-rust/src/store/load_saver.rs

use async_trait::async_trait;

use crate::common::Reference;
use crate::error::Result;

/// Content-addressed byte blob store.
///
/// A reference is the BMT hash (with span) of the stored bytes, so saves of
/// identical content are idempotent and concurrent saves of the same node
/// commute. Implementations are thin wrappers around persistent or remote
/// key-value storage.
#[async_trait]
pub trait LoadSaver: Send + Sync + 'static {
    /// Retrieves the bytes stored under a 32-byte reference.
    async fn load(&self, reference: &[u8]) -> Result<Vec<u8>>;

    /// Persists the bytes and returns their content address.
    async fn save(&self, data: Vec<u8>) -> Result<Reference>;
}
