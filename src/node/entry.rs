// pot-rust/src/node/entry.rs

use std::fmt::Debug;

use crate::error::Result;

/// The user payload pinned to a trie node.
///
/// The key is fixed-length (`depth / 8` bytes); `marshal` covers only the
/// value-side payload — the key travels separately and is handed back to
/// `unmarshal`, so it is never stored twice.
pub trait Entry: Clone + Debug + Send + Sync + 'static {
    /// The key of the entry.
    fn key(&self) -> &[u8];

    /// Value-side semantic equality, used to short-circuit no-op updates.
    fn equal(&self, other: &Self) -> bool;

    /// Serialises the value-side payload.
    fn marshal(&self) -> Result<Vec<u8>>;

    /// Reconstructs an entry from its key and serialised payload.
    fn unmarshal(key: &[u8], payload: &[u8]) -> Result<Self>;
}
