// pot-rust/src/mode.rs

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::common::{Reference, MAX_DEPTH, REFERENCE_SIZE};
use crate::error::{PotError, Result};
use crate::node::{CNode, Entry, Node};
use crate::ops::{self, UpdateFn};
use crate::store::{save_tree, LoadSaver};

/// Strategy object parameterising the trie: key depth, node construction,
/// pack/unpack hooks, the insertion policy `down`, the promotion policy
/// `up`, and the persistence entry points.
#[async_trait]
pub trait Mode<E: Entry>: Send + Sync + 'static {
    /// Maximum bit length of a key.
    fn depth(&self) -> usize;

    /// Constructs a fresh empty node.
    fn new_node(&self) -> Arc<Node<E>>;

    /// Dictates the insertion policy: whether to recurse into the given
    /// fork instead of re-rooting around it.
    fn down(&self, c: &CNode<E>) -> bool;

    /// Selects which node to promote after a deletion; `None` uses the
    /// default prefix-preserving promotion.
    fn up(&self) -> Option<fn(&CNode<E>) -> bool>;

    /// Mode-specific saving of a freshly built node.
    async fn pack(&self, n: &Arc<Node<E>>) -> Result<()>;

    /// Mode-specific loading of a packed node.
    async fn unpack(&self, n: &Arc<Node<E>>) -> Result<()>;

    /// Loads a trie root from a reference, or `None` when the mode has no
    /// persistent backing.
    async fn load(&self, reference: &[u8]) -> Result<Option<Arc<Node<E>>>>;

    /// Persists the given root and returns its reference.
    async fn save(&self, root: &Arc<Node<E>>) -> Result<Reference>;

    /// Mode-specific update; the default proxies to the shared recursion.
    async fn update(
        &self,
        root: &Arc<Node<E>>,
        key: &[u8],
        f: &UpdateFn<'_, E>,
    ) -> Result<Option<Arc<Node<E>>>>
    where
        Self: Sized,
    {
        ops::update(root, key, f, self).await
    }
}

/// In-memory mode over fixed-depth keys: no persistence, insertions never
/// descend (`down` is always false) and deletions use the default
/// promotion.
#[derive(Debug, Clone, Copy)]
pub struct SingleOrder {
    depth: usize,
}

impl SingleOrder {
    pub fn new(depth: usize) -> Self {
        if depth == 0 || depth > MAX_DEPTH || depth % 8 != 0 {
            panic!("invalid depth {depth}: must be a multiple of 8 up to {MAX_DEPTH}");
        }
        SingleOrder { depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[async_trait]
impl<E: Entry> Mode<E> for SingleOrder {
    fn depth(&self) -> usize {
        self.depth
    }

    fn new_node(&self) -> Arc<Node<E>> {
        Arc::new(Node::new())
    }

    fn down(&self, _c: &CNode<E>) -> bool {
        false
    }

    fn up(&self) -> Option<fn(&CNode<E>) -> bool> {
        None
    }

    async fn pack(&self, _n: &Arc<Node<E>>) -> Result<()> {
        Ok(())
    }

    async fn unpack(&self, _n: &Arc<Node<E>>) -> Result<()> {
        Ok(())
    }

    async fn load(&self, _reference: &[u8]) -> Result<Option<Arc<Node<E>>>> {
        Ok(None)
    }

    async fn save(&self, _root: &Arc<Node<E>>) -> Result<Reference> {
        Err(PotError::InvalidState(
            "in-memory mode has no persistence".to_string(),
        ))
    }
}

/// Content-addressed mode: nodes pack into single chunks through a
/// [`LoadSaver`] and children load lazily on first traversal.
pub struct SwarmPot<E> {
    base: SingleOrder,
    ls: Arc<dyn LoadSaver>,
    _entry: PhantomData<fn() -> E>,
}

impl<E: Entry> SwarmPot<E> {
    pub fn new(base: SingleOrder, ls: Arc<dyn LoadSaver>) -> Self {
        SwarmPot {
            base,
            ls,
            _entry: PhantomData,
        }
    }

    pub fn load_saver(&self) -> &Arc<dyn LoadSaver> {
        &self.ls
    }
}

#[async_trait]
impl<E: Entry> Mode<E> for SwarmPot<E> {
    fn depth(&self) -> usize {
        self.base.depth()
    }

    fn new_node(&self) -> Arc<Node<E>> {
        Arc::new(Node::new())
    }

    fn down(&self, c: &CNode<E>) -> bool {
        Mode::<E>::down(&self.base, c)
    }

    fn up(&self) -> Option<fn(&CNode<E>) -> bool> {
        Mode::<E>::up(&self.base)
    }

    /// Persists the sub-tree rooted at `n`; nodes that already carry a
    /// reference are skipped, so repeated packs only write the fresh path.
    async fn pack(&self, n: &Arc<Node<E>>) -> Result<()> {
        if n.is_empty() {
            return Ok(());
        }
        save_tree(self.ls.as_ref(), n).await?;
        Ok(())
    }

    /// Materialises a packed node; idempotent and shared under concurrent
    /// traversals.
    async fn unpack(&self, n: &Arc<Node<E>>) -> Result<()> {
        n.materialize(self.ls.as_ref()).await?;
        Ok(())
    }

    async fn load(&self, reference: &[u8]) -> Result<Option<Arc<Node<E>>>> {
        if reference.len() != REFERENCE_SIZE {
            return Err(PotError::InvalidReference(reference.len()));
        }
        let mut r: Reference = [0u8; REFERENCE_SIZE];
        r.copy_from_slice(reference);
        let root = Arc::new(Node::packed(r));
        root.materialize(self.ls.as_ref()).await?;
        debug!("loaded trie root from {}", hex::encode(r));
        Ok(Some(root))
    }

    async fn save(&self, root: &Arc<Node<E>>) -> Result<Reference> {
        if root.is_empty() {
            return Err(PotError::InvalidState(
                "cannot save an empty trie".to_string(),
            ));
        }
        save_tree(self.ls.as_ref(), root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::SwarmEntry;
    use crate::store::InMemoryStore;

    #[test]
    #[should_panic]
    fn zero_depth_is_rejected() {
        SingleOrder::new(0);
    }

    #[tokio::test]
    async fn single_order_has_no_persistence() {
        let mode = SingleOrder::new(256);
        let loaded: Option<Arc<Node<SwarmEntry>>> = mode.load(&[0u8; 32]).await.unwrap();
        assert!(loaded.is_none());
        let root: Arc<Node<SwarmEntry>> = Mode::<SwarmEntry>::new_node(&mode);
        assert!(matches!(
            Mode::<SwarmEntry>::save(&mode, &root).await,
            Err(PotError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn swarm_pot_rejects_short_references() {
        let mode: SwarmPot<SwarmEntry> =
            SwarmPot::new(SingleOrder::new(256), Arc::new(InMemoryStore::new()));
        assert!(matches!(
            mode.load(&[0u8; 16]).await,
            Err(PotError::InvalidReference(16))
        ));
    }
}
