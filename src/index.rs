// pot-rust/src/index.rs

//! Thread-safe façade over a trie root: any number of concurrent readers,
//! one writer at a time, commit by atomically swapping the root pointer.
//!
//! Readers take a snapshot `Arc` of the current root and work on it without
//! further coordination — roots are immutable once published. A writer
//! holds the async write token for the whole update and publishes (or not)
//! in one pointer swap; a writer whose future is dropped mid-flight simply
//! releases the token, leaving the original root in place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::common::Reference;
use crate::error::{PotError, Result};
use crate::mode::Mode;
use crate::node::{Entry, Node};
use crate::ops;

/// A mutable proximity-order trie.
pub struct Index<E: Entry, M: Mode<E>> {
    mode: Arc<M>,
    root: RwLock<Arc<Node<E>>>,
    write: Mutex<()>,
    closed: AtomicBool,
}

impl<E: Entry, M: Mode<E>> Index<E, M> {
    /// Constructs an empty mutable trie.
    pub fn new(mode: M) -> Self {
        let root = mode.new_node();
        Index {
            mode: Arc::new(mode),
            root: RwLock::new(root),
            write: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Constructs a mutable trie over a persisted root.
    pub async fn with_reference(mode: M, reference: &[u8]) -> Result<Self> {
        let root = mode.load(reference).await?.ok_or_else(|| {
            PotError::InvalidState("root not loaded from persistent storage".to_string())
        })?;
        Ok(Index {
            mode: Arc::new(mode),
            root: RwLock::new(root),
            write: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    fn guard(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PotError::Cancelled);
        }
        Ok(())
    }

    /// The current root; an immutable snapshot unaffected by later writes.
    pub fn snapshot(&self) -> Arc<Node<E>> {
        self.root.read().expect("root lock poisoned").clone()
    }

    fn publish(&self, root: Arc<Node<E>>) {
        *self.root.write().expect("root lock poisoned") = root;
    }

    /// Inserts an entry.
    pub async fn add(&self, e: E) -> Result<()> {
        let k = e.key().to_vec();
        self.update(&k, move |_| Some(e.clone())).await
    }

    /// Removes the entry at the given key. Absent keys are a no-op.
    pub async fn delete(&self, k: &[u8]) -> Result<()> {
        self.update(k, |_| None).await
    }

    /// Applies `f` to the entry at `k` under the write token and publishes
    /// the resulting root. A `None` result from the update keeps the
    /// current root.
    pub async fn update<F>(&self, k: &[u8], f: F) -> Result<()>
    where
        F: Fn(Option<&E>) -> Option<E> + Send + Sync,
    {
        self.guard()?;
        let _token = self.write.lock().await;
        self.guard()?;
        let root = self.snapshot();
        if let Some(updated) = self.mode.update(&root, k, &f).await? {
            self.publish(updated);
        }
        Ok(())
    }

    /// Retrieves the entry at the given key, or `NotFound`.
    pub async fn find(&self, k: &[u8]) -> Result<E> {
        self.guard()?;
        let root = self.snapshot();
        ops::find(&root, k, self.mode.as_ref()).await
    }

    /// Walks the entries under `prefix` in ascending proximity-order
    /// distance from `target`, over a snapshot of the root.
    pub async fn iterate<F>(&self, prefix: &[u8], target: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&E) -> Result<bool> + Send,
    {
        self.guard()?;
        let root = self.snapshot();
        ops::iterate(&root, prefix, target, self.mode.as_ref(), &mut f).await
    }

    /// Number of entries in the trie.
    pub fn size(&self) -> usize {
        self.snapshot().size()
    }

    /// Persists the current root and returns its reference. Fails with
    /// `InvalidState` on an empty trie.
    pub async fn save(&self) -> Result<Reference> {
        self.guard()?;
        let root = self.snapshot();
        if root.is_empty() {
            return Err(PotError::InvalidState(
                "cannot save an empty trie".to_string(),
            ));
        }
        self.mode.save(&root).await
    }

    /// Closes the index: waits for an in-flight writer, then fails every
    /// subsequent operation with `Cancelled`.
    pub async fn close(&self) {
        let _token = self.write.lock().await;
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Pretty-prints the current state of the trie.
    pub fn dump(&self) -> String {
        self.snapshot().dump()
    }

    pub fn mode(&self) -> &M {
        self.mode.as_ref()
    }
}
