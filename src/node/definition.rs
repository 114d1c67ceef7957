// pot-rust/src/node/definition.rs

use std::sync::Arc;
use std::sync::OnceLock;

use tokio::sync::OnceCell;

use crate::common::Reference;
use crate::error::{PotError, Result};
use crate::node::Entry;
use crate::store::LoadSaver;

/// In-memory body of a trie node: the pinned entry plus the ordered fork
/// list. Mutable only while a writer assembles an accumulator; once a node
/// is published behind an [`Arc`] it is never modified again.
#[derive(Debug, Clone)]
pub struct MemNode<E> {
    entry: Option<E>,
    forks: Vec<CNode<E>>,
}

impl<E: Entry> MemNode<E> {
    pub fn new() -> Self {
        MemNode {
            entry: None,
            forks: Vec::new(),
        }
    }

    /// Pins an entry to the node, replacing any previous one.
    pub fn pin(&mut self, e: E) {
        self.entry = Some(e);
    }

    pub fn entry(&self) -> Option<&E> {
        self.entry.as_ref()
    }

    /// Key of the pinned entry. Panics if the node is empty; callers check
    /// emptiness before descending.
    pub fn key(&self) -> &[u8] {
        self.entry.as_ref().expect("empty node has no key").key()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// Total number of entries under this node, counting every fork.
    pub fn size(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        1 + self.forks.iter().map(|c| c.size).sum::<usize>()
    }

    /// Appends a fork. Forks arrive in strictly increasing `at` order.
    pub fn append(&mut self, c: CNode<E>) {
        debug_assert!(
            self.forks.last().map_or(true, |last| last.at < c.at),
            "forks must be appended in increasing order"
        );
        self.forks.push(c);
    }

    /// Drops every fork with `at >= from`.
    pub fn truncate(&mut self, from: usize) {
        self.forks.retain(|c| c.at < from);
    }

    /// The fork at exactly proximity order `po`, or an empty cursored node
    /// at `po` if there is none.
    pub fn fork(&self, po: usize) -> CNode<E> {
        match self.forks.iter().find(|c| c.at == po) {
            Some(c) => c.clone(),
            None => CNode::empty(po),
        }
    }

    /// Iterates the forks with `at >= from`, in ascending order.
    pub fn iter_from(&self, from: usize) -> impl Iterator<Item = &CNode<E>> {
        self.forks.iter().filter(move |c| c.at >= from)
    }
}

impl<E: Entry> Default for MemNode<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A trie node shared by the in-memory and the content-addressed modes.
///
/// The body lives in a one-shot cell so a *packed* node (reference only)
/// can be materialised lazily — and idempotently under concurrent readers —
/// from its reference. The reference itself is set exactly once, when the
/// node is saved.
#[derive(Debug)]
pub struct Node<E> {
    mem: OnceCell<MemNode<E>>,
    reference: OnceLock<Reference>,
}

impl<E: Entry> Node<E> {
    /// A fresh empty in-memory node.
    pub fn new() -> Self {
        Node {
            mem: OnceCell::new_with(Some(MemNode::new())),
            reference: OnceLock::new(),
        }
    }

    /// Wraps an assembled body.
    pub fn from_mem(mem: MemNode<E>) -> Self {
        Node {
            mem: OnceCell::new_with(Some(mem)),
            reference: OnceLock::new(),
        }
    }

    /// A packed node: holds only its content address until first access.
    pub fn packed(reference: Reference) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(reference);
        Node {
            mem: OnceCell::new(),
            reference: cell,
        }
    }

    /// The in-memory body, if materialised.
    pub fn mem(&self) -> Option<&MemNode<E>> {
        self.mem.get()
    }

    /// The in-memory body; panics on a packed node. Traversal unpacks
    /// children before reading them, so reaching a packed node here is a
    /// programming error.
    pub fn mem_or_panic(&self) -> &MemNode<E> {
        self.mem.get().expect("node not unpacked")
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.reference.get()
    }

    /// Records the content address of the node. References are
    /// content-derived, so a concurrent duplicate set is benign.
    pub fn set_reference(&self, reference: Reference) {
        let _ = self.reference.set(reference);
    }

    /// True if the node carries neither an entry nor a reference to one.
    pub fn is_empty(&self) -> bool {
        match self.mem.get() {
            Some(m) => m.is_empty(),
            None => self.reference.get().is_none(),
        }
    }

    pub fn size(&self) -> usize {
        self.mem.get().map_or(0, |m| m.size())
    }

    /// Materialises the body from the store, exactly once. Concurrent
    /// callers share the single load.
    pub async fn materialize(&self, ls: &dyn LoadSaver) -> Result<&MemNode<E>> {
        self.mem
            .get_or_try_init(|| async {
                let reference = self.reference.get().ok_or_else(|| {
                    PotError::InvalidState("packed node without reference".to_string())
                })?;
                let data = ls.load(reference.as_slice()).await?;
                MemNode::unmarshal(&data)
            })
            .await
    }
}

impl<E: Entry> Default for Node<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary rendering of a key's first 32 bits, used by trie dumps.
pub fn label(k: &[u8]) -> String {
    if k.is_empty() {
        return "none".to_string();
    }
    let mut bits = [0u8; 4];
    let n = usize::min(4, k.len());
    bits[..n].copy_from_slice(&k[..n]);
    format!("{:032b}", u32::from_be_bytes(bits))
}

impl<E: Entry> MemNode<E> {
    fn write_tree(&self, out: &mut String, from: usize, indent: usize) {
        out.push_str(&label(self.key()));
        out.push('\n');
        for fork in self.iter_from(from) {
            for _ in 0..indent + 1 {
                out.push_str("  ");
            }
            out.push_str(&format!("{}: ", fork.at));
            match fork.node.as_ref().and_then(|n| n.mem()) {
                Some(child) => child.write_tree(out, fork.at + 1, indent + 1),
                None => {
                    let node = fork.node.as_ref().expect("forks are non-empty");
                    let reference = node.reference().map(hex::encode).unwrap_or_default();
                    out.push_str(&format!("packed {}\n", &reference[..8.min(reference.len())]));
                }
            }
        }
    }
}

impl<E: Entry> Node<E> {
    /// Indented dump of the materialised tree, one line per node, keys
    /// rendered as their first 32 bits. Packed sub-trees print as their
    /// reference prefix.
    pub fn dump(&self) -> String {
        match self.mem() {
            Some(mem) if !mem.is_empty() => {
                let mut out = String::new();
                mem.write_tree(&mut out, 0, 0);
                out
            }
            _ => "empty\n".to_string(),
        }
    }
}

/// A cursored node: a node viewed as a fork of its parent, carrying the
/// proximity order `at` at which it is attached and the entry count of the
/// sub-tree it roots (counting only forks at `at + 1` and deeper).
#[derive(Debug, Clone)]
pub struct CNode<E> {
    pub at: usize,
    pub node: Option<Arc<Node<E>>>,
    pub size: usize,
}

impl<E: Entry> CNode<E> {
    /// An empty cursored node at `at`.
    pub fn empty(at: usize) -> Self {
        CNode {
            at,
            node: None,
            size: 0,
        }
    }

    /// Creates a view of `node` attached at `at`, recomputing the size as
    /// one plus the sizes of the forks at `at + 1` and deeper. Requires the
    /// node to be unpacked.
    pub fn new_at(at: usize, node: Option<&Arc<Node<E>>>) -> Self {
        let node = match node {
            Some(n) if !n.is_empty() => n,
            _ => return CNode::empty(at),
        };
        let mem = node.mem_or_panic();
        let size = 1 + mem.iter_from(at + 1).map(|c| c.size).sum::<usize>();
        CNode {
            at,
            node: Some(Arc::clone(node)),
            size,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.node {
            None => true,
            Some(n) => n.is_empty(),
        }
    }

    /// The same node viewed one proximity order deeper, with the fork at
    /// the current order subtracted from the size. The count saturates:
    /// a node re-attached by `whirl` may still hold a superseded fork at
    /// the attachment order that was never part of this view.
    pub fn next(&self) -> Self {
        let node = self.node.as_ref().expect("next on empty cursored node");
        let fork = node.mem_or_panic().fork(self.at);
        CNode {
            at: self.at + 1,
            node: Some(Arc::clone(node)),
            size: self.size.saturating_sub(fork.size),
        }
    }

    /// The entry pinned to the viewed node. Panics if empty.
    pub fn entry(&self) -> &E {
        self.node
            .as_ref()
            .and_then(|n| n.mem_or_panic().entry())
            .expect("empty cursored node has no entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::SwarmEntry;

    fn entry(first: u8) -> SwarmEntry {
        let mut key = vec![0u8; 32];
        key[0] = first;
        SwarmEntry::new(key, vec![first]).unwrap()
    }

    fn leaf(first: u8) -> Arc<Node<SwarmEntry>> {
        let mut mem = MemNode::new();
        mem.pin(entry(first));
        Arc::new(Node::from_mem(mem))
    }

    #[test]
    fn empty_node_has_size_zero() {
        let n: Node<SwarmEntry> = Node::new();
        assert!(n.is_empty());
        assert_eq!(n.size(), 0);
    }

    #[test]
    fn fork_lookup_and_truncate() {
        let mut mem = MemNode::new();
        mem.pin(entry(0));
        mem.append(CNode::new_at(1, Some(&leaf(0x40))));
        mem.append(CNode::new_at(3, Some(&leaf(0x10))));
        assert_eq!(mem.size(), 3);
        assert_eq!(mem.fork(1).at, 1);
        assert!(!mem.fork(1).is_empty());
        assert!(mem.fork(2).is_empty());
        mem.truncate(3);
        assert_eq!(mem.size(), 2);
        assert!(mem.fork(3).is_empty());
    }

    #[test]
    fn new_at_counts_only_deeper_forks() {
        let mut mem = MemNode::new();
        mem.pin(entry(0));
        mem.append(CNode::new_at(0, Some(&leaf(0x80))));
        mem.append(CNode::new_at(2, Some(&leaf(0x20))));
        let node = Arc::new(Node::from_mem(mem));
        // The view at 0 excludes the fork at 0; the node itself counts all.
        assert_eq!(CNode::new_at(0, Some(&node)).size, 2);
        assert_eq!(node.size(), 3);
    }

    #[test]
    fn labels_render_the_leading_bits() {
        assert_eq!(label(&[]), "none");
        let mut key = vec![0u8; 32];
        key[0] = 0x80;
        assert!(label(&key).starts_with("1000"));
        assert_eq!(label(&key).len(), 32);
    }

    #[test]
    fn dump_shows_the_fork_structure() {
        let mut mem = MemNode::new();
        mem.pin(entry(0));
        mem.append(CNode::new_at(0, Some(&leaf(0x80))));
        let node = Node::from_mem(mem);
        let dump = node.dump();
        assert!(dump.contains("0: 1000"));

        let empty: Node<SwarmEntry> = Node::new();
        assert_eq!(empty.dump(), "empty\n");
    }

    #[test]
    fn packed_node_is_not_empty() {
        let n: Node<SwarmEntry> = Node::packed([1u8; 32]);
        assert!(!n.is_empty());
        assert!(n.mem().is_none());
        assert_eq!(n.reference(), Some(&[1u8; 32]));
    }
}
