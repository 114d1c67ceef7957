// pot-rust/src/ops.rs

//! Proximity-order computation and the structural trie operations.
//!
//! The three combinators (`wedge`, `whirl`, `whack`) assemble fresh
//! accumulator nodes out of existing ones without mutating their inputs;
//! `update` drives them into copy-on-write insertion, replacement and
//! deletion. All traversal unpacks packed children through the mode before
//! reading them, so persisted tries load lazily.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::common::MAX_DEPTH;
use crate::error::{PotError, Result};
use crate::mode::Mode;
use crate::node::{CNode, Entry, MemNode, Node};

/// Update callback: maps the current entry (if any) to its replacement.
/// Returning `None` deletes; returning an equal entry is a no-op.
pub type UpdateFn<'a, E> = dyn Fn(Option<&E>) -> Option<E> + Send + Sync + 'a;

/// Returns the index of the first bit at which `one` and `other` differ,
/// starting the scan at bit `pos`. Bits are MSB-first within a byte. If no
/// bit differs within the shorter input, returns `8 * other.len()`.
pub fn po(one: &[u8], other: &[u8], pos: usize) -> usize {
    let mut i = pos / 8;
    while i < one.len() && i < other.len() {
        if one[i] != other[i] {
            let oxo = one[i] ^ other[i];
            let start = if i == pos / 8 { pos % 8 } else { 0 };
            for j in start..8 {
                if (oxo >> (7 - j)) & 0x01 != 0 {
                    return i * 8 + j;
                }
            }
        }
        i += 1;
    }
    other.len() * 8
}

/// Truncates `dst`'s forks to those with `at < from`, then copies every
/// fork of `src` with `at` in `[from, to)`, preserving order.
fn append_range<E: Entry>(dst: &mut MemNode<E>, src: &MemNode<E>, from: usize, to: usize) {
    dst.truncate(from);
    for c in src.iter_from(from) {
        if c.at >= to {
            break;
        }
        dst.append(c.clone());
    }
}

/// Splices `m` in at its position among `n`'s forks and keeps `n`'s entry
/// pinned.
pub fn wedge<E: Entry>(acc: &mut MemNode<E>, n: &CNode<E>, m: &CNode<E>) {
    let n_node = n.node.as_ref().expect("wedge on empty node");
    append_range(acc, n_node.mem_or_panic(), n.at, m.at);
    if !m.is_empty() {
        acc.append(m.clone());
    }
    append_range(acc, n_node.mem_or_panic(), m.at + 1, MAX_DEPTH);
    acc.pin(n.entry().clone());
}

/// Demotes `n` to a fork at `m`'s position and pins `m`'s entry: used when
/// the new node takes over the position and `n` is re-rooted under it.
pub fn whirl<E: Entry>(acc: &mut MemNode<E>, n: &CNode<E>, m: &CNode<E>) {
    let n_node = n.node.as_ref().expect("whirl on empty node");
    append_range(acc, n_node.mem_or_panic(), n.at, m.at);
    acc.append(CNode::new_at(m.at, Some(n_node)));
    acc.pin(m.entry().clone());
}

/// Merges `m` over `n`: `n` becomes a fork at `m`'s position (unless that
/// position is the maximum depth), `m`'s deeper forks and entry take over.
/// Used on replacement and deletion.
pub fn whack<E: Entry>(acc: &mut MemNode<E>, n: &CNode<E>, m: &CNode<E>) {
    let n_node = n.node.as_ref().expect("whack on empty node");
    let m_node = m.node.as_ref().expect("whack with empty other node");
    append_range(acc, n_node.mem_or_panic(), n.at, m.at);
    if m.at < MAX_DEPTH {
        acc.append(CNode::new_at(m.at, Some(n_node)));
    }
    append_range(acc, m_node.mem_or_panic(), m.at + 1, MAX_DEPTH);
    acc.pin(m.entry().clone());
}

/// The highest-order fork of the viewed node, if any.
fn find_fork<E: Entry>(cn: &CNode<E>) -> Option<CNode<E>> {
    let node = cn.node.as_ref()?;
    node.mem_or_panic().iter_from(cn.at).last().cloned()
}

/// Finds the fork of `c` matching the key, unpacking it first. Returns the
/// empty cursored node and `true` when the pinned entry itself matches.
pub async fn find_next<E: Entry, M: Mode<E>>(
    c: &CNode<E>,
    k: &[u8],
    mode: &M,
) -> Result<(CNode<E>, bool)> {
    let node = c.node.as_ref().expect("find_next on empty node");
    let mem = node.mem_or_panic();
    let po = po(mem.key(), k, c.at);
    if po < mode.depth() && po < 8 * k.len() {
        let cn = mem.fork(po);
        if let Some(child) = &cn.node {
            mode.unpack(child).await?;
        }
        Ok((cn, false))
    } else {
        Ok((CNode::empty(mode.depth()), true))
    }
}

/// Finds the entry of a key, or `NotFound`.
pub async fn find<E: Entry, M: Mode<E>>(
    root: &Arc<Node<E>>,
    k: &[u8],
    mode: &M,
) -> Result<E> {
    let mut cn = CNode::new_at(0, Some(root));
    loop {
        if cn.is_empty() {
            return Err(PotError::NotFound);
        }
        let (m, matched) = find_next(&cn, k, mode).await?;
        if matched {
            return Ok(cn.entry().clone());
        }
        cn = m;
    }
}

/// Walks all entries under the sub-tree selected by `prefix`, in ascending
/// proximity-order distance from `target` (closest first). The callback
/// returns `true` to stop early.
pub async fn iterate<E, M, F>(
    root: &Arc<Node<E>>,
    prefix: &[u8],
    target: &[u8],
    mode: &M,
    f: &mut F,
) -> Result<()>
where
    E: Entry,
    M: Mode<E>,
    F: FnMut(&E) -> Result<bool> + Send,
{
    let mut cn = CNode::new_at(0, Some(root));
    let start = loop {
        if cn.is_empty() {
            return Ok(());
        }
        let (m, matched) = find_next(&cn, prefix, mode).await?;
        if matched {
            break cn.node.clone().expect("matched node is present");
        }
        cn = m;
    };
    iterate_view(&start, 8 * prefix.len(), target, mode, f).await?;
    Ok(())
}

/// Emits the entries of `node`'s sub-tree considering only forks at `from`
/// and deeper: first the fork agreeing longest with the target, then the
/// pinned side, then shallower forks in decreasing order.
fn iterate_view<'a, E, M, F>(
    node: &'a Arc<Node<E>>,
    from: usize,
    target: &'a [u8],
    mode: &'a M,
    f: &'a mut F,
) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>
where
    E: Entry,
    M: Mode<E>,
    F: FnMut(&E) -> Result<bool> + Send,
{
    Box::pin(async move {
        let mem = node.mem_or_panic();
        let po = po(mem.key(), target, from);
        let split = if po < mode.depth() && po < 8 * target.len() {
            let cn = mem.fork(po);
            if let Some(child) = &cn.node {
                mode.unpack(child).await?;
                if iterate_view(child, cn.at + 1, target, mode, &mut *f).await? {
                    return Ok(true);
                }
            }
            if iterate_view(node, po + 1, target, mode, &mut *f).await? {
                return Ok(true);
            }
            po
        } else {
            let entry = mem.entry().expect("non-empty node has an entry");
            if f(entry)? {
                return Ok(true);
            }
            MAX_DEPTH
        };
        let lower: Vec<CNode<E>> = mem
            .iter_from(from)
            .filter(|c| c.at < split)
            .cloned()
            .collect();
        for c in lower.iter().rev() {
            let child = c.node.as_ref().expect("forks are non-empty");
            mode.unpack(child).await?;
            if iterate_view(child, c.at + 1, target, mode, &mut *f).await? {
                return Ok(true);
            }
        }
        Ok(false)
    })
}

/// Copy-on-write update of the trie at `k`, driven by `f`. Returns the new
/// root, or `None` when the update is a no-op and the caller keeps the old
/// one. The resulting root is packed through the mode.
pub async fn update<E: Entry, M: Mode<E>>(
    root: &Arc<Node<E>>,
    k: &[u8],
    f: &UpdateFn<'_, E>,
    mode: &M,
) -> Result<Option<Arc<Node<E>>>> {
    let cn = CNode::new_at(0, Some(root));
    let updated = update_node(MemNode::new(), cn, k, f, mode).await?;
    if let Some(node) = &updated {
        mode.pack(node).await?;
    }
    Ok(updated)
}

fn update_node<'a, E: Entry, M: Mode<E>>(
    mut acc: MemNode<E>,
    cn: CNode<E>,
    k: &'a [u8],
    f: &'a UpdateFn<'a, E>,
    mode: &'a M,
) -> Pin<Box<dyn Future<Output = Result<Option<Arc<Node<E>>>>> + Send + 'a>> {
    Box::pin(async move {
        if cn.is_empty() {
            return Ok(match f(None) {
                None => None,
                Some(e) => {
                    acc.pin(e);
                    Some(Arc::new(Node::from_mem(acc)))
                }
            });
        }
        let (cm, matched) = find_next(&cn, k, mode).await?;
        if matched {
            let orig = cn.entry().clone();
            return match f(Some(&orig)) {
                None => Ok(Some(pull(acc, cn, mode).await?)),
                Some(e) if e.equal(&orig) => Ok(None),
                Some(e) => {
                    let mut fresh = MemNode::new();
                    fresh.pin(e);
                    let fresh = Arc::new(Node::from_mem(fresh));
                    whack(&mut acc, &cn, &CNode::new_at(mode.depth(), Some(&fresh)));
                    Ok(Some(Arc::new(Node::from_mem(acc))))
                }
            };
        }
        if cm.is_empty() {
            return Ok(match f(None) {
                None => None,
                Some(e) => {
                    let mut fresh = MemNode::new();
                    fresh.pin(e);
                    let fresh = Arc::new(Node::from_mem(fresh));
                    whirl(&mut acc, &cn, &CNode::new_at(cm.at, Some(&fresh)));
                    Some(Arc::new(Node::from_mem(acc)))
                }
            });
        }
        if cm.at == 0 {
            // The fork shares no prefix with the pin; rebuild the root
            // around the updated sub-tree.
            let res = match update_node(acc, cm.clone(), k, f, mode).await? {
                None => return Ok(None),
                Some(res) => res,
            };
            if res.is_empty() {
                // The fork's sub-tree dissolved entirely: close the hole.
                let mut acc = MemNode::new();
                wedge(&mut acc, &cn, &CNode::empty(0));
                return Ok(Some(Arc::new(Node::from_mem(acc))));
            }
            let cmr = CNode::new_at(0, Some(&res));
            if mode.down(&cmr) {
                let mut acc = MemNode::new();
                wedge(&mut acc, &cn, &cmr);
                return Ok(Some(Arc::new(Node::from_mem(acc))));
            }
            let mut n = MemNode::new();
            whack(&mut n, &cmr, &cn);
            return Ok(Some(Arc::new(Node::from_mem(n))));
        }
        if mode.down(&cm) {
            let res = match update_node(MemNode::new(), cm.clone(), k, f, mode).await? {
                None => return Ok(None),
                Some(res) => res,
            };
            wedge(&mut acc, &cn, &CNode::new_at(cm.at, Some(&res)));
            return Ok(Some(Arc::new(Node::from_mem(acc))));
        }
        whirl(&mut acc, &cn, &cm);
        update_node(acc, cm.next(), k, f, mode).await
    })
}

/// Removes the entry at the viewed node, promoting its highest-order fork
/// and tail-folding the remaining closer forks under the promoted one.
async fn pull<E: Entry, M: Mode<E>>(
    mut acc: MemNode<E>,
    cn: CNode<E>,
    mode: &M,
) -> Result<Arc<Node<E>>> {
    if mode.up().is_some() {
        // Extension point for alternative promotion policies.
        return Err(PotError::InvalidState(
            "promotion predicates are not supported".to_string(),
        ));
    }
    if let Some(cm) = find_fork(&cn) {
        let child = cm.node.as_ref().expect("forks are non-empty");
        mode.unpack(child).await?;
        wedge(&mut acc, &cn, &CNode::empty(cm.at));
        return pull_tail(acc, cm.next(), mode).await;
    }
    // No forks under the deleted entry: the node dissolves and the hole is
    // closed one order up.
    if cn.at == 0 {
        // singleton pot
        return Ok(Arc::new(Node::new()));
    }
    let j = cn.at - 1;
    let prev = acc.fork(j);
    acc.truncate(j);
    match &prev.node {
        None => Ok(Arc::new(Node::new())),
        Some(node) => {
            mode.unpack(node).await?;
            wedge(&mut acc, &CNode::new_at(j, Some(node)), &CNode::empty(j));
            Ok(Arc::new(Node::from_mem(acc)))
        }
    }
}

fn pull_tail<'a, E: Entry, M: Mode<E>>(
    mut acc: MemNode<E>,
    cn: CNode<E>,
    mode: &'a M,
) -> Pin<Box<dyn Future<Output = Result<Arc<Node<E>>>> + Send + 'a>> {
    Box::pin(async move {
        match find_fork(&cn) {
            None => {
                wedge(&mut acc, &cn, &CNode::empty(mode.depth()));
                Ok(Arc::new(Node::from_mem(acc)))
            }
            Some(cm) => {
                let child = cm.node.as_ref().expect("forks are non-empty");
                mode.unpack(child).await?;
                whirl(&mut acc, &cn, &cm);
                pull_tail(acc, cm.next(), mode).await
            }
        }
    })
}
