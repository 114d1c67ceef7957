// pot-rust/src/store/persist.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::debug;

use crate::common::Reference;
use crate::error::{PotError, Result};
use crate::node::{Entry, Node};
use crate::store::LoadSaver;

/// Persists a sub-tree post-order and returns the root's content address.
///
/// A node that already carries a reference is skipped together with its
/// children, so retrying after a partial save only writes what is missing,
/// and shared sub-trees across root versions are serialised exactly once.
pub async fn save_tree<E: Entry>(
    ls: &dyn LoadSaver,
    node: &Arc<Node<E>>,
) -> Result<Reference> {
    let reference = save_node(ls, node).await?;
    debug!("saved trie root at {}", hex::encode(reference));
    Ok(reference)
}

fn save_node<'a, E: Entry>(
    ls: &'a dyn LoadSaver,
    node: &'a Arc<Node<E>>,
) -> Pin<Box<dyn Future<Output = Result<Reference>> + Send + 'a>> {
    Box::pin(async move {
        if let Some(reference) = node.reference() {
            return Ok(*reference);
        }
        let mem = node.mem().ok_or_else(|| {
            PotError::InvalidState("unreferenced node without body".to_string())
        })?;
        for fork in mem.iter_from(0) {
            if let Some(child) = &fork.node {
                save_node(ls, child).await?;
            }
        }
        let data = node.marshal()?;
        let reference = ls.save(data).await?;
        node.set_reference(reference);
        Ok(reference)
    })
}
