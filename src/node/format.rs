// pot-rust/src/node/format.rs

//! Binary layout of a persisted node.
//!
//! ```text
//! offset 0    key          32 bytes
//! offset 32   bitmap       32 bytes   bit i set ⇔ fork present at at=i
//! offset 64   fork refs    32·k bytes ascending at order
//!             fork sizes   4·k bytes  big-endian u32, same order
//!             padding      to the next 32-byte boundary
//!             entry        remainder  value-side payload
//! ```
//!
//! Bitmap bits are MSB-first within each byte (`mask = 1 << (7 - i % 8)`);
//! the proof verifier depends on this ordering. One chunk holds one node,
//! so the total must stay within the BMT chunk capacity.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};

use crate::bmt::MAX_DATA_LENGTH;
use crate::common::{Reference, MAX_DEPTH, REFERENCE_SIZE};
use crate::error::{PotError, Result};
use crate::node::{CNode, Entry, MemNode, Node};

const KEY_SIZE: usize = 32;
const BITMAP_SIZE: usize = MAX_DEPTH / 8;
const HEADER_SIZE: usize = KEY_SIZE + BITMAP_SIZE;
const SIZE_WORD: usize = 4;

fn bitmap_mask(at: usize) -> u8 {
    1 << (7 - at % 8)
}

/// Zero padding after the fork sizes, aligning the entry payload to a
/// 32-byte segment boundary.
pub fn size_padding(forks: usize) -> usize {
    let taken = (forks * SIZE_WORD) % 32;
    if taken > 0 {
        32 - taken
    } else {
        0
    }
}

/// Byte offset of the entry payload in a node with `forks` forks.
pub fn entry_offset(forks: usize) -> usize {
    HEADER_SIZE + forks * REFERENCE_SIZE + forks * SIZE_WORD + size_padding(forks)
}

impl<E: Entry> Node<E> {
    /// Serialises the node into its single-chunk wire form. Every fork must
    /// already carry a saved child (post-order save guarantees this).
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mem = self.mem().ok_or_else(|| {
            PotError::InvalidState("cannot marshal a packed node".to_string())
        })?;
        let entry = mem
            .entry()
            .ok_or_else(|| PotError::InvalidState("cannot marshal an empty node".to_string()))?;
        let key = entry.key();
        if key.len() != KEY_SIZE {
            return Err(PotError::InvalidBinary(format!(
                "invalid key size: {}",
                key.len()
            )));
        }

        let mut bitmap = [0u8; BITMAP_SIZE];
        let mut refs = Vec::new();
        let mut sizes = Vec::new();
        let mut sbuf = [0u8; SIZE_WORD];
        let mut forks = 0usize;
        for cn in mem.iter_from(0) {
            debug_assert!(cn.at < MAX_DEPTH);
            let child = cn
                .node
                .as_ref()
                .ok_or_else(|| PotError::InvalidState("empty fork in node".to_string()))?;
            let reference = child.reference().ok_or_else(|| {
                PotError::InvalidState("fork child has no reference".to_string())
            })?;
            bitmap[cn.at / 8] |= bitmap_mask(cn.at);
            refs.extend_from_slice(reference);
            BigEndian::write_u32(&mut sbuf, cn.size as u32);
            sizes.extend_from_slice(&sbuf);
            forks += 1;
        }

        let payload = entry.marshal()?;
        let mut buf =
            Vec::with_capacity(entry_offset(forks) + payload.len());
        buf.extend_from_slice(key);
        buf.extend_from_slice(&bitmap);
        buf.extend_from_slice(&refs);
        buf.extend_from_slice(&sizes);
        buf.resize(buf.len() + size_padding(forks), 0);
        buf.extend_from_slice(&payload);

        if buf.len() > MAX_DATA_LENGTH {
            return Err(PotError::InvalidState(format!(
                "node exceeds chunk capacity: {} > {}",
                buf.len(),
                MAX_DATA_LENGTH
            )));
        }
        Ok(buf)
    }
}

impl<E: Entry> MemNode<E> {
    /// Parses a node body from its wire form. Children come out *packed*:
    /// reference and size only, loaded lazily when a traversal visits them.
    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(PotError::InvalidBinary(format!(
                "node too short: {} bytes",
                data.len()
            )));
        }
        let key = &data[..KEY_SIZE];
        let bitmap = &data[KEY_SIZE..HEADER_SIZE];

        let mut ats = Vec::new();
        for i in 0..MAX_DEPTH {
            if bitmap[i / 8] & bitmap_mask(i) != 0 {
                ats.push(i);
            }
        }
        let forks = ats.len();
        let offset = entry_offset(forks);
        if data.len() < offset {
            return Err(PotError::InvalidBinary(format!(
                "truncated node: {} forks need {} bytes, got {}",
                forks,
                offset,
                data.len()
            )));
        }

        let mut mem = MemNode::new();
        let refs = &data[HEADER_SIZE..];
        let sizes = &data[HEADER_SIZE + forks * REFERENCE_SIZE..];
        for (i, at) in ats.into_iter().enumerate() {
            let mut reference: Reference = [0u8; REFERENCE_SIZE];
            reference.copy_from_slice(&refs[i * REFERENCE_SIZE..(i + 1) * REFERENCE_SIZE]);
            let size = BigEndian::read_u32(&sizes[i * SIZE_WORD..(i + 1) * SIZE_WORD]) as usize;
            mem.append(CNode {
                at,
                node: Some(Arc::new(Node::packed(reference))),
                size,
            });
        }

        let entry = E::unmarshal(key, &data[offset..])?;
        mem.pin(entry);
        Ok(mem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvs::SwarmEntry;

    fn entry(key_first: u8, val: &[u8]) -> SwarmEntry {
        let mut key = vec![0u8; 32];
        key[0] = key_first;
        SwarmEntry::new(key, val.to_vec()).unwrap()
    }

    fn saved_leaf(key_first: u8, reference: Reference) -> Arc<Node<SwarmEntry>> {
        let mut mem = MemNode::new();
        mem.pin(entry(key_first, &[key_first]));
        let node = Node::from_mem(mem);
        node.set_reference(reference);
        Arc::new(node)
    }

    #[test]
    fn bitmap_is_msb_first() {
        let mut mem = MemNode::new();
        mem.pin(entry(0, b"v"));
        mem.append(CNode::new_at(0, Some(&saved_leaf(0x80, [1u8; 32]))));
        mem.append(CNode::new_at(9, Some(&saved_leaf(0x40, [2u8; 32]))));
        let data = Node::from_mem(mem).marshal().unwrap();
        // at=0: top bit of byte 0; at=9: second-highest bit of byte 1.
        assert_eq!(data[32], 0x80);
        assert_eq!(data[33], 0x40);
    }

    #[test]
    fn round_trip_preserves_forks_and_entry() {
        let mut mem = MemNode::new();
        mem.pin(entry(0, b"payload"));
        mem.append(CNode::new_at(1, Some(&saved_leaf(0x40, [1u8; 32]))));
        mem.append(CNode::new_at(12, Some(&saved_leaf(0x08, [2u8; 32]))));
        let data = Node::from_mem(mem).marshal().unwrap();

        let back: MemNode<SwarmEntry> = MemNode::unmarshal(&data).unwrap();
        assert_eq!(back.entry().unwrap().value(), b"payload");
        let fork = back.fork(1);
        assert_eq!(fork.size, 1);
        assert_eq!(
            fork.node.unwrap().reference(),
            Some(&[1u8; 32])
        );
        let fork = back.fork(12);
        assert_eq!(fork.node.unwrap().reference(), Some(&[2u8; 32]));
        assert!(back.fork(2).is_empty());
    }

    #[test]
    fn entry_payload_is_segment_aligned() {
        let mut mem = MemNode::new();
        mem.pin(entry(0, b"abc"));
        mem.append(CNode::new_at(3, Some(&saved_leaf(0x10, [3u8; 32]))));
        let data = Node::from_mem(mem).marshal().unwrap();
        let offset = entry_offset(1);
        assert_eq!(offset % 32, 0);
        assert_eq!(&data[offset..], b"abc");
    }

    #[test]
    fn unsaved_child_is_rejected() {
        let mut child = MemNode::new();
        child.pin(entry(0x80, b"c"));
        let child = Arc::new(Node::from_mem(child));
        let mut mem = MemNode::new();
        mem.pin(entry(0, b"v"));
        mem.append(CNode::new_at(0, Some(&child)));
        assert!(matches!(
            Node::from_mem(mem).marshal(),
            Err(PotError::InvalidState(_))
        ));
    }

    #[test]
    fn malformed_buffers_are_rejected() {
        assert!(matches!(
            MemNode::<SwarmEntry>::unmarshal(&[0u8; 10]),
            Err(PotError::InvalidBinary(_))
        ));
        // Bitmap claims a fork but the refs section is missing.
        let mut data = vec![0u8; 64];
        data[32] = 0x80;
        assert!(matches!(
            MemNode::<SwarmEntry>::unmarshal(&data),
            Err(PotError::InvalidBinary(_))
        ));
    }
}
