/*
 * Created on Sun Mar 03 2024
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # critnib
//!
//! An in-memory, concurrent 64-bit-key to opaque-value associative index.
//! It offers identity lookup (like a hashmap, [`CritnibIndex::get`]) and
//! `<=` lookup (like an ordered tree, [`CritnibIndex::find_le`]) over the
//! same structure, with **wait-free reads that take no lock** while a
//! single writer mutates the tree under a global write mutex.
//!
//! Critnib is a hybrid between a radix tree and a crit-bit tree: it's a
//! path-compressed 16-ary (4-bit nibble) radix tree over the key, skipping
//! any level that would have exactly one child. See `SPEC_FULL.md` and
//! `DESIGN.md` for the full design rationale; this module is the public
//! surface described there.
//!
//! Values are opaque, pointer-sized, non-null tokens: the index returns
//! exactly the bit pattern it was given. The value `0` is reserved to mean
//! "no entry" -- `insert(key, 0)` is a no-op that still returns success,
//! and every read operation returns `0` for an absent key, matching the
//! `void*`-based contract this crate's host requirements describe.

mod error;
mod node;
mod reclaim;
mod sync;

pub use error::{Error, IndexResult};

use {
    error::abort_corrupted,
    node::{branch_shift, mask_above, InnerNode, LeafNode, Node, NIB},
    parking_lot::Mutex,
    reclaim::{WriterState, DELETED_LIFE},
    sync::{is_sentinel, AtomicSlot, RemoveCounter, ORD_ACQ, ORD_RLX},
};

/// A concurrent 64-bit critnib index.
///
/// See the crate docs for the contract. All six operations described in
/// spec.md §4.1 are methods here except `new` (the constructor) and
/// `delete`, which is simply dropping the index -- Rust ownership already
/// gives us that for free.
pub struct CritnibIndex {
    root: AtomicSlot,
    removes: RemoveCounter,
    writer: Mutex<WriterState>,
}

impl Default for CritnibIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CritnibIndex {
    /// Allocates a new, empty index.
    pub fn new() -> Self {
        Self {
            root: AtomicSlot::null_sentinel(),
            removes: RemoveCounter::new(),
            writer: Mutex::new(WriterState::new()),
        }
    }

    /// Inserts `key:value`. Returns [`Error::DuplicateKey`] if `key` is
    /// already present, in which case the index is unchanged.
    ///
    /// `value == 0` is a no-op that still returns `Ok(())`: 0 is reserved
    /// to mean "no entry" and is never actually stored.
    pub fn insert(&self, key: u64, value: usize) -> IndexResult<()> {
        if value == 0 {
            return Ok(());
        }
        let mut w = self.writer.lock();
        let leaf = match w.alloc() {
            Some(mut n) => {
                *n = Node::Leaf(LeafNode { key, value });
                n
            }
            None => Box::new(Node::Leaf(LeafNode { key, value })),
        };

        // empty index: the root slot holds the sentinel
        if is_sentinel(self.root.load(ORD_RLX)) {
            self.root.store_rel(Box::into_raw(leaf));
            return Ok(());
        }

        // descend while we're on inner nodes whose path still matches `key`;
        // `parent` always points at the slot that holds `cur`.
        let mut parent: *const AtomicSlot = &self.root;
        let mut cur = self.root.load(ORD_RLX);
        loop {
            let inner = match unsafe { &*cur } {
                Node::Inner(i) if (key & mask_above(i.shift)) == i.path => i,
                _ => break,
            };
            let nib = (key >> inner.shift) & NIB;
            parent = &inner.children[nib as usize];
            cur = unsafe { &*parent }.load(ORD_RLX);
        }

        if is_sentinel(cur) {
            // landed on an empty slot of the last inner node visited
            unsafe { &*parent }.store_rel(Box::into_raw(leaf));
            return Ok(());
        }

        let cur_path = unsafe { &*cur }.path_or_key();
        let diff = cur_path ^ key;
        if diff == 0 {
            // exact match: the key is already present
            debug_assert!(matches!(unsafe { &*cur }, Node::Leaf(_)));
            w.recycle(leaf);
            return Err(Error::DuplicateKey);
        }

        let sh = branch_shift(diff);
        let mut branch = InnerNode::empty(key & mask_above(sh), sh);
        let new_dir = (key >> sh) & NIB;
        let old_dir = (cur_path >> sh) & NIB;
        debug_assert_ne!(new_dir, old_dir);
        // the old subtree is re-attached as-is; only the new leaf is fresh
        branch.children[old_dir as usize].store_rel(cur);
        branch.children[new_dir as usize].store_rel(Box::into_raw(leaf));
        let branch_ptr = Box::into_raw(Box::new(Node::Inner(branch)));
        unsafe { &*parent }.store_rel(branch_ptr);
        Ok(())
    }

    /// Removes `key`, returning the value it was mapped to, or `0` if it
    /// was absent.
    pub fn remove(&self, key: u64) -> usize {
        let mut w = self.writer.lock();
        let pre = self.removes.fetch_add_one();
        let slot = w.advance_ring(pre);

        let root_ptr = self.root.load(ORD_RLX);
        match unsafe { &*root_ptr } {
            Node::Null => return 0,
            Node::Leaf(l) if l.key == key => {
                let value = l.value;
                self.root.store_sentinel_rel();
                w.park(slot, 0, unsafe { Box::from_raw(root_ptr) });
                return value;
            }
            Node::Leaf(_) => return 0,
            Node::Inner(_) => {}
        }

        // descend tracking (n_parent, n) = last inner node and its slot,
        // (k_parent, k) = the leaf we're removing and its slot
        let mut n_parent: *const AtomicSlot = &self.root;
        let mut n_ptr = root_ptr;
        let mut k_parent: *const AtomicSlot = &self.root;
        let mut k_ptr = root_ptr;
        loop {
            let inner = match unsafe { &*k_ptr } {
                Node::Inner(i) => i,
                _ => break,
            };
            n_parent = k_parent;
            n_ptr = k_ptr;
            let nib = (key >> inner.shift) & NIB;
            k_parent = &inner.children[nib as usize];
            k_ptr = unsafe { &*k_parent }.load(ORD_RLX);
        }
        match unsafe { &*k_ptr } {
            Node::Leaf(l) if l.key == key => {}
            _ => return 0,
        }

        unsafe { &*k_parent }.store_sentinel_rel();

        let n_inner = match unsafe { &*n_ptr } {
            Node::Inner(i) => i,
            _ => abort_corrupted("remove: last inner ancestor is not an inner node"),
        };
        let mut only_child: Option<usize> = None;
        let mut multiple = false;
        for (i, child) in n_inner.children.iter().enumerate() {
            if !is_sentinel(child.load(ORD_RLX)) {
                if only_child.is_some() {
                    multiple = true;
                    break;
                }
                only_child = Some(i);
            }
        }

        let value = match unsafe { &*k_ptr } {
            Node::Leaf(l) => l.value,
            _ => abort_corrupted("remove: target slot is not a leaf after match"),
        };

        if multiple {
            // n still has >= 2 children: only the removed leaf goes away
            w.park(slot, 0, unsafe { Box::from_raw(k_ptr) });
        } else {
            // n is now unary (or, transiently, empty): bypass it, and park
            // both n and its former leaf so I2 (>=2 children per inner
            // node) keeps holding for every node readers can still reach
            let idx = only_child.unwrap_or(0);
            let sibling = n_inner.children[idx].load(ORD_RLX);
            unsafe { &*n_parent }.store_rel(sibling);
            w.park(slot, 0, unsafe { Box::from_raw(n_ptr) });
            w.park(slot, 1, unsafe { Box::from_raw(k_ptr) });
        }
        value
    }

    /// Point lookup: returns the value mapped to `key`, or `0` if absent.
    /// Never blocks, never takes the write mutex.
    pub fn get(&self, key: u64) -> usize {
        loop {
            let ws1 = self.removes.snapshot();
            let mut cur = self.root.load(ORD_ACQ);
            let res = loop {
                match unsafe { &*cur } {
                    Node::Null => break 0,
                    Node::Leaf(l) => break if l.key == key { l.value } else { 0 },
                    Node::Inner(i) => {
                        let nib = (key >> i.shift) & NIB;
                        cur = i.children[nib as usize].load(ORD_ACQ);
                    }
                }
            };
            let ws2 = self.removes.snapshot();
            if ws2.wrapping_sub(ws1) < DELETED_LIFE {
                return res;
            }
        }
    }

    /// Predecessor lookup: returns the value of the greatest stored key
    /// `<= q`, or `0` if none exists. Same lock-free, retry-on-staleness
    /// guarantee as [`CritnibIndex::get`].
    pub fn find_le(&self, q: u64) -> usize {
        loop {
            let ws1 = self.removes.snapshot();
            let res = find_le_at(self.root.load(ORD_ACQ), q);
            let ws2 = self.removes.snapshot();
            if ws2.wrapping_sub(ws1) < DELETED_LIFE {
                return res;
            }
        }
    }
}

/// rightmost (greatest-key) leaf reachable from `n`
fn find_successor(mut n: *mut Node) -> usize {
    loop {
        match unsafe { &*n } {
            Node::Leaf(l) => return l.value,
            Node::Null => return 0,
            Node::Inner(inner) => {
                let next = (0..node::SLNODES as u64)
                    .rev()
                    .map(|nib| inner.children[nib as usize].load(ORD_ACQ))
                    .find(|c| !is_sentinel(*c));
                match next {
                    Some(c) => n = c,
                    None => return 0, // unreachable under I2, guarded defensively
                }
            }
        }
    }
}

/// recursive `<=` search rooted at `n`
fn find_le_at(n: *mut Node, q: u64) -> usize {
    match unsafe { &*n } {
        Node::Null => 0,
        Node::Leaf(l) => {
            if l.key <= q {
                l.value
            } else {
                0
            }
        }
        Node::Inner(inner) => {
            let outside = ((q ^ inner.path) >> inner.shift) & !NIB;
            if outside != 0 {
                // the whole subtree is either entirely left of q (its
                // rightmost leaf is the answer) or entirely right (nothing
                // here is useful)
                return if inner.path < q {
                    find_successor(n)
                } else {
                    0
                };
            }
            let nib = (q >> inner.shift) & NIB;
            let value = find_le_at(inner.children[nib as usize].load(ORD_ACQ), q);
            if value != 0 {
                return value;
            }
            // nothing on the exact path: the first non-null sibling to the
            // left holds the answer (its rightmost leaf, if it's a branch)
            for i in (0..nib).rev() {
                let c = inner.children[i as usize].load(ORD_ACQ);
                if !is_sentinel(c) {
                    return match unsafe { &*c } {
                        Node::Leaf(l) => l.value,
                        _ => find_successor(c),
                    };
                }
            }
            0
        }
    }
}

impl Drop for CritnibIndex {
    fn drop(&mut self) {
        unsafe { free_subtree(self.root.load(ORD_RLX)) };
    }
}

unsafe fn free_subtree(n: *mut Node) {
    if is_sentinel(n) {
        return;
    }
    if let Node::Inner(inner) = &*n {
        for child in &inner.children {
            free_subtree(child.load(ORD_RLX));
        }
    }
    drop(Box::from_raw(n));
}

// SAFETY: every pointer this type hands across threads is either the
// process-wide immutable sentinel or a node this index exclusively owns
// and publishes via release stores; all mutation is serialized by `writer`.
unsafe impl Send for CritnibIndex {}
unsafe impl Sync for CritnibIndex {}
