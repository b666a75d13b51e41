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

//! Atomic plumbing for the tree's child slots.
//!
//! Every structural publication (§5 of the design) is a single release
//! store of a pointer-sized slot; every read-path load is an acquire load.
//! This module centralizes those orderings the way `engine::sync::atm` does
//! for the reference engine's concurrent hash trie, just over a raw
//! [`AtomicPtr`] instead of an epoch-managed pointer -- this crate's
//! reclamation is the bounded remove-counter scheme from spec.md §4, not
//! generic epoch GC, so there's no `Guard` to thread through.

use crate::node::Node;
use core::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

pub(crate) const ORD_ACQ: Ordering = Ordering::Acquire;
pub(crate) const ORD_REL: Ordering = Ordering::Release;
pub(crate) const ORD_RLX: Ordering = Ordering::Relaxed;

/// The shared, immutable, process-wide null sentinel (§3, Data Model).
///
/// Every empty child slot and a freshly-destroyed root point here instead
/// of at a bare null pointer, so descent never has to special-case "this
/// pointer is 0" -- it matches on [`Node::Null`] like any other node shape.
static NULL_NODE: Node = Node::Null;

#[inline(always)]
fn sentinel_ptr() -> *mut Node {
    &NULL_NODE as *const Node as *mut Node
}

#[inline(always)]
pub(crate) fn is_sentinel(p: *mut Node) -> bool {
    core::ptr::eq(p, sentinel_ptr())
}

/// One tree slot: the root, or one of an [`crate::node::InnerNode`]'s 16
/// children.
pub(crate) struct AtomicSlot(AtomicPtr<Node>);

impl AtomicSlot {
    #[inline(always)]
    pub(crate) fn null_sentinel() -> Self {
        Self(AtomicPtr::new(sentinel_ptr()))
    }

    #[inline(always)]
    pub(crate) fn load(&self, ord: Ordering) -> *mut Node {
        self.0.load(ord)
    }

    #[inline(always)]
    pub(crate) fn load_acq(&self) -> *mut Node {
        self.0.load(ORD_ACQ)
    }

    /// Publish a new node into this slot. This is the only kind of
    /// structural edit a writer performs, and it is always a release store
    /// (I2/I5): readers that acquire-load this slot afterwards see a fully
    /// formed node, never a torn one.
    #[inline(always)]
    pub(crate) fn store_rel(&self, p: *mut Node) {
        self.0.store(p, ORD_REL);
    }

    #[inline(always)]
    pub(crate) fn store_sentinel_rel(&self) {
        self.store_rel(sentinel_ptr());
    }
}

/// The shared remove counter (§4/§5): writers bump it once per `remove`;
/// readers snapshot it before and after a descent and retry if it advanced
/// by `DELETED_LIFE` or more, which is the only signal a reader ever needs
/// that a node it might have dereferenced could have been recycled.
pub(crate) struct RemoveCounter(AtomicU64);

impl RemoveCounter {
    pub(crate) const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline(always)]
    pub(crate) fn snapshot(&self) -> u64 {
        self.0.load(ORD_ACQ)
    }

    /// Returns the pre-increment value, matching `util_fetch_and_add64`'s
    /// return convention in the source this crate is grounded on.
    #[inline(always)]
    pub(crate) fn fetch_add_one(&self) -> u64 {
        self.0.fetch_add(1, ORD_REL)
    }
}
