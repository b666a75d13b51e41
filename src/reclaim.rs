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

//! Writer-exclusive bookkeeping: the recycle pool and the pending-deletes
//! ring (§2/§3/§9: "Grace period (`DELETED_LIFE`)", "Pending-dels ring").
//!
//! Both of these are touched only by whichever thread holds the write
//! mutex, which is why they can be plain, safe `Box`-owning collections
//! instead of anything lock-free: there's only ever one writer in flight,
//! by construction (spec.md §5).

use crate::node::Node;

/// A node that has been deleted is left untouched for this many delete
/// cycles. Reads have guaranteed correctness if they took no longer than
/// `DELETED_LIFE` concurrent deletes; otherwise they notice something is
/// wrong and restart. The memory of deleted nodes is never freed to the
/// allocator nor do their pointers lead anywhere outside the index, so a
/// stale read gets a wrong-but-well-typed answer, never a crash.
pub(crate) const DELETED_LIFE: u64 = 16;

/// Owned by the writer for the duration of a call: the free list of
/// recycled node boxes, and the ring of nodes parked by recent removes.
pub(crate) struct WriterState {
    /// pool of freed nodes, reused in LIFO order instead of round-tripping
    /// through the allocator on every insert/remove
    free_list: Vec<Box<Node>>,
    /// nodes removed but not yet eligible for reuse; slot `i` holds what
    /// the `i`-th remove (mod `DELETED_LIFE`) parked, up to two nodes
    /// (a leaf and, when a branch got bypassed, its now-unary parent)
    pending: [[Option<Box<Node>>; 2]; DELETED_LIFE as usize],
}

impl WriterState {
    pub(crate) fn new() -> Self {
        Self {
            free_list: Vec::new(),
            pending: core::array::from_fn(|_| [None, None]),
        }
    }

    /// Take a node from the recycle pool, if any is available.
    #[inline(always)]
    pub(crate) fn alloc(&mut self) -> Option<Box<Node>> {
        self.free_list.pop()
    }

    /// Return a node to the recycle pool. Only ever called with a node
    /// this index owns (the null sentinel is never boxed, so it is never
    /// passed here).
    #[inline(always)]
    pub(crate) fn recycle(&mut self, n: Box<Node>) {
        self.free_list.push(n);
    }

    /// Advance the pending-deletes ring: evict whatever was parked
    /// `DELETED_LIFE` removes ago (now safely reclaimable, since any
    /// reader that could have observed it has since retried) into the
    /// recycle pool, and return the now-empty slot index to park into.
    pub(crate) fn advance_ring(&mut self, pre_increment_count: u64) -> usize {
        let slot = (pre_increment_count % DELETED_LIFE) as usize;
        for parked in self.pending[slot].iter_mut() {
            if let Some(n) = parked.take() {
                self.recycle(n);
            }
        }
        slot
    }

    #[inline(always)]
    pub(crate) fn park(&mut self, slot: usize, i: usize, n: Box<Node>) {
        self.pending[slot][i] = Some(n);
    }
}
