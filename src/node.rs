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

//! Node shapes for the critnib tree.
//!
//! Critnib is a hybrid between a radix tree and a crit-bit tree: it skips
//! levels that would have exactly one child, so every [`InnerNode`] carries
//! the `shift` (which nibble it discriminates on) and the `path` (the bits
//! every key below it has in common).

use crate::sync::AtomicSlot;

/// number of bits in a radix slice
pub(crate) const SLICE: u32 = 4;
/// mask for one nibble
pub(crate) const NIB: u64 = (1 << SLICE) - 1;
/// children per inner node
pub(crate) const SLNODES: usize = 1 << SLICE;

/// the common prefix mask for everything at or above `shift`
#[inline(always)]
pub(crate) const fn mask_above(shift: u8) -> u64 {
    !NIB << shift
}

/// An inner (branch) node: 16 children sliced on one nibble of the key.
pub struct InnerNode {
    pub(crate) children: [AtomicSlot; SLNODES],
    pub(crate) path: u64,
    pub(crate) shift: u8,
}

impl InnerNode {
    /// a fresh inner node with every child pointing at the null sentinel
    pub(crate) fn empty(path: u64, shift: u8) -> Self {
        Self {
            children: core::array::from_fn(|_| AtomicSlot::null_sentinel()),
            path,
            shift,
        }
    }
}

/// A leaf: a full 64-bit key and its opaque value.
pub struct LeafNode {
    pub(crate) key: u64,
    /// opaque, non-null (0 is reserved to mean "no entry" and is never
    /// stored as a leaf's value -- `insert` treats it as a no-op upstream)
    pub(crate) value: usize,
}

/// A tree node: a branch, a leaf, or the shared null sentinel.
///
/// Every child slot and the root always point at *something* of this type
/// -- readers never have to null-check a raw pointer, they match on
/// [`Node::Null`] instead. The sentinel itself is a single, immutable,
/// process-wide instance (see [`crate::sync::NULL_NODE`]); it is never
/// boxed, freed, or parked for reclamation.
pub enum Node {
    Null,
    Inner(InnerNode),
    Leaf(LeafNode),
}

impl Node {
    /// the key/path this node would compare against during a descent:
    /// a leaf's full key, or an inner node's shared path prefix.
    ///
    /// Only meaningful for non-null nodes.
    #[inline(always)]
    pub(crate) fn path_or_key(&self) -> u64 {
        match self {
            Self::Leaf(l) => l.key,
            Self::Inner(i) => i.path,
            Self::Null => unreachable!("logic,path_or_key on null sentinel"),
        }
    }
}

/// Highest differing bit between `a` and `b`, rounded down to a nibble
/// boundary -- the shift of the new branch node an insert must create.
///
/// `a ^ b` is assumed non-zero (the caller has already handled the
/// exact-match / duplicate-key case).
#[inline(always)]
pub(crate) fn branch_shift(diff: u64) -> u8 {
    debug_assert_ne!(diff, 0, "logic,branch_shift on identical keys");
    let msb = 63 - diff.leading_zeros();
    (msb & !(SLICE - 1)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_above_clears_nibble_and_below() {
        assert_eq!(mask_above(0), !0xFu64);
        assert_eq!(mask_above(4), !0xFFu64);
        // shift=60 is the topmost possible nibble: there are no bits above it
        // to constrain, so the mask (and therefore any valid path) is zero
        assert_eq!(mask_above(60), 0u64);
    }

    #[test]
    fn branch_shift_is_nibble_aligned() {
        for shift in (0..64).step_by(4) {
            let a = 0u64;
            let b = 1u64 << shift;
            assert_eq!(branch_shift(a ^ b) as u32, shift);
        }
    }

    #[test]
    fn branch_shift_rounds_down_within_nibble() {
        // bits 5 and 6 differ -> msb is 6 -> rounds down to nibble boundary 4
        let diff = (1u64 << 6) | (1u64 << 5);
        assert_eq!(branch_shift(diff), 4);
    }
}
