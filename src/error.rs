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

use core::fmt;

pub type IndexResult<T> = Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
/// Errors reported by [`crate::CritnibIndex::insert`]
///
/// Out-of-memory isn't a variant here: the global allocator aborts on
/// allocation failure rather than handing control back to us, so there's
/// nothing for a caller to recover from.
pub enum Error {
    /// the key is already present; the index is unchanged
    DuplicateKey,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey => write!(f, "key already exists"),
        }
    }
}

impl std::error::Error for Error {}

/// A detected breach of I1-I5 (§7, `InvariantViolation`) aborts the
/// process: it cannot arise from valid API use under the single-writer
/// mutex, so it indicates memory corruption or a bug in the core, not
/// something a caller can recover from.
#[cold]
pub(crate) fn abort_corrupted(msg: &str) -> ! {
    log::error!("critnib: invariant violated: {msg}");
    std::process::abort();
}
