/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use core::sync::atomic::{AtomicI64, Ordering};

/// Bytes held by the host that do not live on its managed heap.
///
/// Mapped pages are counted here so the host knows about the memory pressure they cause.
/// Adjusted from the controlling thread when a page is handed out and from wherever the
/// last owner of a page releases it.
#[derive(Debug, Default)]
pub struct ExternalMemory {
    bytes: AtomicI64,
}

impl ExternalMemory {
    pub const fn new() -> Self {
        Self {
            bytes: AtomicI64::new(0),
        }
    }

    /// Adds `delta` (which may be negative) and returns the new total.
    pub fn adjust(&self, delta: i64) -> i64 {
        self.bytes.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn current(&self) -> i64 {
        self.bytes.load(Ordering::SeqCst)
    }
}
