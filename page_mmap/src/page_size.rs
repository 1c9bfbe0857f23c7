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

use std::sync::OnceLock;

use libc::{sysconf, _SC_PAGE_SIZE};

use crate::error::fatal;

static PAGE_SIZE: OnceLock<PageSize> = OnceLock::new();

/// Size of a virtual memory page.
///
/// Always a power of two, so alignment checks reduce to a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize {
    bytes: u32,
    log2: u32,
}

impl PageSize {
    /// Returns `None` if `bytes` is not a power of two.
    pub const fn new(bytes: u32) -> Option<Self> {
        if !bytes.is_power_of_two() {
            return None;
        }

        Some(Self {
            bytes,
            log2: bytes.trailing_zeros(),
        })
    }

    /// The page size of this platform.
    ///
    /// Queried from the OS on first use and cached for the rest of the process.
    pub fn get() -> Self {
        *PAGE_SIZE.get_or_init(Self::query)
    }

    fn query() -> Self {
        let raw = unsafe { sysconf(_SC_PAGE_SIZE) };

        match u32::try_from(raw).ok().and_then(Self::new) {
            Some(page_size) => page_size,
            None => fatal(format_args!("sysconf reported an invalid page size: {}", raw)),
        }
    }

    pub const fn bytes(self) -> u32 {
        self.bytes
    }

    /// Page size as a byte length
    pub const fn len(self) -> usize {
        self.bytes as usize
    }

    /// Base-2 logarithm of the page size
    pub const fn log2(self) -> u32 {
        self.log2
    }

    /// `true` if `offset` is an exact multiple of the page size.
    ///
    /// Negative offsets are only checked for alignment here, callers reject them separately.
    pub const fn is_aligned(self, offset: i64) -> bool {
        offset & (self.bytes as i64 - 1) == 0
    }
}

#[cfg(test)]
mod test {
    use super::PageSize;

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(PageSize::new(0).is_none());
        assert!(PageSize::new(3).is_none());
        assert!(PageSize::new(4095).is_none());
        assert!(PageSize::new(4096 + 1024).is_none());
    }

    #[test]
    fn test_log2() {
        assert_eq!(PageSize::new(1).unwrap().log2(), 0);
        assert_eq!(PageSize::new(4096).unwrap().log2(), 12);
        assert_eq!(PageSize::new(16384).unwrap().log2(), 14);
        assert_eq!(PageSize::new(65536).unwrap().log2(), 16);
    }

    #[test]
    fn test_platform_page_size() {
        let page_size = PageSize::get();
        assert!(page_size.bytes().is_power_of_two());
        assert_eq!(1u32 << page_size.log2(), page_size.bytes());

        // cached after the first query
        assert_eq!(PageSize::get(), page_size);
    }

    #[test]
    fn test_alignment() {
        let page_size = PageSize::new(4096).unwrap();

        assert!(page_size.is_aligned(0));
        assert!(page_size.is_aligned(4096));
        assert!(page_size.is_aligned(4096 * 1000));
        assert!(!page_size.is_aligned(1));
        assert!(!page_size.is_aligned(4095));
        assert!(!page_size.is_aligned(4097));
    }
}
