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

use core::{
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    ptr::{null_mut, read_volatile, slice_from_raw_parts, slice_from_raw_parts_mut, NonNull},
};
use std::{io, os::fd::RawFd, sync::Arc};

use libc::{c_void, mmap, munmap, off_t, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE};
use log::trace;
use static_assertions::assert_impl_all;

use crate::{error::fatal, external_memory::ExternalMemory, page_size::PageSize};

/// One page of a file, mapped shared and read-write.
///
/// Owns the mapping: dropping it unmaps the page. This is what the background worker hands
/// back, so a page that is never wrapped into a [`MappedBuffer`] is still released.
#[derive(Debug)]
pub struct MappedPage {
    ptr: NonNull<u8>,
    page_size: PageSize,
}

// the region is owned exclusively by this handle
unsafe impl Send for MappedPage {}
unsafe impl Sync for MappedPage {}

impl MappedPage {
    /// Maps the page at `offset` of `fd` at an address chosen by the kernel.
    ///
    /// ### Safety
    ///
    /// `offset` has to be page aligned and `fd` has to stay a valid descriptor for the duration
    /// of this call. Writes through the page end up in the file, so nobody else may rely on that
    /// file region staying unchanged.
    pub(crate) unsafe fn map(fd: RawFd, offset: i64, page_size: PageSize) -> io::Result<Self> {
        let res = unsafe {
            mmap(
                null_mut(),
                page_size.len(),
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                fd,
                offset as off_t,
            )
        };

        if res == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        match NonNull::new(res as *mut u8) {
            Some(ptr) => Ok(Self { ptr, page_size }),
            None => Err(io::Error::other("mmap returned a null mapping")),
        }
    }

    /// Reads the first byte so the page is faulted in now rather than on first access.
    pub(crate) fn prefault(&self) {
        let _ = unsafe { read_volatile(self.ptr.as_ptr()) };
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.page_size.len()
    }
}

impl Drop for MappedPage {
    fn drop(&mut self) {
        let code = unsafe { munmap(self.ptr.as_ptr() as *mut c_void, self.page_size.len()) };

        if code != 0 {
            fatal(format_args!(
                "could not unmap page at {:p}: {}",
                self.ptr,
                io::Error::last_os_error()
            ));
        }
    }
}

/// A mapped page handed out to the host.
///
/// Derefs to exactly one page of bytes that alias the mapped file region, so writes are
/// visible to other readers of the file. While alive it is accounted as external memory;
/// dropping the last owner unmaps the page and removes it from the accounting again.
pub struct MappedBuffer {
    page: ManuallyDrop<MappedPage>,
    accounting: Arc<ExternalMemory>,
}

assert_impl_all!(MappedBuffer: Send, Sync);

impl MappedBuffer {
    pub(crate) fn wrap(page: MappedPage, accounting: Arc<ExternalMemory>) -> Self {
        let total = accounting.adjust(page.len() as i64);
        trace!("Wrap page at {:p} (external memory: {} bytes)", page.ptr, total);

        Self {
            page: ManuallyDrop::new(page),
            accounting,
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.page.as_ptr()
    }

    /// Always exactly one page
    pub fn len(&self) -> usize {
        self.page.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Deref for MappedBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { &*slice_from_raw_parts(self.page.ptr.as_ptr(), self.page.len()) }
    }
}

impl DerefMut for MappedBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *slice_from_raw_parts_mut(self.page.ptr.as_ptr(), self.page.len()) }
    }
}

impl core::fmt::Debug for MappedBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("addr", &self.page.ptr)
            .field("len", &self.page.len())
            .finish()
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        let len = self.page.len() as i64;
        trace!("Release page at {:p}", self.page.ptr);

        // unmap first, the page is never touched again after this
        unsafe {
            ManuallyDrop::drop(&mut self.page);
        }

        self.accounting.adjust(-len);
    }
}
