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

use std::{io, mem::MaybeUninit, os::fd::RawFd};

use libc::fstat;
use log::trace;

use crate::{error::MappingFailure, mapped_buffer::MappedPage, page_size::PageSize};

/// Result of the background phase
pub type MappingOutcome = Result<MappedPage, MappingFailure>;

/// Everything the background phase needs.
///
/// Only plain data, no host values can end up on a worker thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MappingJob {
    pub(crate) fd: RawFd,
    pub(crate) offset: i64,
    pub(crate) page_size: PageSize,
    pub(crate) prefault: bool,
}

/// Maps the requested page. Runs on a worker thread.
pub(crate) fn execute(job: MappingJob) -> MappingOutcome {
    // the file has to contain a full page at that offset
    let length = file_length(job.fd).map_err(MappingFailure::LengthQuery)?;
    let required = (job.offset as u64).saturating_add(job.page_size.len() as u64);
    if length < required {
        trace!(
            "File {} too short for page at {} ({} < {})",
            job.fd,
            job.offset,
            length,
            required
        );
        return Err(MappingFailure::InsufficientLength { length, required });
    }

    let page = unsafe { MappedPage::map(job.fd, job.offset, job.page_size) }
        .map_err(MappingFailure::Map)?;

    if job.prefault {
        page.prefault();
    }

    trace!("Mapped page {} of file {} at {:p}", job.offset, job.fd, page.as_ptr());
    Ok(page)
}

/// Current length of the file behind `fd`.
///
/// Uses `fstat` so the file position of the caller's descriptor stays untouched.
fn file_length(fd: RawFd) -> io::Result<u64> {
    let mut stat: MaybeUninit<libc::stat> = MaybeUninit::uninit();

    if unsafe { fstat(fd, stat.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let stat = unsafe { stat.assume_init() };
    Ok(stat.st_size as u64)
}
