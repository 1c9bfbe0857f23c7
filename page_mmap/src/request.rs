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

use std::os::fd::RawFd;

use crate::{
    error::{Error, Field},
    host_value::{HostFunction, HostValue},
    page_size::PageSize,
    worker::MappingJob,
};

/// Number of arguments `mmap(fd, offset, callback)` takes
pub const MMAP_PARAMS: usize = 3;

const FD_PARAM: usize = 0;
const OFFSET_PARAM: usize = 1;
const CALLBACK_PARAM: usize = 2;

/// A validated request to map one page.
///
/// Holds on to the callback until the request is completed. The file descriptor stays owned
/// by the caller and is never closed here.
#[derive(Debug)]
pub struct MappingRequest {
    fd: RawFd,
    offset: i64,
    callback: HostFunction,
}

impl MappingRequest {
    pub fn new(
        fd: RawFd,
        offset: i64,
        callback: HostFunction,
        page_size: PageSize,
    ) -> Result<Self, Error> {
        if offset < 0 || !page_size.is_aligned(offset) {
            return Err(Error::InvalidArgument(Field::Offset));
        }

        Ok(Self {
            fd,
            offset,
            callback,
        })
    }

    /// Validates untyped `(fd, offset, callback)` arguments.
    ///
    /// The arity is checked first, then each argument in order.
    pub fn from_args(args: &[HostValue], page_size: PageSize) -> Result<Self, Error> {
        if args.len() != MMAP_PARAMS {
            return Err(Error::InvalidArgument(Field::Arity));
        }

        let fd = args[FD_PARAM]
            .to_i32()
            .ok_or(Error::InvalidArgument(Field::Fd))?;

        let offset = args[OFFSET_PARAM]
            .to_i64()
            .ok_or(Error::InvalidArgument(Field::Offset))?;
        if offset < 0 || !page_size.is_aligned(offset) {
            return Err(Error::InvalidArgument(Field::Offset));
        }

        // retain the callback until the request completes
        let callback = args[CALLBACK_PARAM]
            .as_function()
            .cloned()
            .ok_or(Error::InvalidArgument(Field::Callback))?;

        Ok(Self {
            fd,
            offset,
            callback,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// The plain data the background worker needs
    pub(crate) fn job(&self, page_size: PageSize, prefault: bool) -> MappingJob {
        MappingJob {
            fd: self.fd,
            offset: self.offset,
            page_size,
            prefault,
        }
    }

    pub(crate) fn into_callback(self) -> HostFunction {
        self.callback
    }
}
