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

use core::fmt;
use std::io;

use log::error;
use thiserror::Error;

use crate::host_value::Exception;

/// Argument of `mmap(fd, offset, callback)` that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Fd,
    Offset,
    Callback,
    /// wrong number of arguments
    Arity,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Fd => f.write_str("fd"),
            Field::Offset => f.write_str("offset"),
            Field::Callback => f.write_str("callback"),
            Field::Arity => f.write_str("arguments to mmap()"),
        }
    }
}

/// Why the background phase could not produce a mapped page
#[derive(Debug, Error)]
pub enum MappingFailure {
    #[error("insufficient file length ({length} bytes, need {required})")]
    InsufficientLength { length: u64, required: u64 },

    #[error("could not query file length: {0}")]
    LengthQuery(io::Error),

    #[error("map failed: {0}")]
    Map(io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any background work was scheduled
    #[error("Invalid {0}")]
    InvalidArgument(Field),

    /// The background task itself did not run to completion
    #[error("Async operation failed")]
    AsyncFailure,

    #[error("mmap() failed: {0}")]
    Mapping(#[from] MappingFailure),

    #[error("Failed to invoke callback")]
    CallbackInvocationFailed,
}

impl From<&Error> for Exception {
    fn from(value: &Error) -> Self {
        match value {
            Error::InvalidArgument(_) | Error::CallbackInvocationFailed => {
                Exception::type_error(value.to_string())
            }
            Error::AsyncFailure | Error::Mapping(_) => Exception::error(value.to_string()),
        }
    }
}

/// Logs `args` and aborts the process.
///
/// Used where the host's bookkeeping is broken and nobody is left to observe an error.
pub(crate) fn fatal(args: fmt::Arguments<'_>) -> ! {
    error!("{}", args);
    std::process::abort()
}
