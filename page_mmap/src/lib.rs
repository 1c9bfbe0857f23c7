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

//! Asynchronous, page-granular, file-backed shared memory mappings.
//!
//! `mmap(fd, offset, callback)` validates its arguments right away, maps the page on a
//! background worker and reports back through the callback once the [`Env`] is driven.
//! The resulting [`MappedBuffer`] unmaps its page when the last owner drops it.

mod completion;
mod env;
mod error;
mod external_memory;
mod host_value;
mod mapped_buffer;
mod mmap_config;
mod page_size;
mod request;
mod worker;

#[cfg(test)]
mod test;

pub use env::{Env, Exports, MMAP_NAME};
pub use error::{Error, Field, MappingFailure};
pub use external_memory::ExternalMemory;
pub use host_value::{Exception, ExceptionKind, HostFunction, HostValue};
pub use mapped_buffer::{MappedBuffer, MappedPage};
pub use mmap_config::MmapConfig;
pub use page_size::PageSize;
pub use request::{MappingRequest, MMAP_PARAMS};
pub use worker::MappingOutcome;

/// Initializes the module: creates the controlling [`Env`] and the values it exports.
pub fn init(config: MmapConfig) -> std::io::Result<(Env, Exports)> {
    let env = Env::new(config)?;
    let exports = env.exports();

    Ok((env, exports))
}
