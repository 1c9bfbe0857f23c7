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

use std::{
    cell::RefCell,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
    rc::Rc,
};

use tempfile::NamedTempFile;

use crate::{Env, Exception, HostFunction, MappedBuffer, MmapConfig, PageSize};

mod callback;

/// What a callback was invoked with
pub(crate) struct Call {
    pub(crate) error: Option<Exception>,
    pub(crate) buffer: Option<MappedBuffer>,
}

pub(crate) type Calls = Rc<RefCell<Vec<Call>>>;

pub(crate) fn get_test_env() -> Env {
    let _ = env_logger::builder().is_test(true).try_init();

    Env::new(MmapConfig::default()).unwrap()
}

/// A callback that keeps every invocation (and with it every buffer) around
pub(crate) fn recording_callback() -> (HostFunction, Calls) {
    let calls: Calls = Rc::default();

    let record = calls.clone();
    let callback = HostFunction::new(move |error, buffer| {
        record.borrow_mut().push(Call { error, buffer });
        Ok(())
    });

    (callback, calls)
}

/// A zeroed file that is `pages` pages long
pub(crate) fn page_file(pages: usize) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    file.as_file()
        .set_len((pages * PageSize::get().len()) as u64)
        .unwrap();
    file
}

/// Reads `[offset, offset + len)` through a freshly opened handle
pub(crate) fn read_region(path: &Path, offset: u64, len: usize) -> Vec<u8> {
    let mut file = File::open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();

    let mut data = vec![0u8; len];
    file.read_exact(&mut data).unwrap();
    data
}
