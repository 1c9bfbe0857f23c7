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
    fs::{remove_file, File},
    io::Read,
    os::fd::AsRawFd,
    rc::Rc,
};

use env_logger::{Builder, Env};
use log::info;
use page_mmap::{HostFunction, HostValue, MappedBuffer, MmapConfig};

const FILE_PATH: &str = "/tmp/page_mmap_demo.data";

fn main() {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Info)
        .format_module_path(false)
        .init();

    let (env, exports) = page_mmap::init(MmapConfig::default()).unwrap();
    for (name, value) in exports.constants() {
        info!("{} = {}", name, value);
    }

    let file = File::options()
        .read(true)
        .write(true)
        .truncate(true)
        .create(true)
        .open(FILE_PATH)
        .unwrap();
    file.set_len(2 * exports.page_size as u64).unwrap();

    let mapped: Rc<RefCell<Option<MappedBuffer>>> = Rc::default();
    let slot = mapped.clone();
    let callback = HostFunction::new(move |error, buffer| {
        match error {
            Some(error) => println!("mapping failed: {}", error),
            None => *slot.borrow_mut() = buffer,
        }
        Ok(())
    });

    let fd = HostValue::from(file.as_raw_fd());
    env.mmap(&[fd.clone(), HostValue::from(0), HostValue::from(callback.clone())])
        .unwrap();

    // a page past the end of the file is reported through the callback
    env.mmap(&[
        fd.clone(),
        HostValue::from(2 * exports.page_size as i64),
        HostValue::from(callback.clone()),
    ])
    .unwrap();

    // misaligned offsets are rejected right away
    if let Err(exception) = env.mmap(&[fd, HostValue::from(1), HostValue::from(callback)]) {
        println!("rejected: {}", exception);
    }

    env.run_until_idle().unwrap();

    let mut buffer = mapped.borrow_mut().take().unwrap();
    buffer[0] = 0xFF;
    println!(
        "mapped {} bytes, external memory: {} bytes",
        buffer.len(),
        env.external_memory()
    );
    drop(buffer);

    let mut first = [0u8; 1];
    File::open(FILE_PATH)
        .unwrap()
        .read_exact(&mut first)
        .unwrap();
    println!("first byte of file: {:#04x}", first[0]);

    drop(file);
    let _ = remove_file(FILE_PATH);
}
