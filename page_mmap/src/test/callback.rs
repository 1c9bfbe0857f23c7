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

use std::{cell::Cell, os::fd::AsRawFd, rc::Rc};

use super::{get_test_env, page_file, recording_callback};
use crate::{Exception, ExceptionKind, HostFunction};

#[test]
fn test_thrown_exception_is_left_pending() {
    let env = get_test_env();
    let file = page_file(1);
    let fd = file.as_file().as_raw_fd();

    let invoked = Rc::new(Cell::new(0));
    let counter = invoked.clone();
    let throwing = HostFunction::new(move |_, buffer| {
        counter.set(counter.get() + 1);
        assert!(buffer.is_some());
        Err(Exception::error("boom"))
    });

    env.map_page(fd, 0, throwing).unwrap();

    // surfaces as uncaught, not replaced by a generic error
    assert_eq!(env.run_until_idle(), Err(Exception::error("boom")));
    assert_eq!(invoked.get(), 1);
    assert!(!env.is_exception_pending());

    // the buffer handed to the callback was released with it
    assert_eq!(env.external_memory(), 0);
}

#[test]
fn test_panicking_callback_throws_type_error() {
    let env = get_test_env();
    let file = page_file(1);

    let panicking = HostFunction::new(|_, _| panic!("callback failed"));
    env.map_page(file.as_file().as_raw_fd(), 0, panicking.clone())
        .unwrap();

    let exception = env.run_until_idle().unwrap_err();
    assert_eq!(exception.kind(), ExceptionKind::TypeError);
    assert_eq!(exception.message(), "Failed to invoke callback");

    assert_eq!(env.external_memory(), 0);
    assert_eq!(panicking.ref_count(), 1);
}

#[test]
fn test_remaining_requests_complete_after_uncaught() {
    let env = get_test_env();
    let file = page_file(1);
    let fd = file.as_file().as_raw_fd();

    let throwing = HostFunction::new(|_, _| Err(Exception::type_error("first")));
    let (callback, calls) = recording_callback();

    env.map_page(fd, 0, throwing.clone()).unwrap();
    env.map_page(fd, 0, throwing).unwrap();
    env.map_page(fd, 0, callback).unwrap();

    let mut uncaught = 0;
    while let Err(exception) = env.run_until_idle() {
        assert_eq!(exception.message(), "first");
        uncaught += 1;
    }

    assert_eq!(uncaught, 2);
    assert_eq!(env.in_flight(), 0);
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn test_callback_can_schedule_more_work() {
    let env = Rc::new(get_test_env());
    let file = page_file(2);
    let fd = file.as_file().as_raw_fd();
    let page_size = env.page_size().len() as i64;
    let (second, calls) = recording_callback();

    // only a weak handle, the env must not keep itself alive
    let weak_env = Rc::downgrade(&env);
    let first = HostFunction::new(move |error, buffer| {
        assert!(error.is_none());
        drop(buffer);

        let env = weak_env.upgrade().unwrap();
        env.map_page(fd, page_size, second.clone())
            .map_err(|error| Exception::from(&error))
    });

    env.map_page(fd, 0, first).unwrap();
    env.run_until_idle().unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].buffer.is_some());
}
