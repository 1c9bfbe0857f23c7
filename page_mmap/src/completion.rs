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

use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{trace, warn};
use tokio::task::JoinError;

use crate::{
    env::Env,
    error::Error,
    host_value::{Exception, HostFunction},
    mapped_buffer::{MappedBuffer, MappedPage},
    request::MappingRequest,
    worker::MappingOutcome,
};

/// What the foreground sees of a finished background task
pub(crate) type TaskStatus = Result<MappingOutcome, JoinError>;

/// Finishes request `id` on the controlling thread.
///
/// Invokes the callback exactly once, either with an error or with the mapped buffer.
/// The request (and with it the retained callback) is consumed on every path.
pub(crate) fn complete(env: &Env, id: u64, request: MappingRequest, status: TaskStatus) {
    let result = match status {
        Ok(outcome) => outcome
            .map(|page| wrap(env, page))
            .map_err(Error::from),
        Err(join_error) => {
            warn!("Mapping task of request {} did not finish: {}", id, join_error);
            Err(Error::AsyncFailure)
        }
    };

    let (error, buffer) = match result {
        Ok(buffer) => {
            trace!("Request {} mapped at {:p}", id, buffer.as_ptr());
            (None, Some(buffer))
        }
        Err(error) => {
            warn!("Request {} (fd {}) failed: {}", id, request.fd(), error);
            (Some(Exception::from(&error)), None)
        }
    };

    let callback = request.into_callback();
    if invoke(env, &callback, error, buffer).is_err() && !env.is_exception_pending() {
        env.throw(Exception::from(&Error::CallbackInvocationFailed));
    }

    trace!("Request {} completed", id);
}

fn wrap(env: &Env, page: MappedPage) -> MappedBuffer {
    MappedBuffer::wrap(page, env.external_memory_handle())
}

/// Calls `callback` without a receiver.
///
/// An exception returned by the callback is left pending on `env`. A panic leaves nothing
/// pending, it only makes the call fail.
fn invoke(
    env: &Env,
    callback: &HostFunction,
    error: Option<Exception>,
    buffer: Option<MappedBuffer>,
) -> Result<(), ()> {
    match catch_unwind(AssertUnwindSafe(|| callback.call(error, buffer))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(exception)) => {
            env.throw(exception);
            Err(())
        }
        Err(_) => {
            warn!("Callback panicked");
            Err(())
        }
    }
}
