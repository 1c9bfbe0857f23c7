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

use core::cell::{Cell, RefCell};
use std::{collections::HashMap, io, os::fd::RawFd, sync::Arc};

use log::{debug, trace};
use tokio::{
    runtime::{Builder, Runtime},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::{
    completion::{complete, TaskStatus},
    error::{fatal, Error},
    external_memory::ExternalMemory,
    host_value::{Exception, HostFunction, HostValue},
    mmap_config::MmapConfig,
    page_size::PageSize,
    request::MappingRequest,
    worker,
};

/// Name the mapping function is exported under
pub const MMAP_NAME: &str = "mmap";

/// Values exported to the host on initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exports {
    pub page_size: u32,
    pub log_page_size: u32,
}

impl Exports {
    /// Exported constants as `(name, value)` pairs
    pub fn constants(&self) -> [(&'static str, u32); 2] {
        [
            ("LOG_PAGE_SIZE", self.log_page_size),
            ("PAGE_SIZE", self.page_size),
        ]
    }
}

struct Completion {
    id: u64,
    status: TaskStatus,
}

/// The controlling context that owns all host objects.
///
/// Mapping work is scheduled on a background runtime, results come back through a
/// completion queue and are only turned into host values (and handed to callbacks)
/// while [`Env::run_until_idle`] drives that queue on this thread.
pub struct Env {
    page_size: PageSize,
    config: MmapConfig,

    /// retained requests of all scheduled mappings, keyed by request id
    requests: RefCell<HashMap<u64, MappingRequest>>,
    next_id: Cell<u64>,

    completion_sender: UnboundedSender<Completion>,
    completion_receiver: RefCell<UnboundedReceiver<Completion>>,

    pending_exception: RefCell<Option<Exception>>,
    external_memory: Arc<ExternalMemory>,

    runtime: Runtime,
}

impl Env {
    pub fn new(config: MmapConfig) -> io::Result<Self> {
        if config.worker_threads == 0 || config.max_blocking_threads == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "worker_threads and max_blocking_threads have to be at least 1",
            ));
        }

        let page_size = PageSize::get();

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name("page-mmap-worker")
            .build()?;

        debug!(
            "Created env (page size: {} bytes, workers: {}, max blocking: {}, prefault: {})",
            page_size.bytes(),
            config.worker_threads,
            config.max_blocking_threads,
            config.prefault
        );

        let (completion_sender, completion_receiver) = unbounded_channel();

        Ok(Self {
            page_size,
            config,
            requests: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            completion_sender,
            completion_receiver: RefCell::new(completion_receiver),
            pending_exception: RefCell::new(None),
            external_memory: Arc::new(ExternalMemory::new()),
            runtime,
        })
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn config(&self) -> &MmapConfig {
        &self.config
    }

    pub fn exports(&self) -> Exports {
        Exports {
            page_size: self.page_size.bytes(),
            log_page_size: self.page_size.log2(),
        }
    }

    /// `mmap(fd, offset, callback)` as called by the host.
    ///
    /// Invalid arguments are thrown back as a `TypeError` and nothing is scheduled.
    /// Otherwise this returns right away and the callback fires later from
    /// [`Env::run_until_idle`].
    pub fn mmap(&self, args: &[HostValue]) -> Result<(), Exception> {
        let request = MappingRequest::from_args(args, self.page_size)
            .map_err(|error| Exception::from(&error))?;

        self.schedule(request);
        Ok(())
    }

    /// Typed version of [`Env::mmap`]
    pub fn map_page(&self, fd: RawFd, offset: i64, callback: HostFunction) -> Result<(), Error> {
        let request = MappingRequest::new(fd, offset, callback, self.page_size)?;

        self.schedule(request);
        Ok(())
    }

    fn schedule(&self, request: MappingRequest) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let job = request.job(self.page_size, self.config.prefault);
        self.requests.borrow_mut().insert(id, request);

        let sender = self.completion_sender.clone();
        let task = self.runtime.spawn_blocking(move || worker::execute(job));
        self.runtime.spawn(async move {
            let status = task.await;

            // only fails while the env is torn down, the outcome then unmaps itself
            let _ = sender.send(Completion { id, status });
        });

        trace!(
            "Scheduled request {} (fd: {}, offset: {})",
            id,
            job.fd,
            job.offset
        );
    }

    /// Number of scheduled requests whose callback has not fired yet
    pub fn in_flight(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Completes finished requests until none is in flight anymore.
    ///
    /// Blocks while waiting for background work. If a completion leaves an exception pending
    /// it is returned as uncaught, the remaining requests stay queued for the next call.
    pub fn run_until_idle(&self) -> Result<(), Exception> {
        while self.in_flight() > 0 {
            let next = self.completion_receiver.borrow_mut().blocking_recv();
            let completion = match next {
                Some(completion) => completion,
                None => fatal(format_args!("completion queue closed with requests in flight")),
            };

            self.dispatch(completion);

            if let Some(exception) = self.take_exception() {
                return Err(exception);
            }
        }

        Ok(())
    }

    fn dispatch(&self, completion: Completion) {
        let removed = self.requests.borrow_mut().remove(&completion.id);
        let request = match removed {
            Some(request) => request,
            None => fatal(format_args!(
                "completion for unknown request {}",
                completion.id
            )),
        };

        complete(self, completion.id, request, completion.status);
    }

    /// Bytes of mapped pages currently handed out
    pub fn external_memory(&self) -> i64 {
        self.external_memory.current()
    }

    pub(crate) fn external_memory_handle(&self) -> Arc<ExternalMemory> {
        self.external_memory.clone()
    }

    pub fn is_exception_pending(&self) -> bool {
        self.pending_exception.borrow().is_some()
    }

    pub fn throw(&self, exception: Exception) {
        *self.pending_exception.borrow_mut() = Some(exception);
    }

    pub fn take_exception(&self) -> Option<Exception> {
        self.pending_exception.borrow_mut().take()
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        let in_flight = self.requests.get_mut().len();
        if in_flight > 0 {
            // the runtime waits for running workers, their pages are unmapped unseen
            debug!("Dropping env with {} request(s) in flight", in_flight);
        }
    }
}
