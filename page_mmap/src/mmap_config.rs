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

/// Configuration of an [`Env`](crate::Env)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmapConfig {
    /// Threads of the async runtime that track running mapping tasks
    pub worker_threads: usize,

    /// Upper bound of mapping workers running at the same time
    pub max_blocking_threads: usize,

    /// Touch every freshly mapped page so it is resident before the callback sees it
    pub prefault: bool,
}

impl Default for MmapConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            max_blocking_threads: 4,
            prefault: true,
        }
    }
}
