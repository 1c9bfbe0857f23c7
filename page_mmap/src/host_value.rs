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
use std::rc::Rc;

use static_assertions::assert_not_impl_any;

use crate::mapped_buffer::MappedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Error,
    TypeError,
}

/// An error value living in the host.
///
/// Handed to callbacks in their error slot or left pending on the [`Env`](crate::Env).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    kind: ExceptionKind,
    message: String,
}

impl Exception {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ExceptionKind::Error,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: ExceptionKind::TypeError,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExceptionKind::Error => write!(f, "Error: {}", self.message),
            ExceptionKind::TypeError => write!(f, "TypeError: {}", self.message),
        }
    }
}

impl std::error::Error for Exception {}

type CallbackFn = dyn Fn(Option<Exception>, Option<MappedBuffer>) -> Result<(), Exception>;

/// A host function usable as an `mmap` completion callback.
///
/// Called with `(error, buffer)` where exactly one of both is set. Returning `Err` is the
/// equivalent of throwing. Cloning retains another reference to the same function.
#[derive(Clone)]
pub struct HostFunction(Rc<CallbackFn>);

// host objects must stay on the controlling thread
assert_not_impl_any!(HostFunction: Send, Sync);
assert_not_impl_any!(HostValue: Send, Sync);

impl HostFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<Exception>, Option<MappedBuffer>) -> Result<(), Exception> + 'static,
    {
        Self(Rc::new(f))
    }

    pub(crate) fn call(
        &self,
        error: Option<Exception>,
        buffer: Option<MappedBuffer>,
    ) -> Result<(), Exception> {
        (self.0)(error, buffer)
    }

    /// Number of live references to this function
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({:p})", Rc::as_ptr(&self.0))
    }
}

/// An untyped value as passed in by the host
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function(HostFunction),
}

impl HostValue {
    /// Coerces a number to `i32`.
    ///
    /// Fractions are truncated, values outside of the `i32` range wrap around
    /// and non-finite numbers become `0`. Anything but a number yields `None`.
    pub fn to_i32(&self) -> Option<i32> {
        let HostValue::Number(value) = *self else {
            return None;
        };

        if !value.is_finite() {
            return Some(0);
        }

        // keep the low 32 bits
        let wrapped = value.trunc().rem_euclid(4294967296.0);
        Some(wrapped as u32 as i32)
    }

    /// Coerces a number to `i64`.
    ///
    /// Fractions are truncated, values outside of the `i64` range saturate
    /// and non-finite numbers become `0`. Anything but a number yields `None`.
    pub fn to_i64(&self) -> Option<i64> {
        let HostValue::Number(value) = *self else {
            return None;
        };

        if !value.is_finite() {
            return Some(0);
        }

        Some(value.trunc() as i64)
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(function) => Some(function),
            _ => None,
        }
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Number(value as f64)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Number(value as f64)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_owned())
    }
}

impl From<HostFunction> for HostValue {
    fn from(value: HostFunction) -> Self {
        HostValue::Function(value)
    }
}
