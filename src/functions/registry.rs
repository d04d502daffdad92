//! Function registry
//!
//! The registry owns the adapter behind every function registered on a
//! connection. The engine only holds a borrowed pointer to each adapter, so an
//! adapter is dropped only after the engine has stopped referring to it:
//! after a successful replacement or removal, or after the connection has
//! been closed.

use std::any::Any;
use std::ffi::{c_int, c_void, CString};
use std::ptr;

use indexmap::IndexMap;
use libsqlite3_sys as ffi;
use serde::Serialize;
use tracing::debug;

use super::context::{RawFinal, RawStep};
use super::flags::FunctionFlags;
use crate::connection::error_message;
use crate::error::{Error, Result};

/// Kind of a registered function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionKind {
    Scalar,
    Aggregate,
}

/// Description of a registered function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub arity: usize,
    pub kind: FunctionKind,
    pub flags: FunctionFlags,
}

/// Callbacks handed to the engine for one registration
pub(crate) struct Callbacks {
    pub(crate) user_data: *mut c_void,
    pub(crate) func: Option<RawStep>,
    pub(crate) step: Option<RawStep>,
    pub(crate) fin: Option<RawFinal>,
}

struct Registration {
    info: FunctionInfo,
    adapter: Box<dyn Any>,
}

/// Registered functions keyed by (lower-cased name, arity), in registration order
#[derive(Default)]
pub(crate) struct FunctionRegistry {
    entries: IndexMap<(String, usize), Registration>,
}

fn key(name: &str, arity: usize) -> (String, usize) {
    (name.to_ascii_lowercase(), arity)
}

impl FunctionRegistry {
    /// Register `adapter` with the engine and take ownership of it.
    ///
    /// Returns the adapter previously registered under the same name and
    /// arity; the engine no longer refers to it, so the caller may drop it.
    pub(crate) fn install(
        &mut self,
        db: *mut ffi::sqlite3,
        info: FunctionInfo,
        adapter: Box<dyn Any>,
        callbacks: Callbacks,
    ) -> Result<Option<Box<dyn Any>>> {
        let name = CString::new(info.name.as_str())?;
        let arity = c_int::try_from(info.arity).map_err(|_| Error::Arity {
            what: "argument(s)",
            expected: c_int::MAX as usize,
            found: info.arity,
        })?;
        let flags = info.flags | FunctionFlags::UTF8;

        let rc = unsafe {
            ffi::sqlite3_create_function_v2(
                db,
                name.as_ptr(),
                arity,
                flags.bits(),
                callbacks.user_data,
                callbacks.func,
                callbacks.step,
                callbacks.fin,
                None,
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Registration {
                name: info.name,
                message: unsafe { error_message(db) },
            });
        }

        debug!(name = %info.name, arity = info.arity, kind = ?info.kind, "function registered");
        let previous = self.entries.insert(
            key(&info.name, info.arity),
            Registration {
                info,
                adapter,
            },
        );
        Ok(previous.map(|registration| registration.adapter))
    }

    /// Unregister a function from the engine and hand back its adapter.
    ///
    /// Returns `Ok(None)` if no function with that name and arity was
    /// registered through this registry.
    pub(crate) fn uninstall(
        &mut self,
        db: *mut ffi::sqlite3,
        name: &str,
        arity: usize,
    ) -> Result<Option<Box<dyn Any>>> {
        let Some(registration) = self.entries.get(&key(name, arity)) else {
            return Ok(None);
        };

        let cname = CString::new(registration.info.name.as_str())?;
        let flags = registration.info.flags | FunctionFlags::UTF8;
        let rc = unsafe {
            ffi::sqlite3_create_function_v2(
                db,
                cname.as_ptr(),
                arity as c_int,
                flags.bits(),
                ptr::null_mut(),
                None,
                None,
                None,
                None,
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Registration {
                name: name.to_string(),
                message: unsafe { error_message(db) },
            });
        }

        debug!(name, arity, "function removed");
        Ok(self
            .entries
            .shift_remove(&key(name, arity))
            .map(|registration| registration.adapter))
    }

    /// Registered functions in registration order
    pub(crate) fn infos(&self) -> Vec<FunctionInfo> {
        self.entries
            .values()
            .map(|registration| registration.info.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_ignore_ascii_case() {
        assert_eq!(key("Plus123", 1), key("PLUS123", 1));
        assert_ne!(key("plus", 1), key("plus", 2));
    }
}
