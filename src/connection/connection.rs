//! Database connection
//!
//! A `Connection` owns the engine handle and every function registered on it.

use std::cell::RefCell;
use std::ffi::{c_void, CStr, CString};
use std::ptr;
use std::rc::Rc;

use libsqlite3_sys as ffi;
use tracing::{debug, error};

use super::config::ConnectionConfig;
use crate::cursor::{Cursor, StatementHandle, Step};
use crate::error::{Error, Result};
use crate::functions::aggregate::{final_aggregate, step_aggregate, AggregateAdapter};
use crate::functions::context::FaultSlot;
use crate::functions::registry::{Callbacks, FunctionRegistry};
use crate::functions::scalar::{call_scalar, ScalarAdapter};
use crate::functions::{
    Aggregate, FromArguments, FunctionFlags, FunctionInfo, FunctionKind, ScalarFunction,
};

/// Locator of a private in-memory database
pub const MEMORY_LOCATOR: &str = ":memory:";

/// Most recent error message of a connection
pub(crate) unsafe fn error_message(db: *mut ffi::sqlite3) -> String {
    let message = ffi::sqlite3_errmsg(db);
    if message.is_null() {
        "unknown error".to_string()
    } else {
        CStr::from_ptr(message).to_string_lossy().into_owned()
    }
}

fn error_string(code: i32) -> String {
    unsafe { CStr::from_ptr(ffi::sqlite3_errstr(code)) }
        .to_string_lossy()
        .into_owned()
}

/// Owned engine handle, closed exactly once
struct RawConnection {
    db: *mut ffi::sqlite3,
}

impl RawConnection {
    fn close(&mut self) -> Result<()> {
        if self.db.is_null() {
            return Ok(());
        }
        let rc = unsafe { ffi::sqlite3_close(self.db) };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Runtime {
                code: rc,
                message: unsafe { error_message(self.db) },
            });
        }
        self.db = ptr::null_mut();
        Ok(())
    }
}

impl Drop for RawConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "failed to close connection");
        }
    }
}

/// Connection to one database
pub struct Connection {
    // Field order matters: the engine handle is closed before the registry
    // drops the closures the engine calls into.
    db: RawConnection,
    functions: RefCell<FunctionRegistry>,
    fault: Rc<FaultSlot>,
    locator: String,
}

impl Connection {
    /// Open (creating if needed) the database at `locator`
    pub fn open(locator: &str) -> Result<Self> {
        Self::open_with_config(locator, &ConnectionConfig::default())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(MEMORY_LOCATOR)
    }

    /// Open the database at `locator` with explicit settings.
    ///
    /// The locator is passed to the engine unchanged.
    pub fn open_with_config(locator: &str, config: &ConnectionConfig) -> Result<Self> {
        let c_locator = CString::new(locator)?;
        let mut db = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_open_v2(c_locator.as_ptr(), &mut db, config.open_flags(), ptr::null())
        };
        // The engine may hand back a handle even on failure; it still has to be closed.
        let mut raw = RawConnection { db };
        if rc != ffi::SQLITE_OK {
            let message = if raw.db.is_null() {
                error_string(rc)
            } else {
                unsafe { error_message(raw.db) }
            };
            raw.close().ok();
            return Err(Error::Open {
                locator: locator.to_string(),
                message,
            });
        }

        unsafe {
            ffi::sqlite3_extended_result_codes(raw.db, 1);
            if let Some(timeout) = config.busy_timeout {
                let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
                ffi::sqlite3_busy_timeout(raw.db, ms);
            }
        }

        debug!(locator, mode = ?config.mode, "connection opened");
        Ok(Self {
            db: raw,
            functions: RefCell::new(FunctionRegistry::default()),
            fault: Rc::new(FaultSlot::default()),
            locator: locator.to_string(),
        })
    }

    /// Locator this connection was opened with
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Create a cursor on this connection
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self)
    }

    /// Run a multi-statement script on a temporary cursor
    pub fn executescript(&self, sql: &str) -> Result<()> {
        self.cursor().executescript(sql)
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE
    pub fn changes(&self) -> u64 {
        unsafe { ffi::sqlite3_changes(self.raw()) as u64 }
    }

    /// Rowid of the most recent successful INSERT
    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { ffi::sqlite3_last_insert_rowid(self.raw()) }
    }

    /// Check if no explicit transaction is open
    pub fn is_autocommit(&self) -> bool {
        unsafe { ffi::sqlite3_get_autocommit(self.raw()) != 0 }
    }

    /// Register `func` as the scalar SQL function `name`.
    ///
    /// The function's arity is the closure's parameter count. Registering the
    /// same name and arity again replaces the function and releases the
    /// previous closure.
    pub fn create_scalar<F, Args>(&self, name: &str, func: F, flags: FunctionFlags) -> Result<()>
    where
        F: ScalarFunction<Args>,
        Args: 'static,
    {
        let adapter = Box::new(ScalarAdapter::new(name, func, self.fault.clone()));
        let callbacks = Callbacks {
            user_data: &*adapter as *const ScalarAdapter<F, Args> as *mut c_void,
            func: Some(call_scalar::<F, Args>),
            step: None,
            fin: None,
        };
        let info = FunctionInfo {
            name: name.to_string(),
            arity: F::ARITY,
            kind: FunctionKind::Scalar,
            flags,
        };
        self.install(info, adapter, callbacks)
    }

    /// Register the aggregate SQL function `name`.
    ///
    /// `factory` builds the state for each aggregation group. Registering the
    /// same name and arity again replaces the function and releases the
    /// previous factory.
    pub fn create_aggregate<A, F>(&self, name: &str, factory: F, flags: FunctionFlags) -> Result<()>
    where
        A: Aggregate,
        F: Fn() -> A + 'static,
    {
        let adapter = Box::new(AggregateAdapter::new(name, factory, self.fault.clone()));
        let callbacks = Callbacks {
            user_data: &*adapter as *const AggregateAdapter<A, F> as *mut c_void,
            func: None,
            step: Some(step_aggregate::<A, F>),
            fin: Some(final_aggregate::<A, F>),
        };
        let info = FunctionInfo {
            name: name.to_string(),
            arity: <A::Args as FromArguments>::ARITY,
            kind: FunctionKind::Aggregate,
            flags,
        };
        self.install(info, adapter, callbacks)
    }

    /// Unregister a function added through this connection and release it.
    ///
    /// Returns `false` if no such function was registered.
    pub fn remove_function(&self, name: &str, arity: usize) -> Result<bool> {
        let removed = self
            .functions
            .borrow_mut()
            .uninstall(self.raw(), name, arity)?;
        Ok(removed.is_some())
    }

    /// Functions registered on this connection, in registration order
    pub fn functions(&self) -> Vec<FunctionInfo> {
        self.functions.borrow().infos()
    }

    /// Close the connection, reporting any engine error.
    ///
    /// Dropping a connection closes it too; errors are then only logged.
    pub fn close(mut self) -> Result<()> {
        self.db.close()?;
        debug!(locator = %self.locator, "connection closed");
        Ok(())
    }

    pub(crate) fn raw(&self) -> *mut ffi::sqlite3 {
        self.db.db
    }

    /// Step `stmt`, turning a failure raised inside a registered function
    /// into `Error::FunctionEvaluation`
    pub(crate) fn step(&self, stmt: &mut StatementHandle) -> Result<Step> {
        self.fault.clear();
        stmt.step().map_err(|err| self.fault.take().unwrap_or(err))
    }

    fn install<T: 'static>(
        &self,
        info: FunctionInfo,
        adapter: Box<T>,
        callbacks: Callbacks,
    ) -> Result<()> {
        let previous = self
            .functions
            .borrow_mut()
            .install(self.raw(), info, adapter, callbacks)?;
        if previous.is_some() {
            debug!("previous function released");
        }
        drop(previous);
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("locator", &self.locator)
            .field("functions", &self.functions.borrow().infos().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{AccessMode, ConnectionConfig};

    #[test]
    fn test_open_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(conn.locator(), MEMORY_LOCATOR);
        assert!(conn.is_autocommit());
        conn.close().unwrap();
    }

    #[test]
    fn test_open_missing_file_read_only_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let config = ConnectionConfig::new().mode(AccessMode::ReadOnly);

        match Connection::open_with_config(path.to_str().unwrap(), &config) {
            Err(Error::Open { locator, .. }) => assert!(locator.ends_with("missing.db")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_changes_and_rowid() {
        let conn = Connection::open_in_memory().unwrap();
        conn.executescript(
            "create table T (a INT);
             insert into T values (1), (2), (3);",
        )
        .unwrap();
        assert_eq!(conn.changes(), 3);
        assert_eq!(conn.last_insert_rowid(), 3);
    }

    #[test]
    fn test_transaction_visibility_across_cursors() {
        let conn = Connection::open_in_memory().unwrap();
        let mut writer = conn.cursor();
        let mut reader = conn.cursor();

        writer.executescript("create table T (a INT); begin;").unwrap();
        assert!(!conn.is_autocommit());
        writer.execute("insert into T values (?)", (7,)).unwrap();

        let mut rows = reader.execute("select a from T", ()).unwrap();
        assert_eq!(rows.next().unwrap().unwrap().column::<i64>(0).unwrap(), 7);
        drop(rows);
        reader.close();

        writer.executescript("commit;").unwrap();
        assert!(conn.is_autocommit());
    }
}
