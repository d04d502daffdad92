//! Prepared statement handle
//!
//! `StatementHandle` owns exactly one `sqlite3_stmt` and finalizes it when
//! dropped.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr::{self, NonNull};

use libsqlite3_sys as ffi;
use tracing::{debug, trace};

use crate::connection::error_message;
use crate::error::{Error, Result};
use crate::types::{ToSql, ValueRef};

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A result row is available
    Row,
    /// The statement ran to completion
    Done,
}

/// Owned prepared statement
#[derive(Debug)]
pub struct StatementHandle {
    raw: NonNull<ffi::sqlite3_stmt>,
}

/// Convert a byte length into the engine's length type
pub(crate) fn engine_len(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| Error::ValueTooLarge(len))
}

impl StatementHandle {
    /// Compile the first statement of `sql`.
    ///
    /// Returns `None` when `sql` holds no statement (blank or comments only),
    /// together with the byte offset at which the unparsed remainder starts.
    pub(crate) fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<(Option<Self>, usize)> {
        let len = engine_len(sql.len())?;
        let mut raw = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();

        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, sql.as_ptr() as *const c_char, len, &mut raw, &mut tail)
        };
        if rc != ffi::SQLITE_OK {
            let message = unsafe { error_message(db) };
            debug!(%message, "prepare failed");
            return Err(Error::Syntax { message });
        }

        let consumed = if tail.is_null() {
            sql.len()
        } else {
            tail as usize - sql.as_ptr() as usize
        };

        let handle = NonNull::new(raw).map(|raw| Self { raw });
        if handle.is_some() {
            trace!(sql = %sql.get(..consumed).unwrap_or(sql).trim(), "statement prepared");
        }
        Ok((handle, consumed))
    }

    fn db(&self) -> *mut ffi::sqlite3 {
        unsafe { ffi::sqlite3_db_handle(self.raw.as_ptr()) }
    }

    /// Advance the statement by one step
    pub fn step(&mut self) -> Result<Step> {
        match unsafe { ffi::sqlite3_step(self.raw.as_ptr()) } {
            ffi::SQLITE_ROW => Ok(Step::Row),
            ffi::SQLITE_DONE => Ok(Step::Done),
            code => Err(Error::Runtime {
                code,
                message: unsafe { error_message(self.db()) },
            }),
        }
    }

    /// Rewind the statement so it can be stepped again; bindings are kept
    pub fn reset(&mut self) {
        unsafe {
            ffi::sqlite3_reset(self.raw.as_ptr());
        }
    }

    /// Number of `?` placeholders in the statement
    pub fn parameter_count(&self) -> usize {
        unsafe { ffi::sqlite3_bind_parameter_count(self.raw.as_ptr()) as usize }
    }

    /// Bind one value to the 1-based parameter `index`
    pub fn bind<V: ToSql + ?Sized>(&mut self, index: usize, value: &V) -> Result<()> {
        let value = value.to_sql()?;
        let slot = engine_len(index)?;
        let raw = self.raw.as_ptr();

        let rc = unsafe {
            match value {
                ValueRef::Null => ffi::sqlite3_bind_null(raw, slot),
                ValueRef::Integer(v) => ffi::sqlite3_bind_int64(raw, slot, v),
                ValueRef::Float(v) => ffi::sqlite3_bind_double(raw, slot, v),
                ValueRef::Text(t) => ffi::sqlite3_bind_text(
                    raw,
                    slot,
                    t.as_ptr() as *const c_char,
                    engine_len(t.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
                ValueRef::Blob(b) => ffi::sqlite3_bind_blob(
                    raw,
                    slot,
                    b.as_ptr() as *const c_void,
                    engine_len(b.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
            }
        };

        if rc != ffi::SQLITE_OK {
            return Err(Error::Runtime {
                code: rc,
                message: unsafe { error_message(self.db()) },
            });
        }
        trace!(index, storage = %value.data_type(), "parameter bound");
        Ok(())
    }

    /// Number of columns in the result set
    pub fn column_count(&self) -> usize {
        unsafe { ffi::sqlite3_column_count(self.raw.as_ptr()) as usize }
    }

    /// Name of a result column
    pub fn column_name(&self, index: usize) -> Option<String> {
        if index >= self.column_count() {
            return None;
        }
        unsafe {
            let name = ffi::sqlite3_column_name(self.raw.as_ptr(), index as c_int);
            if name.is_null() {
                None
            } else {
                Some(CStr::from_ptr(name).to_string_lossy().into_owned())
            }
        }
    }

    /// Read a column of the current row.
    ///
    /// Only meaningful after `step` returned `Step::Row`; the caller checks
    /// `index` against `column_count`.
    pub(crate) fn column_value(&self, index: usize) -> ValueRef<'_> {
        let raw = self.raw.as_ptr();
        let i = index as c_int;
        unsafe {
            match ffi::sqlite3_column_type(raw, i) {
                ffi::SQLITE_INTEGER => ValueRef::Integer(ffi::sqlite3_column_int64(raw, i)),
                ffi::SQLITE_FLOAT => ValueRef::Float(ffi::sqlite3_column_double(raw, i)),
                ffi::SQLITE_TEXT => {
                    let text = ffi::sqlite3_column_text(raw, i);
                    let len = ffi::sqlite3_column_bytes(raw, i) as usize;
                    ValueRef::Text(raw_slice(text as *const u8, len))
                }
                ffi::SQLITE_BLOB => {
                    let blob = ffi::sqlite3_column_blob(raw, i);
                    let len = ffi::sqlite3_column_bytes(raw, i) as usize;
                    ValueRef::Blob(raw_slice(blob as *const u8, len))
                }
                _ => ValueRef::Null,
            }
        }
    }

    /// SQL text the statement was compiled from
    pub fn sql(&self) -> String {
        unsafe {
            let sql = ffi::sqlite3_sql(self.raw.as_ptr());
            if sql.is_null() {
                String::new()
            } else {
                CStr::from_ptr(sql).to_string_lossy().into_owned()
            }
        }
    }
}

/// Check if `sql` ends with a complete statement.
///
/// A semicolon inside a string literal, a comment or an unfinished trigger
/// body does not complete a statement.
pub fn is_complete(sql: &str) -> bool {
    match CString::new(sql) {
        Ok(sql) => unsafe { ffi::sqlite3_complete(sql.as_ptr()) != 0 },
        Err(_) => false,
    }
}

/// Borrow engine-owned bytes; a null pointer reads as empty
pub(crate) unsafe fn raw_slice<'a>(data: *const u8, len: usize) -> &'a [u8] {
    if data.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data, len)
    }
}

impl Drop for StatementHandle {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_finalize(self.raw.as_ptr());
        }
        debug!("statement finalized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::types::Value;

    #[test]
    fn test_prepare_reports_tail_and_blank_sql() {
        let conn = Connection::open_in_memory().unwrap();

        let sql = "select 1; select 2";
        let (stmt, consumed) = StatementHandle::prepare(conn.raw(), sql).unwrap();
        assert!(stmt.is_some());
        assert_eq!(sql[consumed..].trim(), "select 2");

        let (stmt, _) = StatementHandle::prepare(conn.raw(), "  -- nothing\n").unwrap();
        assert!(stmt.is_none());
    }

    #[test]
    fn test_bind_step_and_read() {
        let conn = Connection::open_in_memory().unwrap();
        let (stmt, _) = StatementHandle::prepare(conn.raw(), "select ?, ?, ?, ?, ?").unwrap();
        let mut stmt = stmt.unwrap();

        assert_eq!(stmt.parameter_count(), 5);
        stmt.bind(1, &7i64).unwrap();
        stmt.bind(2, &2.5f64).unwrap();
        stmt.bind(3, "hi").unwrap();
        stmt.bind(4, &vec![0u8, 1]).unwrap();
        stmt.bind(5, &Value::Null).unwrap();

        assert_eq!(stmt.step().unwrap(), Step::Row);
        assert_eq!(stmt.column_count(), 5);
        assert_eq!(stmt.column_value(0), ValueRef::Integer(7));
        assert_eq!(stmt.column_value(1), ValueRef::Float(2.5));
        assert_eq!(stmt.column_value(2), ValueRef::Text(b"hi"));
        assert_eq!(stmt.column_value(3), ValueRef::Blob(&[0, 1]));
        assert_eq!(stmt.column_value(4), ValueRef::Null);
        assert_eq!(stmt.step().unwrap(), Step::Done);

        stmt.reset();
        assert_eq!(stmt.step().unwrap(), Step::Row);
    }

    #[test]
    fn test_is_complete() {
        assert!(is_complete("select 1;"));
        assert!(!is_complete("select 1"));
        assert!(!is_complete("select ';"));
        assert!(!is_complete("create trigger t after insert on T begin select 1;"));
    }

    #[test]
    fn test_syntax_error_carries_engine_text() {
        let conn = Connection::open_in_memory().unwrap();
        match StatementHandle::prepare(conn.raw(), "selec 1") {
            Err(Error::Syntax { message }) => assert!(message.contains("syntax error")),
            other => panic!("unexpected {:?}", other.map(|(s, _)| s.is_some())),
        }
    }
}
