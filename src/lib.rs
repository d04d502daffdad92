//! arclite - A typed binding layer over the embedded SQLite engine
//!
//! This library provides the pieces between native Rust values and the engine:
//! - Value codec (bind and extract conversions, positional parameters)
//! - Statements, cursors and typed row extraction
//! - Native closures registered as SQL scalar and aggregate functions
//! - Connections and their configuration
//!
//! ```no_run
//! use arclite::{Connection, FunctionFlags};
//!
//! let conn = Connection::open_in_memory()?;
//! conn.create_scalar("plus123", |x: i64| x + 123, FunctionFlags::default())?;
//!
//! let mut cursor = conn.cursor();
//! let mut rows = cursor.execute("select plus123(?)", (1,))?;
//! while let Some(row) = rows.next()? {
//!     let (n,): (i64,) = row.get()?;
//!     println!("{}", n);
//! }
//! # Ok::<(), arclite::Error>(())
//! ```

pub mod connection;
pub mod cursor;
pub mod error;
pub mod functions;
pub mod types;

pub use connection::{AccessMode, Connection, ConnectionConfig, MEMORY_LOCATOR};
pub use cursor::{is_complete, Cursor, CursorState, FromRow, MappedRows, Row, Rows, TypedRows};
pub use error::{Error, Result};
pub use functions::{
    Aggregate, Arguments, FromArguments, FunctionError, FunctionFlags, FunctionInfo, FunctionKind,
    FunctionResult, ScalarFunction,
};
pub use types::{FromSql, Null, Params, ToSql, Type, Value, ValueRef};
