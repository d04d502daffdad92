//! Cursor module
//!
//! This module contains statement handles, cursors, and row views.

pub mod cursor;
pub mod row;
pub mod statement;

pub use cursor::{Cursor, CursorState, MappedRows, Rows, TypedRows};
pub use row::{FromRow, Row};
pub use statement::{is_complete, StatementHandle, Step};
