//! Cursor and row iteration
//!
//! A `Cursor` owns at most one prepared statement and walks it through the
//! `Idle -> Prepared -> HasRow -> Done` state machine.

use std::marker::PhantomData;

use tracing::{debug, warn};

use super::row::{FromRow, Row};
use super::statement::{StatementHandle, Step};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::Params;

/// Execution state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No prepared statement
    Idle,
    /// Statement compiled and bound, not stepped yet
    Prepared,
    /// The last step produced a row
    HasRow,
    /// The statement ran to completion
    Done,
}

/// Statement executor bound to one connection
pub struct Cursor<'conn> {
    conn: &'conn Connection,
    stmt: Option<StatementHandle>,
    state: CursorState,
    /// The current row has been stepped to but not handed out yet
    row_pending: bool,
}

impl<'conn> Cursor<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            stmt: None,
            state: CursorState::Idle,
            row_pending: false,
        }
    }

    /// Current execution state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Compile `sql` and bind `params` without stepping.
    ///
    /// Any previous statement is finalized first. If binding fails the new
    /// statement is finalized too and the cursor is left `Idle`.
    pub fn prepare<P: Params>(&mut self, sql: &str, params: P) -> Result<()> {
        self.close();

        let (stmt, consumed) = StatementHandle::prepare(self.conn.raw(), sql)?;
        self.warn_on_trailing_sql(&sql[consumed..]);

        let Some(mut stmt) = stmt else {
            self.state = CursorState::Done;
            return Ok(());
        };

        let expected = stmt.parameter_count();
        if params.count() != expected {
            return Err(Error::Arity {
                what: "parameter(s)",
                expected,
                found: params.count(),
            });
        }
        params.bind_to(&mut stmt)?;

        self.stmt = Some(stmt);
        self.state = CursorState::Prepared;
        Ok(())
    }

    /// Compile, bind and run the first step of `sql`.
    ///
    /// Statements with side effects have taken effect when this returns,
    /// whether or not the returned rows are iterated.
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> Result<Rows<'_, 'conn>> {
        self.prepare(sql, params)?;
        if self.state == CursorState::Prepared {
            self.advance()?;
            self.row_pending = self.state == CursorState::HasRow;
        }
        Ok(Rows { cursor: self })
    }

    /// Run every statement in `sql` to completion, discarding rows.
    ///
    /// The first failing statement aborts the script and its error is
    /// returned. The cursor is `Idle` afterwards.
    pub fn executescript(&mut self, sql: &str) -> Result<()> {
        self.close();

        let mut rest = sql;
        let mut executed = 0usize;
        while !rest.trim().is_empty() {
            let (stmt, consumed) = StatementHandle::prepare(self.conn.raw(), rest)?;
            rest = &rest[consumed..];

            let Some(mut stmt) = stmt else {
                if consumed == 0 {
                    break;
                }
                continue;
            };
            while self.conn.step(&mut stmt)? == Step::Row {}
            executed += 1;
        }

        debug!(statements = executed, "script executed");
        Ok(())
    }

    /// Resume iteration over the current statement.
    ///
    /// After the statement is exhausted or has failed this yields nothing.
    pub fn rows(&mut self) -> Rows<'_, 'conn> {
        Rows { cursor: self }
    }

    /// Names of the result columns of the current statement
    pub fn column_names(&self) -> Vec<String> {
        match &self.stmt {
            Some(stmt) => (0..stmt.column_count())
                .map(|i| stmt.column_name(i).unwrap_or_default())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Finalize the current statement, if any
    pub fn close(&mut self) {
        self.stmt = None;
        self.state = CursorState::Idle;
        self.row_pending = false;
    }

    fn advance(&mut self) -> Result<()> {
        let Some(stmt) = self.stmt.as_mut() else {
            self.state = CursorState::Idle;
            return Ok(());
        };

        match self.conn.step(stmt) {
            Ok(Step::Row) => self.state = CursorState::HasRow,
            Ok(Step::Done) => self.state = CursorState::Done,
            Err(err) => {
                self.close();
                return Err(err);
            }
        }
        Ok(())
    }

    fn warn_on_trailing_sql(&self, rest: &str) {
        if rest.trim().is_empty() {
            return;
        }
        // Comments alone compile to nothing.
        if let Ok((Some(_), _)) = StatementHandle::prepare(self.conn.raw(), rest) {
            warn!(ignored = %rest.trim(), "execute runs only the first statement");
        }
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("state", &self.state)
            .field("sql", &self.stmt.as_ref().map(StatementHandle::sql))
            .finish()
    }
}

/// Single-pass sequence of rows produced by a cursor
pub struct Rows<'c, 'conn> {
    cursor: &'c mut Cursor<'conn>,
}

impl<'c, 'conn> Rows<'c, 'conn> {
    /// Step to the next row.
    ///
    /// Returns `Ok(None)` once the statement is exhausted, and forever after.
    /// A step error finalizes the statement, so the sequence ends there too.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Row<'_>>> {
        let cursor = &mut *self.cursor;
        match cursor.state {
            CursorState::Idle | CursorState::Done => return Ok(None),
            CursorState::HasRow if cursor.row_pending => cursor.row_pending = false,
            CursorState::Prepared | CursorState::HasRow => {
                cursor.advance()?;
                if cursor.state != CursorState::HasRow {
                    return Ok(None);
                }
            }
        }
        Ok(cursor.stmt.as_ref().map(Row::new))
    }

    /// Number of result columns
    pub fn column_count(&self) -> usize {
        self.cursor
            .stmt
            .as_ref()
            .map_or(0, StatementHandle::column_count)
    }

    /// Names of the result columns
    pub fn column_names(&self) -> Vec<String> {
        self.cursor.column_names()
    }

    /// Iterate rows extracted as `T`
    pub fn typed<T: FromRow>(self) -> TypedRows<'c, 'conn, T> {
        TypedRows {
            rows: self,
            failed: false,
            _marker: PhantomData,
        }
    }

    /// Iterate rows through `f`
    pub fn mapped<T, F>(self, f: F) -> MappedRows<'c, 'conn, F>
    where
        F: FnMut(&Row<'_>) -> Result<T>,
    {
        MappedRows {
            rows: self,
            f,
            failed: false,
        }
    }
}

/// Iterator over rows extracted into a tuple type
pub struct TypedRows<'c, 'conn, T> {
    rows: Rows<'c, 'conn>,
    failed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromRow> Iterator for TypedRows<'_, '_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.rows.next() {
            Ok(Some(row)) => row.get::<T>(),
            Ok(None) => return None,
            Err(err) => Err(err),
        };
        self.failed = item.is_err();
        Some(item)
    }
}

/// Iterator over rows passed through a mapping closure
pub struct MappedRows<'c, 'conn, F> {
    rows: Rows<'c, 'conn>,
    f: F,
    failed: bool,
}

impl<T, F> Iterator for MappedRows<'_, '_, F>
where
    F: FnMut(&Row<'_>) -> Result<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.rows.next() {
            Ok(Some(row)) => (self.f)(&row),
            Ok(None) => return None,
            Err(err) => Err(err),
        };
        self.failed = item.is_err();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.cursor()
            .executescript(
                "create table T (a INT, b TEXT);
                 insert into T values (1, 'x'), (2, 'y'), (3, 'z');",
            )
            .unwrap();
        conn
    }

    #[test]
    fn test_state_transitions() {
        let conn = seeded();
        let mut cursor = conn.cursor();
        assert_eq!(cursor.state(), CursorState::Idle);

        cursor.prepare("select a from T order by a", ()).unwrap();
        assert_eq!(cursor.state(), CursorState::Prepared);

        {
            let mut rows = cursor.rows();
            assert_eq!(rows.next().unwrap().unwrap().column::<i64>(0).unwrap(), 1);
        }
        assert_eq!(cursor.state(), CursorState::HasRow);

        let rest: Vec<i64> = cursor
            .rows()
            .typed::<(i64,)>()
            .map(|r| r.map(|(a,)| a))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rest, vec![2, 3]);
        assert_eq!(cursor.state(), CursorState::Done);

        cursor.close();
        assert_eq!(cursor.state(), CursorState::Idle);
    }

    #[test]
    fn test_execute_applies_side_effects_without_iteration() {
        let conn = seeded();
        let mut cursor = conn.cursor();
        cursor.execute("insert into T values (?, ?)", (4, "w")).unwrap();

        let mut rows = cursor.execute("select count(*) from T", ()).unwrap();
        let (count,): (i64,) = rows.next().unwrap().unwrap().get().unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let conn = seeded();
        let mut cursor = conn.cursor();
        let err = cursor
            .execute("select * from T where a > ? and a < ?", (1,))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Arity {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert_eq!(cursor.state(), CursorState::Idle);
    }

    #[test]
    fn test_bind_failure_requires_new_execute() {
        let conn = seeded();
        let mut cursor = conn.cursor();
        let err = cursor.execute("select ?, ?", (1, u64::MAX)).err().unwrap();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(cursor.state(), CursorState::Idle);
        assert!(cursor.rows().next().unwrap().is_none());
    }

    #[test]
    fn test_runtime_error_ends_sequence() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cursor = conn.cursor();
        cursor
            .executescript("create table U (id INTEGER PRIMARY KEY, v TEXT NOT NULL);")
            .unwrap();

        match cursor.execute("insert into U values (1, NULL)", ()) {
            Err(Error::Runtime { message, .. }) => assert!(message.contains("NOT NULL")),
            other => panic!("unexpected {:?}", other.is_ok()),
        }
        assert_eq!(cursor.state(), CursorState::Idle);
        assert!(cursor.rows().next().unwrap().is_none());
    }

    #[test]
    fn test_executescript_stops_at_first_failure() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cursor = conn.cursor();
        let err = cursor
            .executescript(
                "create table V (a INT);
                 insert into V values (1);
                 insert into missing values (2);
                 insert into V values (3);",
            )
            .err()
            .unwrap();
        assert!(matches!(err, Error::Syntax { .. }));

        let mut rows = cursor.execute("select count(*) from V", ()).unwrap();
        assert_eq!(rows.next().unwrap().unwrap().column::<i64>(0).unwrap(), 1);
    }

    #[test]
    fn test_blank_sql_yields_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cursor = conn.cursor();
        let mut rows = cursor.execute("   ", ()).unwrap();
        assert!(rows.next().unwrap().is_none());
        assert_eq!(cursor.state(), CursorState::Done);
    }
}
