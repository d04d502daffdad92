//! Row views
//!
//! A `Row` borrows the statement that produced it, so it cannot be used once
//! the statement has been stepped again, reset or finalized.

use super::statement::StatementHandle;
use crate::error::{Error, Result};
use crate::types::{FromSql, Value, ValueRef};

/// View over the current result row of a statement
#[derive(Debug, Clone, Copy)]
pub struct Row<'stmt> {
    stmt: &'stmt StatementHandle,
}

impl<'stmt> Row<'stmt> {
    pub(crate) fn new(stmt: &'stmt StatementHandle) -> Self {
        Self { stmt }
    }

    /// Number of columns in this row
    pub fn column_count(&self) -> usize {
        self.stmt.column_count()
    }

    /// Name of a column
    pub fn column_name(&self, index: usize) -> Option<String> {
        self.stmt.column_name(index)
    }

    /// Borrow the raw value of a column
    pub fn value_ref(&self, index: usize) -> Result<ValueRef<'stmt>> {
        let count = self.column_count();
        if index >= count {
            return Err(Error::InvalidColumnIndex { index, count });
        }
        Ok(self.stmt.column_value(index))
    }

    /// Extract a single column as `T`
    pub fn column<T: FromSql>(&self, index: usize) -> Result<T> {
        T::from_sql(self.value_ref(index)?)
    }

    /// Extract the whole row as a tuple.
    ///
    /// The tuple must be exactly as wide as the row. Columns are decoded left
    /// to right and the first failure discards everything decoded so far.
    pub fn get<T: FromRow>(&self) -> Result<T> {
        T::from_row(self)
    }

    /// Copy every column into an owned value
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.column_count()).map(|i| self.column(i)).collect()
    }

    fn expect_width(&self, width: usize) -> Result<()> {
        let found = self.column_count();
        if found != width {
            return Err(Error::Arity {
                what: "column(s)",
                expected: found,
                found: width,
            });
        }
        Ok(())
    }
}

/// Fixed-width tuples that a whole row can be extracted into
pub trait FromRow: Sized {
    /// Number of columns the tuple consumes
    const WIDTH: usize;

    fn from_row(row: &Row<'_>) -> Result<Self>;
}

macro_rules! tuple_from_row {
    ($width:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: FromSql),+> FromRow for ($($name,)+) {
            const WIDTH: usize = $width;

            fn from_row(row: &Row<'_>) -> Result<Self> {
                row.expect_width(Self::WIDTH)?;
                Ok(($(row.column::<$name>($idx)?,)+))
            }
        }
    };
}

tuple_from_row!(1; A 0);
tuple_from_row!(2; A 0, B 1);
tuple_from_row!(3; A 0, B 1, C 2);
tuple_from_row!(4; A 0, B 1, C 2, D 3);
tuple_from_row!(5; A 0, B 1, C 2, D 3, E 4);
tuple_from_row!(6; A 0, B 1, C 2, D 3, E 4, F 5);
tuple_from_row!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_from_row!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
tuple_from_row!(9; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8);
tuple_from_row!(10; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9);
tuple_from_row!(11; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10);
tuple_from_row!(12; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;

    #[test]
    fn test_tuple_width_must_match() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cursor = conn.cursor();
        let mut rows = cursor.execute("select 1, 'a'", ()).unwrap();
        let row = rows.next().unwrap().unwrap();

        assert_eq!(row.get::<(i64, String)>().unwrap(), (1, "a".to_string()));
        assert!(matches!(
            row.get::<(i64,)>(),
            Err(Error::Arity {
                expected: 2,
                found: 1,
                ..
            })
        ));
        assert!(matches!(
            row.column::<i64>(5),
            Err(Error::InvalidColumnIndex { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_values_and_names() {
        let conn = Connection::open_in_memory().unwrap();
        let mut cursor = conn.cursor();
        let mut rows = cursor.execute("select 1 as a, null as b, x'00' as c", ()).unwrap();
        let row = rows.next().unwrap().unwrap();

        assert_eq!(row.column_name(1).as_deref(), Some("b"));
        assert_eq!(
            row.values().unwrap(),
            vec![Value::Integer(1), Value::Null, Value::Blob(vec![0])]
        );
    }
}
