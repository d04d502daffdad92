//! Positional parameter lists
//!
//! A `Params` value binds its items to placeholders `1..=count()` in order.

use super::codec::ToSql;
use crate::cursor::StatementHandle;
use crate::error::Result;

/// A positional list of values to bind to a prepared statement
pub trait Params {
    /// Number of values in the list
    fn count(&self) -> usize;

    /// Bind every value, left to right, starting at parameter 1
    fn bind_to(&self, stmt: &mut StatementHandle) -> Result<()>;
}

impl Params for () {
    fn count(&self) -> usize {
        0
    }

    fn bind_to(&self, _stmt: &mut StatementHandle) -> Result<()> {
        Ok(())
    }
}

impl<T: ToSql> Params for &[T] {
    fn count(&self) -> usize {
        self.len()
    }

    fn bind_to(&self, stmt: &mut StatementHandle) -> Result<()> {
        for (i, value) in self.iter().enumerate() {
            stmt.bind(i + 1, value)?;
        }
        Ok(())
    }
}

impl<T: ToSql> Params for Vec<T> {
    fn count(&self) -> usize {
        self.len()
    }

    fn bind_to(&self, stmt: &mut StatementHandle) -> Result<()> {
        self.as_slice().bind_to(stmt)
    }
}

impl<T: ToSql, const N: usize> Params for [T; N] {
    fn count(&self) -> usize {
        N
    }

    fn bind_to(&self, stmt: &mut StatementHandle) -> Result<()> {
        self.as_slice().bind_to(stmt)
    }
}

macro_rules! tuple_params {
    ($count:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: ToSql),+> Params for ($($name,)+) {
            fn count(&self) -> usize {
                $count
            }

            fn bind_to(&self, stmt: &mut StatementHandle) -> Result<()> {
                $(stmt.bind($idx + 1, &self.$idx)?;)+
                Ok(())
            }
        }
    };
}

tuple_params!(1; A 0);
tuple_params!(2; A 0, B 1);
tuple_params!(3; A 0, B 1, C 2);
tuple_params!(4; A 0, B 1, C 2, D 3);
tuple_params!(5; A 0, B 1, C 2, D 3, E 4);
tuple_params!(6; A 0, B 1, C 2, D 3, E 4, F 5);
tuple_params!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_params!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
tuple_params!(9; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8);
tuple_params!(10; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9);
tuple_params!(11; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10);
tuple_params!(12; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11);
