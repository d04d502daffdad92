//! Value codec
//!
//! `ToSql` maps a native value onto the storage class it binds as, and
//! `FromSql` coerces an engine value back into a native type. The set of
//! supported native types is closed: a type without an impl is rejected at
//! compile time.

use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;

use super::value::{Type, Value, ValueRef};
use crate::error::{Error, Result};

/// Explicit NULL sentinel for binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Null;

/// Native types that can be bound as a statement parameter or returned from a
/// SQL function.
pub trait ToSql {
    fn to_sql(&self) -> Result<ValueRef<'_>>;
}

/// Native types a column or function argument can be extracted into.
pub trait FromSql: Sized {
    fn from_sql(value: ValueRef<'_>) -> Result<Self>;
}

// ========== Bind ==========

macro_rules! to_sql_lossless_integer {
    ($($t:ty),*) => {$(
        impl ToSql for $t {
            fn to_sql(&self) -> Result<ValueRef<'_>> {
                Ok(ValueRef::Integer(i64::from(*self)))
            }
        }
    )*};
}

to_sql_lossless_integer!(i8, i16, i32, i64, u8, u16, u32, bool);

macro_rules! to_sql_checked_integer {
    ($($t:ty),*) => {$(
        impl ToSql for $t {
            fn to_sql(&self) -> Result<ValueRef<'_>> {
                i64::try_from(*self)
                    .map(ValueRef::Integer)
                    .map_err(|_| Error::TypeMismatch {
                        from: stringify!($t),
                        to: Type::Integer.name(),
                    })
            }
        }
    )*};
}

to_sql_checked_integer!(u64, usize, isize);

impl ToSql for f64 {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Float(*self))
    }
}

impl ToSql for f32 {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Float(f64::from(*self)))
    }
}

impl ToSql for str {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Text(self.as_bytes()))
    }
}

impl ToSql for String {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Text(self.as_bytes()))
    }
}

impl ToSql for Cow<'_, str> {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Text(self.as_bytes()))
    }
}

impl ToSql for [u8] {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Blob(self))
    }
}

impl ToSql for Vec<u8> {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Blob(self))
    }
}

impl<const N: usize> ToSql for [u8; N] {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Blob(self))
    }
}

impl ToSql for Bytes {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Blob(self))
    }
}

impl ToSql for Null {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(ValueRef::Null)
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        match self {
            Some(v) => v.to_sql(),
            None => Ok(ValueRef::Null),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(self.as_ref())
    }
}

impl ToSql for ValueRef<'_> {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        Ok(*self)
    }
}

impl<T: ToSql + ?Sized> ToSql for &T {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        (**self).to_sql()
    }
}

impl<T: ToSql + ?Sized> ToSql for Box<T> {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        (**self).to_sql()
    }
}

impl<T: ToSql + ?Sized> ToSql for Rc<T> {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        (**self).to_sql()
    }
}

impl<T: ToSql + ?Sized> ToSql for Arc<T> {
    fn to_sql(&self) -> Result<ValueRef<'_>> {
        (**self).to_sql()
    }
}

// ========== Extract ==========

fn mismatch<T>(value: ValueRef<'_>) -> Error {
    match value {
        ValueRef::Null => Error::null_conversion::<T>(),
        other => Error::type_mismatch::<T>(other.data_type().name()),
    }
}

macro_rules! from_sql_integer {
    ($($t:ty),*) => {$(
        impl FromSql for $t {
            fn from_sql(value: ValueRef<'_>) -> Result<Self> {
                match value {
                    ValueRef::Integer(i) => <$t>::try_from(i)
                        .map_err(|_| Error::type_mismatch::<$t>("INTEGER (out of range)")),
                    other => Err(mismatch::<$t>(other)),
                }
            }
        }
    )*};
}

from_sql_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromSql for bool {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Integer(i) => Ok(i != 0),
            other => Err(mismatch::<bool>(other)),
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Integer(i) => Ok(i as f64),
            ValueRef::Float(f) => Ok(f),
            other => Err(mismatch::<f64>(other)),
        }
    }
}

impl FromSql for f32 {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Integer(i) => {
                let f = i as f32;
                if f as i128 == i128::from(i) {
                    Ok(f)
                } else {
                    Err(Error::type_mismatch::<f32>("INTEGER (inexact)"))
                }
            }
            ValueRef::Float(f) => Ok(f as f32),
            other => Err(mismatch::<f32>(other)),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Text(t) => std::str::from_utf8(t)
                .map(str::to_owned)
                .map_err(|_| Error::type_mismatch::<String>("TEXT (invalid UTF-8)")),
            other => Err(mismatch::<String>(other)),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Blob(b) => Ok(b.to_vec()),
            other => Err(mismatch::<Vec<u8>>(other)),
        }
    }
}

impl FromSql for Bytes {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Blob(b) => Ok(Bytes::copy_from_slice(b)),
            other => Err(mismatch::<Bytes>(other)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Null => Ok(None),
            other => T::from_sql(other).map(Some),
        }
    }
}

impl FromSql for Value {
    fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Float(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Text(String::from_sql(ValueRef::Text(t))?),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        })
    }
}
