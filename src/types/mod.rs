//! Types module
//!
//! This module contains the dynamic value model and the codec between native
//! Rust values and engine values.

pub mod codec;
pub mod params;
pub mod value;

pub use codec::{FromSql, Null, ToSql};
pub use params::Params;
pub use value::{Type, Value, ValueRef};
