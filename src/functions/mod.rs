//! Functions module
//!
//! This module exposes native closures to SQL as scalar and aggregate
//! functions:
//! - Argument decoding and result encoding at the engine boundary
//! - Scalar and aggregate adapters with their trampolines
//! - The registry that owns every adapter

pub mod aggregate;
pub mod context;
pub mod flags;
pub mod registry;
pub mod scalar;

pub use aggregate::Aggregate;
pub use context::{Arguments, FromArguments, FunctionError, FunctionResult};
pub use flags::FunctionFlags;
pub use registry::{FunctionInfo, FunctionKind};
pub use scalar::ScalarFunction;
