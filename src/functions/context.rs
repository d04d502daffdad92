//! Callback context
//!
//! Everything a trampoline needs at the engine boundary: decoding the argument
//! vector, encoding the result, and turning failures into engine errors.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_void};

use libsqlite3_sys as ffi;
use tracing::warn;

use crate::cursor::statement::{engine_len, raw_slice};
use crate::error::{Error, Result};
use crate::types::{FromSql, ToSql, ValueRef};

/// Error type a registered closure may fail with
pub type FunctionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Raw scalar/step callback signature
pub(crate) type RawStep =
    unsafe extern "C" fn(*mut ffi::sqlite3_context, c_int, *mut *mut ffi::sqlite3_value);

/// Raw final callback signature
pub(crate) type RawFinal = unsafe extern "C" fn(*mut ffi::sqlite3_context);

/// Argument vector of one function invocation
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    values: &'a [*mut ffi::sqlite3_value],
}

impl<'a> Arguments<'a> {
    pub(crate) unsafe fn from_raw(argc: c_int, argv: *mut *mut ffi::sqlite3_value) -> Self {
        let values = if argc <= 0 || argv.is_null() {
            &[][..]
        } else {
            std::slice::from_raw_parts(argv as *const *mut ffi::sqlite3_value, argc as usize)
        };
        Self { values }
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the function was called without arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the raw value of an argument
    pub fn value_ref(&self, index: usize) -> Result<ValueRef<'a>> {
        let value = self.values.get(index).ok_or(Error::Arity {
            what: "argument(s)",
            expected: index + 1,
            found: self.values.len(),
        })?;
        Ok(unsafe { decode_value(*value) })
    }

    /// Extract an argument as `T`
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T> {
        T::from_sql(self.value_ref(index)?)
    }
}

unsafe fn decode_value<'a>(value: *mut ffi::sqlite3_value) -> ValueRef<'a> {
    match ffi::sqlite3_value_type(value) {
        ffi::SQLITE_INTEGER => ValueRef::Integer(ffi::sqlite3_value_int64(value)),
        ffi::SQLITE_FLOAT => ValueRef::Float(ffi::sqlite3_value_double(value)),
        ffi::SQLITE_TEXT => {
            let text = ffi::sqlite3_value_text(value);
            let len = ffi::sqlite3_value_bytes(value) as usize;
            ValueRef::Text(raw_slice(text as *const u8, len))
        }
        ffi::SQLITE_BLOB => {
            let blob = ffi::sqlite3_value_blob(value);
            let len = ffi::sqlite3_value_bytes(value) as usize;
            ValueRef::Blob(raw_slice(blob as *const u8, len))
        }
        _ => ValueRef::Null,
    }
}

/// Fixed-arity argument tuples a function can declare
pub trait FromArguments: Sized {
    /// Number of SQL arguments consumed
    const ARITY: usize;

    fn from_arguments(args: &Arguments<'_>) -> Result<Self>;
}

impl FromArguments for () {
    const ARITY: usize = 0;

    fn from_arguments(_args: &Arguments<'_>) -> Result<Self> {
        Ok(())
    }
}

macro_rules! tuple_from_arguments {
    ($arity:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: FromSql),+> FromArguments for ($($name,)+) {
            const ARITY: usize = $arity;

            fn from_arguments(args: &Arguments<'_>) -> Result<Self> {
                if args.len() != Self::ARITY {
                    return Err(Error::Arity {
                        what: "argument(s)",
                        expected: Self::ARITY,
                        found: args.len(),
                    });
                }
                Ok(($(args.get::<$name>($idx)?,)+))
            }
        }
    };
}

tuple_from_arguments!(1; A 0);
tuple_from_arguments!(2; A 0, B 1);
tuple_from_arguments!(3; A 0, B 1, C 2);
tuple_from_arguments!(4; A 0, B 1, C 2, D 3);
tuple_from_arguments!(5; A 0, B 1, C 2, D 3, E 4);
tuple_from_arguments!(6; A 0, B 1, C 2, D 3, E 4, F 5);
tuple_from_arguments!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_from_arguments!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Return types of registered closures: a plain value, or a `Result` whose
/// error is reported to the engine.
pub trait FunctionResult {
    type Output: ToSql;

    fn into_result(self) -> std::result::Result<Self::Output, FunctionError>;
}

impl<T: ToSql> FunctionResult for T {
    type Output = T;

    fn into_result(self) -> std::result::Result<T, FunctionError> {
        Ok(self)
    }
}

impl<T: ToSql, E: Into<FunctionError>> FunctionResult for std::result::Result<T, E> {
    type Output = T;

    fn into_result(self) -> std::result::Result<T, FunctionError> {
        self.map_err(Into::into)
    }
}

/// Most recent function failure on a connection.
///
/// Trampolines record here what they report to the engine, so the cursor
/// whose step failed can surface a typed error instead of the engine's text.
#[derive(Debug, Default)]
pub(crate) struct FaultSlot {
    fault: RefCell<Option<(String, String)>>,
}

impl FaultSlot {
    fn record(&self, function: &str, message: &str) {
        let mut fault = self.fault.borrow_mut();
        if fault.is_none() {
            *fault = Some((function.to_string(), message.to_string()));
        }
    }

    /// Whether a function has failed during the current step
    pub(crate) fn is_pending(&self) -> bool {
        self.fault.borrow().is_some()
    }

    pub(crate) fn clear(&self) {
        self.fault.borrow_mut().take();
    }

    pub(crate) fn take(&self) -> Option<Error> {
        self.fault
            .borrow_mut()
            .take()
            .map(|(function, message)| Error::FunctionEvaluation { function, message })
    }
}

/// Render a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

/// Flatten a caught closure outcome into a function result
pub(crate) fn flatten<T>(
    outcome: std::thread::Result<std::result::Result<T, FunctionError>>,
) -> std::result::Result<T, FunctionError> {
    match outcome {
        Ok(result) => result,
        Err(payload) => Err(panic_message(&*payload).into()),
    }
}

/// Result side of one function invocation
pub(crate) struct ResultContext {
    raw: *mut ffi::sqlite3_context,
}

impl ResultContext {
    pub(crate) fn new(raw: *mut ffi::sqlite3_context) -> Self {
        Self { raw }
    }

    pub(crate) fn raw(&self) -> *mut ffi::sqlite3_context {
        self.raw
    }

    /// Pointer registered as the function's user data
    pub(crate) fn user_data(&self) -> *mut c_void {
        unsafe { ffi::sqlite3_user_data(self.raw) }
    }

    fn set(&self, value: ValueRef<'_>) -> Result<()> {
        unsafe {
            match value {
                ValueRef::Null => ffi::sqlite3_result_null(self.raw),
                ValueRef::Integer(v) => ffi::sqlite3_result_int64(self.raw, v),
                ValueRef::Float(v) => ffi::sqlite3_result_double(self.raw, v),
                ValueRef::Text(t) => ffi::sqlite3_result_text(
                    self.raw,
                    t.as_ptr() as *const c_char,
                    engine_len(t.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
                ValueRef::Blob(b) => ffi::sqlite3_result_blob(
                    self.raw,
                    b.as_ptr() as *const c_void,
                    engine_len(b.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
            }
        }
        Ok(())
    }

    pub(crate) fn set_null(&self) {
        unsafe { ffi::sqlite3_result_null(self.raw) }
    }

    /// Report a function failure to the engine and record it on the connection
    pub(crate) fn fail(&self, function: &str, fault: &FaultSlot, message: &str) {
        warn!(function, %message, "function evaluation failed");
        fault.record(function, message);
        let len = c_int::try_from(message.len()).unwrap_or(c_int::MAX);
        unsafe { ffi::sqlite3_result_error(self.raw, message.as_ptr() as *const c_char, len) }
    }

    /// Encode a closure outcome as the function result
    pub(crate) fn report<T: ToSql>(
        &self,
        function: &str,
        fault: &FaultSlot,
        outcome: std::result::Result<T, FunctionError>,
    ) {
        let message = match outcome {
            Ok(value) => match value.to_sql().and_then(|v| self.set(v)) {
                Ok(()) => return,
                Err(err) => err.to_string(),
            },
            Err(err) => err.to_string(),
        };
        self.fail(function, fault, &message);
    }
}
