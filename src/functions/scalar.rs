//! Scalar functions
//!
//! Any `Fn(A0, ..., An) -> R` whose parameters implement `FromSql` and whose
//! return type implements `FunctionResult` can be registered. The parameter
//! count becomes the arity the engine enforces when SQL calling the function
//! is prepared.

use std::ffi::c_int;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use libsqlite3_sys as ffi;

use super::context::{
    flatten, Arguments, FaultSlot, FromArguments, FunctionError, FunctionResult, ResultContext,
};
use crate::types::{FromSql, ToSql};

/// Native closures callable as SQL scalar functions.
///
/// `Args` is the tuple of parameter types; it only exists to tell the
/// implementations for different arities apart.
pub trait ScalarFunction<Args>: 'static {
    /// Number of SQL arguments the function takes
    const ARITY: usize;

    type Output: ToSql;

    fn call(&self, args: &Arguments<'_>) -> std::result::Result<Self::Output, FunctionError>;
}

impl<F, R> ScalarFunction<()> for F
where
    F: Fn() -> R + 'static,
    R: FunctionResult,
{
    const ARITY: usize = 0;

    type Output = R::Output;

    fn call(&self, _args: &Arguments<'_>) -> std::result::Result<Self::Output, FunctionError> {
        (self)().into_result()
    }
}

macro_rules! impl_scalar_function {
    ($($name:ident $idx:tt),+) => {
        impl<Func, R, $($name),+> ScalarFunction<($($name,)+)> for Func
        where
            Func: Fn($($name),+) -> R + 'static,
            R: FunctionResult,
            $($name: FromSql,)+
        {
            const ARITY: usize = <($($name,)+) as FromArguments>::ARITY;

            type Output = R::Output;

            fn call(
                &self,
                args: &Arguments<'_>,
            ) -> std::result::Result<Self::Output, FunctionError> {
                let decoded = <($($name,)+) as FromArguments>::from_arguments(args)?;
                (self)($(decoded.$idx),+).into_result()
            }
        }
    };
}

impl_scalar_function!(A 0);
impl_scalar_function!(A 0, B 1);
impl_scalar_function!(A 0, B 1, C 2);
impl_scalar_function!(A 0, B 1, C 2, D 3);
impl_scalar_function!(A 0, B 1, C 2, D 3, E 4);
impl_scalar_function!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_scalar_function!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_scalar_function!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Heap-allocated state behind one registered scalar function
pub(crate) struct ScalarAdapter<F, Args> {
    name: String,
    func: F,
    fault: Rc<FaultSlot>,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args> ScalarAdapter<F, Args>
where
    F: ScalarFunction<Args>,
{
    pub(crate) fn new(name: &str, func: F, fault: Rc<FaultSlot>) -> Self {
        Self {
            name: name.to_string(),
            func,
            fault,
            _args: PhantomData,
        }
    }
}

/// Engine entry point for every scalar function call
pub(crate) unsafe extern "C" fn call_scalar<F, Args>(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) where
    F: ScalarFunction<Args>,
{
    let ctx = ResultContext::new(ctx);
    let adapter = &*(ctx.user_data() as *const ScalarAdapter<F, Args>);
    let args = Arguments::from_raw(argc, argv);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| adapter.func.call(&args)));
    ctx.report(&adapter.name, &adapter.fault, flatten(outcome));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arity_of<F: ScalarFunction<Args>, Args>(_f: &F) -> usize {
        F::ARITY
    }

    #[test]
    fn test_declared_arity() {
        assert_eq!(arity_of(&|| 1i64), 0);
        assert_eq!(arity_of(&|x: i64| x), 1);
        assert_eq!(arity_of(&|a: String, b: Option<i64>, c: f64| format!("{a}{b:?}{c}")), 3);
        assert_eq!(
            arity_of(&|x: i64| -> Result<i64, String> { Ok(x) }),
            1
        );
    }
}
