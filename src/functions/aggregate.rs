//! Aggregate functions
//!
//! Each aggregation group gets its own state object, stored in the engine's
//! per-group aggregate context. Lifecycle per group:
//!
//! - first `step`: take the adapter's spare state or build one with the factory
//! - `step` once per row
//! - final callback: `finalize` once, then `release` once
//! - `reset` is then offered; `true` parks the state as the spare
//!
//! A failed `step` marks the group: `finalize` is skipped but `release` still
//! runs. The same holds when the factory panics (there is no state, so nothing
//! is released) and when another function of the statement has failed and the
//! engine is tearing the statement down: the group's state is released and
//! dropped without `finalize`. A group with no rows never sees `step` or
//! `finalize`; a state is built only so `release` can run, and the result is
//! NULL.

use std::cell::RefCell;
use std::ffi::c_int;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::Rc;

use libsqlite3_sys as ffi;

use super::context::{
    flatten, panic_message, Arguments, FaultSlot, FromArguments, FunctionError, FunctionResult,
    ResultContext,
};

/// Per-group state of a SQL aggregate function
pub trait Aggregate: 'static {
    /// Argument tuple of one `step` call; its arity is the function's arity
    type Args: FromArguments;

    /// Result of the group
    type Output: FunctionResult;

    /// Fold one row into the state
    fn step(&mut self, args: Self::Args) -> std::result::Result<(), FunctionError>;

    /// Produce the group's result; called once, after every `step`
    fn finalize(&mut self) -> Self::Output;

    /// Reinitialize the state for another group.
    ///
    /// Return `true` if the state was reset and may be reused; the default
    /// drops it and the next group gets a fresh one from the factory.
    fn reset(&mut self) -> bool {
        false
    }

    /// Release resources held by the state. Runs exactly once per group,
    /// on success and failure alike.
    fn release(&mut self) {}
}

/// Heap-allocated state behind one registered aggregate function
pub(crate) struct AggregateAdapter<A, F> {
    name: String,
    factory: F,
    spare: RefCell<Option<A>>,
    fault: Rc<FaultSlot>,
}

impl<A, F> AggregateAdapter<A, F>
where
    A: Aggregate,
    F: Fn() -> A + 'static,
{
    pub(crate) fn new(name: &str, factory: F, fault: Rc<FaultSlot>) -> Self {
        Self {
            name: name.to_string(),
            factory,
            spare: RefCell::new(None),
            fault,
        }
    }

    fn acquire(&self) -> A {
        let spare = self.spare.borrow_mut().take();
        spare.unwrap_or_else(|| (self.factory)())
    }

    fn recycle(&self, mut state: A) {
        if state.reset() {
            *self.spare.borrow_mut() = Some(state);
        }
    }
}

/// State stored in one group's aggregate context
struct Slot<A> {
    /// `None` when the factory panicked
    state: Option<A>,
    failed: bool,
}

enum Finish<T> {
    Empty,
    Discarded,
    Value(std::result::Result<T, FunctionError>),
}

/// Engine entry point for each row of a group
pub(crate) unsafe extern "C" fn step_aggregate<A, F>(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) where
    A: Aggregate,
    F: Fn() -> A + 'static,
{
    let ctx = ResultContext::new(ctx);
    let adapter = &*(ctx.user_data() as *const AggregateAdapter<A, F>);
    let slot_ptr = ffi::sqlite3_aggregate_context(ctx.raw(), mem::size_of::<*mut Slot<A>>() as c_int)
        as *mut *mut Slot<A>;
    if slot_ptr.is_null() {
        ffi::sqlite3_result_error_nomem(ctx.raw());
        return;
    }
    let args = Arguments::from_raw(argc, argv);

    if (*slot_ptr).is_null() {
        let acquired = panic::catch_unwind(AssertUnwindSafe(|| adapter.acquire()));
        let (state, failure) = match acquired {
            Ok(state) => (Some(state), None),
            Err(payload) => (None, Some(panic_message(&*payload))),
        };
        *slot_ptr = Box::into_raw(Box::new(Slot {
            state,
            failed: failure.is_some(),
        }));
        if let Some(message) = failure {
            ctx.fail(&adapter.name, &adapter.fault, &message);
            return;
        }
    }

    let slot = &mut **slot_ptr;
    let state = match slot.state.as_mut() {
        Some(state) if !slot.failed => state,
        _ => return,
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        <A::Args as FromArguments>::from_arguments(&args)
            .map_err(FunctionError::from)
            .and_then(|args| state.step(args))
    }));

    if let Err(err) = flatten(outcome) {
        slot.failed = true;
        ctx.fail(&adapter.name, &adapter.fault, &err.to_string());
    }
}

/// Engine entry point at the end of a group, and when a partially
/// aggregated statement is torn down
pub(crate) unsafe extern "C" fn final_aggregate<A, F>(ctx: *mut ffi::sqlite3_context)
where
    A: Aggregate,
    F: Fn() -> A + 'static,
{
    let ctx = ResultContext::new(ctx);
    let adapter = &*(ctx.user_data() as *const AggregateAdapter<A, F>);
    let slot_ptr = ffi::sqlite3_aggregate_context(ctx.raw(), 0) as *mut *mut Slot<A>;
    let slot = if slot_ptr.is_null() || (*slot_ptr).is_null() {
        None
    } else {
        let slot = Box::from_raw(*slot_ptr);
        *slot_ptr = ptr::null_mut();
        Some(slot)
    };

    // A pending fault means the statement is being torn down after an error.
    let discarding = adapter.fault.is_pending();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match slot {
        None if discarding => Finish::Discarded,
        None => {
            let mut state = adapter.acquire();
            state.release();
            adapter.recycle(state);
            Finish::Empty
        }
        Some(slot) => {
            let Slot { state, failed } = *slot;
            let Some(mut state) = state else {
                return Finish::Discarded;
            };
            if failed || discarding {
                state.release();
                return Finish::Discarded;
            }
            let output = panic::catch_unwind(AssertUnwindSafe(|| state.finalize()));
            state.release();
            match output {
                Ok(output) => {
                    adapter.recycle(state);
                    Finish::Value(output.into_result())
                }
                Err(payload) => Finish::Value(Err(panic_message(&*payload).into())),
            }
        }
    }));

    match outcome {
        Ok(Finish::Empty) => ctx.set_null(),
        Ok(Finish::Discarded) => {}
        Ok(Finish::Value(result)) => ctx.report(&adapter.name, &adapter.fault, result),
        Err(payload) => ctx.fail(&adapter.name, &adapter.fault, &panic_message(&*payload)),
    }
}
