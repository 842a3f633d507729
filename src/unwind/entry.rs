//! Entry points for the scope-entry constructs
//!
//! Every construct pushes its frame, runs its thunk, and removes the frame
//! through a scope guard, so the frame's effect (binding restoration,
//! cleanup) is applied exactly once on every exit path:
//! - normal return: the guard applies it;
//! - fast-path transfer: the proceed walk applies it, the guard only removes
//!   the frame;
//! - slow-path transfer or genuine panic: the guard applies it during native
//!   unwinding.
//!
//! Unwind-protect is the exception: its cleanup never runs inside `Drop`.
//! The entry point catches the unwinding, runs the cleanup, and resumes, so
//! a cleanup is free to start a transfer of its own on either path.
//!
//! Transfer initiators (`escape`, `throw`, `go`) return the [`Unwind`] the
//! caller must propagate, typically as `return Err(escape(..))`. On the slow
//! path they do not return at all.

use super::errors::ControlError;
use super::fallback::{fall_back, run_destination, Resumed};
use super::proceed::{proceed, run_cleanup};
use super::search::{search_catch, search_destination};
use super::thread_state::{current_frame, protocol_violation, with_state, ChainHead};
use super::types::{
    BlockExit, FrameId, FrameKind, SearchStatus, Symbol, TagbodyExit, TransferResult,
    TransferSignal, Unwind, Value, Values,
};
use std::mem;
use std::panic::{self, AssertUnwindSafe};

/* ===================== Scope Guards ===================== */

/// Owns one frame for the duration of its lexical scope.
struct FrameGuard {
    id: FrameId,
}

impl FrameGuard {
    fn push(kind: FrameKind) -> Self {
        FrameGuard {
            id: with_state(|state| state.push(kind)),
        }
    }

    fn bind(symbol: Symbol, value: Value) -> Self {
        FrameGuard {
            id: with_state(|state| state.bind(symbol, value)),
        }
    }

    /// Remove the frame and run its cleanup if one is still registered.
    fn finish(self) -> TransferResult<()> {
        let id = self.id;
        mem::forget(self);
        match with_state(|state| state.exit(id)) {
            Some(cleanup) => run_cleanup(cleanup),
            None => Ok(()),
        }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if with_state(|state| state.exit(self.id)).is_some() {
            protocol_violation(format_args!(
                "unwind-protect frame {} dropped without running its cleanup",
                self.id
            ));
        }
    }
}

/// Several binding frames, released innermost first.
struct BindingGuards(Vec<FrameGuard>);

impl Drop for BindingGuards {
    fn drop(&mut self) {
        while let Some(guard) = self.0.pop() {
            drop(guard);
        }
    }
}

/* ===================== Block / Escape ===================== */

/// Establish a block and run `body` with its exit handle.
///
/// Returns `body`'s values, or the values carried by an `escape` to this
/// block.
pub fn call_with_escape(
    body: impl FnOnce(BlockExit) -> TransferResult<Values>,
) -> TransferResult<Values> {
    let frame = FrameGuard::push(FrameKind::Block);
    let exit = BlockExit(frame.id);
    match run_destination(frame.id, || body(exit))? {
        Resumed::Returned(values) => Ok(values),
        Resumed::Landed(_) => Ok(take_pending()),
    }
}

/// Run `thunk`, then transfer its values to the block `exit`.
pub fn escape(exit: BlockExit, thunk: impl FnOnce() -> TransferResult<Values>) -> Unwind {
    let values = match thunk() {
        Ok(values) => values,
        Err(unwind) => return unwind,
    };
    let destination = exit.id();
    let status = with_state(|state| search_destination(state, destination));
    transfer(
        status,
        destination,
        Some(values),
        TransferSignal::Escape { destination },
    )
}

/* ===================== Catch / Throw ===================== */

/// Establish a catch point for `tag` (compared with `Value::eq`) and run
/// `body`.
pub fn call_with_catch(
    tag: Value,
    body: impl FnOnce() -> TransferResult<Values>,
) -> TransferResult<Values> {
    let frame = FrameGuard::push(FrameKind::Catch { tag });
    match run_destination(frame.id, body)? {
        Resumed::Returned(values) => Ok(values),
        Resumed::Landed(_) => Ok(take_pending()),
    }
}

/// Run `thunk`, then transfer its values to the innermost catch for `tag`.
pub fn throw(tag: &Value, thunk: impl FnOnce() -> TransferResult<Values>) -> Unwind {
    let values = match thunk() {
        Ok(values) => values,
        Err(unwind) => return unwind,
    };
    let (status, found) = with_state(|state| search_catch(state, tag));
    let Some(destination) = found else {
        return ControlError::NoCatch { tag: tag.clone() }.into();
    };
    transfer(
        status,
        destination,
        Some(values),
        TransferSignal::Throw { destination },
    )
}

/* ===================== Tagbody / Go ===================== */

/// Code of one tagbody label
pub type Label<'a> = Box<dyn FnMut(TagbodyExit) -> TransferResult<()> + 'a>;

pub fn label<'a>(code: impl FnMut(TagbodyExit) -> TransferResult<()> + 'a) -> Label<'a> {
    Box::new(code)
}

/// Establish one tagbody frame for all of `labels` and run them in order.
///
/// Label code falls through to the next label; `go` resumes at the chosen
/// label with this tagbody as the chain head.
pub fn call_with_tagbody(labels: &mut [Label<'_>]) -> TransferResult<()> {
    let count = labels.len();
    let frame = FrameGuard::push(FrameKind::Tagbody { labels: count });
    let exit = TagbodyExit(frame.id);

    let mut pc = 0;
    while pc < count {
        let code = &mut labels[pc];
        match run_destination(frame.id, || code(exit))? {
            Resumed::Returned(()) => pc += 1,
            Resumed::Landed(index) => {
                if index >= count {
                    protocol_violation(format_args!(
                        "go landed at label {} of {} which has {} labels",
                        index, frame.id, count
                    ));
                }
                pc = index;
            }
        }
    }
    Ok(())
}

/// Transfer to label `index` of the tagbody `exit`.
pub fn go(exit: TagbodyExit, index: usize) -> Unwind {
    let destination = exit.id();
    let (status, labels) = with_state(|state| {
        let labels = state.record(destination).and_then(|record| match record.kind {
            FrameKind::Tagbody { labels } => Some(labels),
            _ => None,
        });
        (search_destination(state, destination), labels)
    });
    // A target out of extent reports that, whatever the index
    if !status.is_error() {
        if let Some(labels) = labels.filter(|&labels| index >= labels) {
            return ControlError::BadGoIndex {
                destination,
                index,
                labels,
            }
            .into();
        }
    }
    transfer(
        status,
        destination,
        None,
        TransferSignal::Go { destination, index },
    )
}

/* ===================== Unwind-Protect ===================== */

/// Run `thunk`; `cleanup` runs exactly once however the thunk's scope is
/// left. Cleanups of nested frames run innermost first.
///
/// The cleanup runs after the thunk's scope has been left, outside any
/// native unwinding. If it returns an `Unwind` of its own, that `Unwind`
/// replaces whatever the thunk produced, even a transfer in flight or a
/// genuine panic.
pub fn call_with_unwind_protect<T>(
    thunk: impl FnOnce() -> TransferResult<T>,
    cleanup: impl FnOnce() -> TransferResult<()> + 'static,
) -> TransferResult<T> {
    let frame = FrameGuard::push(FrameKind::UnwindProtect {
        cleanup: Some(Box::new(cleanup)),
    });
    let outcome = panic::catch_unwind(AssertUnwindSafe(thunk));
    frame.finish()?;
    match outcome {
        Ok(result) => result,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/* ===================== Dynamic Bindings ===================== */

/// Rebind `symbol` to `value` in this thread while `thunk` runs.
pub fn call_with_variable_bound<T>(symbol: Symbol, value: Value, thunk: impl FnOnce() -> T) -> T {
    let _frame = FrameGuard::bind(symbol, value);
    thunk()
}

/// Rebind several symbols at once, one binding frame each.
///
/// Symbols without a matching value are bound to `Nil`; extra values are
/// ignored.
pub fn call_with_variables_bound<T>(
    symbols: &[Symbol],
    values: &[Value],
    thunk: impl FnOnce() -> T,
) -> T {
    let mut guards = BindingGuards(Vec::with_capacity(symbols.len()));
    for (i, symbol) in symbols.iter().enumerate() {
        let value = values.get(i).cloned().unwrap_or(Value::Nil);
        guards.0.push(FrameGuard::bind(*symbol, value));
    }
    thunk()
}

/* ===================== Opaque Boundaries ===================== */

/// Call into code whose dynamic-environment behaviour is opaque.
///
/// An Unknown frame marks the boundary, so any transfer crossing it takes
/// the slow path.
pub fn call_with_foreign_boundary<T>(thunk: impl FnOnce() -> T) -> T {
    let _frame = FrameGuard::push(FrameKind::Unknown);
    thunk()
}

/// Invoke `callee` with the current chain head passed explicitly.
pub fn call_with_dynenv<T>(callee: impl FnOnce(ChainHead) -> T) -> T {
    callee(ChainHead(current_frame()))
}

/* ===================== Dispatch ===================== */

/// Act on a search result: in-place walk, native unwinding, or condition.
fn transfer(
    status: SearchStatus,
    destination: FrameId,
    values: Option<Values>,
    signal: TransferSignal,
) -> Unwind {
    match status {
        SearchStatus::Proceed | SearchStatus::FallBack => {
            let force_fallback = with_state(|state| {
                if let Some(values) = values {
                    state.save_values(values);
                }
                state.settings().force_fallback
            });
            if status == SearchStatus::Proceed && !force_fallback {
                proceed(signal.landing())
            } else {
                fall_back(signal)
            }
        }
        SearchStatus::OutOfExtent => ControlError::DynamicExtent { destination }.into(),
        SearchStatus::Abandoned => ControlError::AbandonedUnwind { destination }.into(),
        SearchStatus::Continue => protocol_violation(format_args!(
            "search toward {} produced no transfer decision",
            destination
        )),
    }
}

fn take_pending() -> Values {
    with_state(|state| state.take_values()).unwrap_or_default()
}
