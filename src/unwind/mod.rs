//! Non-local control transfer for the managed runtime
//!
//! Each thread keeps a chain of dynamic-environment frames recording the
//! constructs currently in force: dynamic bindings, catch points, blocks,
//! tagbodies, unwind-protect cleanups, and opaque frames of unknown shape.
//! A transfer (`escape`, `throw`, `go`) runs in three stages:
//!
//! 1. **Search**: classify the path from the chain head to the destination
//!    without touching anything ([`search_to`], [`search_throw`]).
//! 2. **Proceed** (fast path): walk the chain in place, restoring bindings and
//!    running cleanups innermost first, then return `Err(Unwind::Transfer)`
//!    for ordinary `?` propagation to the destination.
//! 3. **Fall back** (slow path): when some frame cannot be passed in place,
//!    raise the transfer through native unwinding; scope guards apply every
//!    frame's effect on the way out.
//!
//! Both paths apply the same effects in the same order. Transfer values
//! travel in a single per-thread slot between the initiator and the landing.
//!
//! # Example
//!
//! ```rust
//! use unwind_core::unwind::{call_with_escape, escape, Value, Values};
//!
//! let result = call_with_escape(|exit| {
//!     Err(escape(exit, || Ok(Values::one(Value::Int(42)))))
//! })?;
//! assert_eq!(result, Values::one(Value::Int(42)));
//! # Ok::<(), unwind_core::unwind::Unwind>(())
//! ```

mod entry;
mod errors;
mod fallback;
mod proceed;
mod search;
mod thread_state;
pub mod types;

#[cfg(test)]
mod tests;

pub use entry::{
    call_with_catch, call_with_dynenv, call_with_escape, call_with_foreign_boundary,
    call_with_tagbody, call_with_unwind_protect, call_with_variable_bound,
    call_with_variables_bound, escape, go, label, throw, Label,
};
pub use errors::ControlError;
pub use search::{search_frame, search_throw, search_to};
pub use thread_state::{
    chain_depth, current_frame, enclosing_frame, frame_info, is_bound_in_thread, reset_stats,
    set_symbol_value, set_thread_settings, stats, symbol_value, thread_settings, ChainHead,
    UnwindStats,
};
pub use types::{
    BlockExit, Cleanup, FrameId, FrameInfo, FrameType, Landing, SearchStatus, Symbol, TagbodyExit,
    TransferResult, TransferSignal, Unwind, Value, Values,
};
