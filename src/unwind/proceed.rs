//! Fast path: in-place transfer
//!
//! Used when the search concludes the destination is reachable without
//! native unwinding. The saved destination/index are recorded first, then
//! the chain is walked from the head to the destination:
//! - Binding frames are restored in place and the walk continues;
//! - an unwind-protect frame stops the walk, its cleanup runs, and the walk
//!   resumes from the saved destination/index.
//!
//! Each cleanup is one trampoline step of the same logical transfer. When the
//! walk arrives, the chain head is the destination and the returned
//! `Unwind::Transfer` only has to be propagated to the destination's entry
//! point, where it is claimed. A cleanup that leaves by a transfer of its own
//! ends the walk, and its `Unwind` is returned in place of the original.

use super::thread_state::{protocol_violation, with_state, ProceedStep};
use super::types::{Cleanup, Landing, TransferResult, Unwind};

/// Restores the saved destination of an enclosing walk when this one ends.
struct SavedWalk(Option<Landing>);

impl Drop for SavedWalk {
    fn drop(&mut self) {
        let enclosing = self.0.take();
        with_state(|state| state.replace_saved(enclosing));
    }
}

pub(crate) fn proceed(landing: Landing) -> Unwind {
    let enclosing = with_state(|state| {
        state.count_fast_transfer();
        state.replace_saved(Some(landing))
    });
    let _walk = SavedWalk(enclosing);

    loop {
        let step = with_state(|state| {
            let Some(saved) = state.saved() else {
                protocol_violation(format_args!("proceed lost its saved destination"));
            };
            state.proceed_step(saved.destination)
        });
        match step {
            ProceedStep::Arrived => break,
            ProceedStep::Cleanup(cleanup) => {
                if let Err(superseding) = run_cleanup(cleanup) {
                    return superseding;
                }
            }
        }
    }

    let landing = with_state(|state| state.saved()).unwrap_or(landing);
    Unwind::Transfer(landing)
}

/// Run an unwind-protect cleanup with the in-flight transfer parked.
///
/// The pending values and saved destination are set aside while the cleanup
/// runs, since it may perform transfers of its own, and put back once it
/// returns normally. If the cleanup returns an `Unwind` instead, the parked
/// transfer is dropped and that `Unwind` is handed back to the caller.
pub(crate) fn run_cleanup(cleanup: Cleanup) -> TransferResult<()> {
    let (values, saved) = with_state(|state| (state.take_values(), state.saved()));
    tracing::trace!(destination = ?saved.map(|s| s.destination), "running unwind-protect cleanup");
    match cleanup() {
        Ok(()) => {
            with_state(|state| {
                state.restore_values(values);
                state.replace_saved(saved);
            });
            Ok(())
        }
        Err(unwind) => {
            tracing::debug!(
                superseded = ?saved.map(|s| s.destination),
                "cleanup left by its own unwind"
            );
            Err(unwind)
        }
    }
}
