//! Slow path: transfer by native unwinding
//!
//! When some frame on the path cannot be passed by direct jump, the transfer
//! is raised as a [`TransferSignal`] panic payload. Every scope guard on the
//! way runs as the stack unwinds and restores its binding. Unwind-protect
//! entry points catch the payload, run their cleanup, and resume it. The
//! handler at each destination's entry point checks the signal's identity
//! and either claims it or re-raises it.
//!
//! `resume_unwind` does not invoke the panic hook, so a transfer prints
//! nothing.

use super::thread_state::{protocol_violation, with_state};
use super::types::{FrameId, TransferResult, TransferSignal, Unwind};
use std::panic::{self, AssertUnwindSafe};

/// How a destination's body ended
pub(crate) enum Resumed<T> {
    /// The body returned normally
    Returned(T),
    /// A transfer addressed to this destination arrived, with its index
    Landed(usize),
}

/// Raise `signal` through native unwinding.
pub(crate) fn fall_back(signal: TransferSignal) -> ! {
    if std::thread::panicking() {
        protocol_violation(format_args!(
            "fallback transfer to {} raised while the thread is already unwinding",
            signal.destination()
        ));
    }
    with_state(|state| state.start_fallback());
    tracing::debug!(
        destination = %signal.destination(),
        index = signal.index(),
        "raising fallback transfer"
    );
    panic::resume_unwind(Box::new(signal))
}

/// Run a destination's body and claim the transfers addressed to it, by
/// either path. Transfers for other destinations, conditions and genuine
/// panics pass through unchanged.
pub(crate) fn run_destination<T>(
    destination: FrameId,
    body: impl FnOnce() -> TransferResult<T>,
) -> TransferResult<Resumed<T>> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Ok(Resumed::Returned(value)),

        Ok(Err(Unwind::Transfer(landing))) => {
            if landing.destination == destination {
                with_state(|state| state.land(destination));
                Ok(Resumed::Landed(landing.index))
            } else {
                check_not_passed(destination, landing.destination);
                Err(Unwind::Transfer(landing))
            }
        }

        Ok(Err(condition)) => Err(condition),

        Err(payload) => match payload.downcast::<TransferSignal>() {
            Ok(signal) if signal.destination() == destination => {
                let elapsed = with_state(|state| {
                    state.land(destination);
                    state.finish_fallback()
                });
                tracing::debug!(
                    destination = %destination,
                    index = signal.index(),
                    elapsed_us = elapsed.as_micros() as u64,
                    "fallback transfer landed"
                );
                Ok(Resumed::Landed(signal.index()))
            }
            Ok(signal) => {
                check_not_passed(destination, signal.destination());
                panic::resume_unwind(signal)
            }
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// A transfer reaching `handler` must target a frame further out. A target
/// inside the handler was skipped on the way here.
fn check_not_passed(handler: FrameId, target: FrameId) {
    if target.is_inside(handler) {
        protocol_violation(format_args!(
            "transfer to {} reached {} after passing its destination",
            target, handler
        ));
    }
}
