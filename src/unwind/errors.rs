//! Conditions raised by the control-transfer core
//!
//! These are programming errors in the code attempting a transfer. They are
//! handed to the language-level condition system and never retried here.
//! Protocol corruption is not represented: it aborts the process instead
//! (see `thread_state::protocol_violation`).

use super::types::{FrameId, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// The target scope is no longer active
    #[error("attempt to exit to {destination}, which is outside its dynamic extent")]
    DynamicExtent { destination: FrameId },

    /// The target was invalidated by an earlier unwind (strict mode)
    #[error("attempt to unwind to {destination}, which was abandoned by an earlier exit")]
    AbandonedUnwind { destination: FrameId },

    /// A throw found no catch frame for its tag
    #[error("attempt to throw to tag {tag}, but no catch for it is active")]
    NoCatch { tag: Value },

    #[error("go to label {index} of {destination}, which has only {labels} labels")]
    BadGoIndex {
        destination: FrameId,
        index: usize,
        labels: usize,
    },
}
