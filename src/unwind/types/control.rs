//! Control transfer payloads
//!
//! A transfer travels one of two ways:
//! - fast path: the frames are walked in place, then an `Unwind::Transfer`
//!   rides the ordinary `Result` channel up to the destination's entry point;
//! - slow path: a [`TransferSignal`] is raised as a native unwind payload and
//!   every scope guard on the way runs as the stack unwinds.

use super::frame::FrameId;
use crate::unwind::errors::ControlError;
use thiserror::Error;

/// Where a transfer lands: the destination frame and, for tagbodies, the
/// label index. Block and catch destinations ignore the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landing {
    pub destination: FrameId,
    pub index: usize,
}

/// Error half of [`TransferResult`]
#[derive(Debug, Error)]
pub enum Unwind {
    /// A fast-path transfer whose frames have already been unwound in place;
    /// it must be propagated untouched until its destination claims it.
    #[error("non-local exit to {} in progress", .0.destination)]
    Transfer(Landing),

    /// A condition for the language-level error system
    #[error(transparent)]
    Condition(#[from] ControlError),
}

impl Unwind {
    pub fn condition(&self) -> Option<&ControlError> {
        match self {
            Unwind::Condition(err) => Some(err),
            Unwind::Transfer(_) => None,
        }
    }
}

pub type TransferResult<T> = Result<T, Unwind>;

/// Slow-path signal, one variant per construct
///
/// Identity-addressed: a handler claims it only when `destination` is its
/// own frame and re-raises it otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSignal {
    Escape { destination: FrameId },
    Throw { destination: FrameId },
    Go { destination: FrameId, index: usize },
}

impl TransferSignal {
    pub fn destination(&self) -> FrameId {
        match *self {
            TransferSignal::Escape { destination }
            | TransferSignal::Throw { destination }
            | TransferSignal::Go { destination, .. } => destination,
        }
    }

    pub fn index(&self) -> usize {
        match *self {
            TransferSignal::Go { index, .. } => index,
            TransferSignal::Escape { .. } | TransferSignal::Throw { .. } => 0,
        }
    }

    pub fn landing(&self) -> Landing {
        Landing {
            destination: self.destination(),
            index: self.index(),
        }
    }
}
