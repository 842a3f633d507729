//! Dynamic-environment frames
//!
//! Frames form a per-thread chain ordered like the call stack. Each frame is
//! addressed by a [`FrameId`] handle (slot index plus a serial number) and
//! refers to the next-enclosing frame through `outer`; `None` is the root
//! sentinel. A frame never owns another frame.

use super::control::TransferResult;
use super::status::SearchStatus;
use super::symbol::Symbol;
use super::values::Value;
use serde::Serialize;
use std::fmt;

/* ===================== Handles ===================== */

/// Handle to a frame record
///
/// `index` is the record's slot in the thread's frame stack; `serial` is
/// unique across the process, so a handle to an exited frame never matches a
/// record later pushed into the same slot, on this thread or any other.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct FrameId {
    pub(crate) index: u32,
    pub(crate) serial: u64,
}

impl FrameId {
    /// Slot depth: deeper frames have larger indices
    pub fn depth(&self) -> usize {
        self.index as usize
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// True when `self` was entered after (inside) `other`
    pub fn is_inside(&self, other: FrameId) -> bool {
        self.index > other.index
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}@{}", self.serial, self.index)
    }
}

/// Destination handle of a Block frame, used by `escape`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockExit(pub(crate) FrameId);

impl BlockExit {
    pub fn id(&self) -> FrameId {
        self.0
    }
}

/// Destination handle of a Tagbody frame, used by `go`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TagbodyExit(pub(crate) FrameId);

impl TagbodyExit {
    pub fn id(&self) -> FrameId {
        self.0
    }
}

/* ===================== Frame Records ===================== */

/// Cleanup action registered by an unwind-protect frame
///
/// A cleanup that starts a transfer of its own returns that transfer's
/// `Unwind`, which replaces the transfer in flight.
pub type Cleanup = Box<dyn FnOnce() -> TransferResult<()>>;

/// Frame variant and payload
pub(crate) enum FrameKind {
    Binding { symbol: Symbol, prior: Option<Value> },
    Catch { tag: Value },
    Block,
    Tagbody { labels: usize },
    /// `cleanup` is taken exactly once, by whichever exit path runs it
    UnwindProtect { cleanup: Option<Cleanup> },
    Unknown,
}

impl FrameKind {
    pub fn frame_type(&self) -> FrameType {
        match self {
            FrameKind::Binding { .. } => FrameType::Binding,
            FrameKind::Catch { .. } => FrameType::Catch,
            FrameKind::Block => FrameType::Block,
            FrameKind::Tagbody { .. } => FrameType::Tagbody,
            FrameKind::UnwindProtect { .. } => FrameType::UnwindProtect,
            FrameKind::Unknown => FrameType::Unknown,
        }
    }
}

impl fmt::Debug for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Binding { symbol, prior } => f
                .debug_struct("Binding")
                .field("symbol", symbol)
                .field("prior", prior)
                .finish(),
            FrameKind::Catch { tag } => f.debug_struct("Catch").field("tag", tag).finish(),
            FrameKind::Block => f.write_str("Block"),
            FrameKind::Tagbody { labels } => {
                f.debug_struct("Tagbody").field("labels", labels).finish()
            }
            FrameKind::UnwindProtect { cleanup } => f
                .debug_struct("UnwindProtect")
                .field("pending_cleanup", &cleanup.is_some())
                .finish(),
            FrameKind::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Lifecycle state of a record that is still physically on the frame stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameState {
    Active,
    /// Passed by an in-place proceed walk: effects applied, destination
    /// invalid, awaiting removal when its owning scope returns.
    Abandoned,
}

#[derive(Debug)]
pub(crate) struct FrameRecord {
    pub serial: u64,
    pub outer: Option<FrameId>,
    pub kind: FrameKind,
    pub state: FrameState,
}

impl FrameRecord {
    /// Per-frame classification
    pub fn search(&self, strict_abandon: bool) -> SearchStatus {
        if self.state == FrameState::Abandoned {
            return if strict_abandon {
                SearchStatus::Abandoned
            } else {
                SearchStatus::OutOfExtent
            };
        }
        match self.kind {
            FrameKind::Binding { .. } | FrameKind::UnwindProtect { .. } => SearchStatus::Proceed,
            FrameKind::Catch { .. } | FrameKind::Block | FrameKind::Tagbody { .. } => {
                SearchStatus::Continue
            }
            FrameKind::Unknown => SearchStatus::FallBack,
        }
    }
}

/* ===================== Introspection ===================== */

/// Frame variant without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameType {
    Binding,
    Catch,
    Block,
    Tagbody,
    UnwindProtect,
    Unknown,
}

impl FrameType {
    /// Whether frames of this type own a saved continuation point
    pub fn is_destination(&self) -> bool {
        matches!(self, FrameType::Catch | FrameType::Block | FrameType::Tagbody)
    }
}

/// Snapshot of one frame for diagnostic tooling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameInfo {
    pub id: FrameId,
    pub frame_type: FrameType,
    pub outer: Option<FrameId>,
    pub active: bool,
}
