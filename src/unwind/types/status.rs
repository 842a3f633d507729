//! Search outcomes

use serde::Serialize;
use std::fmt;

/// Classification of a frame, or of a whole path, by the search protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchStatus {
    /// The frame imposes no obstacle
    Continue,
    /// The destination is reachable by an in-place walk; this frame needs
    /// action during that walk
    Proceed,
    /// The destination (or a frame on the way) is no longer on the stack
    OutOfExtent,
    /// The destination was explicitly invalidated (strict mode only)
    Abandoned,
    /// The frame cannot be passed by direct jump; native unwinding is needed
    FallBack,
}

impl SearchStatus {
    fn rank(self) -> u8 {
        match self {
            SearchStatus::Continue => 0,
            SearchStatus::Proceed => 1,
            SearchStatus::FallBack => 2,
            SearchStatus::Abandoned => 3,
            SearchStatus::OutOfExtent => 4,
        }
    }

    /// Fold a frame's status into a path aggregate: the stronger obstruction
    /// wins, so a later `Proceed` never hides an earlier `FallBack`.
    pub fn merge(self, frame: SearchStatus) -> SearchStatus {
        if frame.rank() > self.rank() {
            frame
        } else {
            self
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, SearchStatus::OutOfExtent | SearchStatus::Abandoned)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchStatus::Continue => "continue",
            SearchStatus::Proceed => "proceed",
            SearchStatus::OutOfExtent => "out-of-extent",
            SearchStatus::Abandoned => "abandoned",
            SearchStatus::FallBack => "fall-back",
        };
        f.write_str(name)
    }
}
