//! Search protocol
//!
//! A pure classification pass that runs before any transfer. It walks the
//! chain outward from the head and folds each frame's own status into an
//! aggregate:
//! - the aggregate starts as `Proceed`;
//! - `Continue` frames leave it untouched;
//! - any other status is merged in, the stronger obstruction winning;
//! - `OutOfExtent` ends the walk at once, since the destination can no
//!   longer be located.
//!
//! Reaching the root sentinel before the destination (or, for a throw,
//! before a matching catch frame) is `OutOfExtent`.

use super::thread_state::{with_state, ThreadState};
use super::types::{FrameId, FrameKind, SearchStatus, Value};

/* ===================== Public API ===================== */

/// Classify a transfer from the current head to `destination`.
pub fn search_to(destination: FrameId) -> SearchStatus {
    with_state(|state| search_destination(state, destination))
}

/// Find the innermost catch frame whose tag is `eq` to `tag` and classify
/// the transfer to it. The frame is `None` when no catch matched.
pub fn search_throw(tag: &Value) -> (SearchStatus, Option<FrameId>) {
    with_state(|state| search_catch(state, tag))
}

/// Classify a single frame without walking the chain.
pub fn search_frame(id: FrameId) -> SearchStatus {
    with_state(|state| match state.record(id) {
        Some(record) => record.search(state.settings().strict_abandon),
        None => SearchStatus::OutOfExtent,
    })
}

/* ===================== Traversals ===================== */

pub(crate) fn search_destination(state: &ThreadState, destination: FrameId) -> SearchStatus {
    let strict = state.settings().strict_abandon;

    // A destination that was already passed is still on the frame stack
    // until its scope returns, but no longer reachable from the head.
    match state.record(destination) {
        None => return SearchStatus::OutOfExtent,
        Some(record) => {
            let status = record.search(strict);
            if status.is_error() {
                return status;
            }
        }
    }

    let mut aggregate = SearchStatus::Proceed;
    let mut cursor = state.head();
    while let Some(id) = cursor {
        if id == destination {
            return aggregate;
        }
        let Some(record) = state.record(id) else {
            return SearchStatus::OutOfExtent;
        };
        match record.search(strict) {
            SearchStatus::Continue => {}
            SearchStatus::OutOfExtent => return SearchStatus::OutOfExtent,
            status => aggregate = aggregate.merge(status),
        }
        cursor = record.outer;
    }
    SearchStatus::OutOfExtent
}

pub(crate) fn search_catch(state: &ThreadState, tag: &Value) -> (SearchStatus, Option<FrameId>) {
    let strict = state.settings().strict_abandon;
    let mut aggregate = SearchStatus::Proceed;
    let mut cursor = state.head();
    while let Some(id) = cursor {
        let Some(record) = state.record(id) else {
            return (SearchStatus::OutOfExtent, None);
        };
        if let FrameKind::Catch { tag: catch_tag } = &record.kind {
            if catch_tag.eq(tag) {
                return (aggregate, Some(id));
            }
        }
        match record.search(strict) {
            SearchStatus::Continue => {}
            SearchStatus::OutOfExtent => return (SearchStatus::OutOfExtent, None),
            status => aggregate = aggregate.merge(status),
        }
        cursor = record.outer;
    }
    (SearchStatus::OutOfExtent, None)
}
