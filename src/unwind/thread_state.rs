//! Per-thread unwind state
//!
//! Each native thread owns:
//! - the frame stack and the chain head (`None` is the root sentinel)
//! - the saved destination/index of an in-progress proceed walk
//! - the single-slot pending multiple-values buffer
//! - the thread's dynamic bindings of symbols
//! - instrumentation counters
//!
//! Nothing here is shared between threads, so nothing is locked. The state
//! is created on first use in a thread and dropped with it.

use super::types::{
    Cleanup, FrameId, FrameInfo, FrameKind, FrameRecord, FrameState, Landing, Symbol, Value,
    Values,
};
use crate::config::{self, Settings};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

thread_local! {
    static STATE: RefCell<ThreadState> = RefCell::new(ThreadState::new());
}

/// Frame serials are unique across the process, so a handle carried to
/// another thread never matches a record there.
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Run `f` against this thread's state.
///
/// `f` must not call back into user code: cleanups and thunks are always
/// taken out of the state and invoked after the borrow ends.
pub(crate) fn with_state<R>(f: impl FnOnce(&mut ThreadState) -> R) -> R {
    STATE.with(|cell| f(&mut cell.borrow_mut()))
}

/// Abort on corrupted bookkeeping. These are not user-level conditions.
#[cold]
pub(crate) fn protocol_violation(message: fmt::Arguments<'_>) -> ! {
    tracing::error!("dynamic environment protocol violation: {}", message);
    std::process::abort()
}

/* ===================== Instrumentation ===================== */

/// Per-thread transfer counters; no semantic effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnwindStats {
    pub transfers: u64,
    pub fast_transfers: u64,
    pub fallback_transfers: u64,
    pub fallback_time: Duration,
}

/* ===================== State ===================== */

pub(crate) struct ThreadState {
    frames: Vec<FrameRecord>,
    head: Option<FrameId>,
    saved: Option<Landing>,
    pending: Option<Values>,
    bindings: HashMap<Symbol, Value>,
    stats: UnwindStats,
    fallback_started: Option<Instant>,
    settings: Settings,
}

/// One step of a proceed walk
pub(crate) enum ProceedStep {
    /// The chain head is the destination
    Arrived,
    /// An unwind-protect frame was passed; its cleanup must run before the
    /// walk resumes
    Cleanup(Cleanup),
}

impl ThreadState {
    fn new() -> Self {
        ThreadState {
            frames: Vec::new(),
            head: None,
            saved: None,
            pending: None,
            bindings: HashMap::new(),
            stats: UnwindStats::default(),
            fallback_started: None,
            settings: config::current_settings(),
        }
    }

    pub fn head(&self) -> Option<FrameId> {
        self.head
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn record(&self, id: FrameId) -> Option<&FrameRecord> {
        self.frames
            .get(id.index as usize)
            .filter(|record| record.serial == id.serial)
    }

    /* ---------- Frames ---------- */

    /// Push a frame whose outer link is the current head and make it the head.
    pub fn push(&mut self, kind: FrameKind) -> FrameId {
        let id = FrameId {
            index: self.frames.len() as u32,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
        };
        self.frames.push(FrameRecord {
            serial: id.serial,
            outer: self.head,
            kind,
            state: FrameState::Active,
        });
        self.head = Some(id);
        id
    }

    /// Rebind `symbol` in this thread and push the Binding frame recording the
    /// prior thread-local value.
    pub fn bind(&mut self, symbol: Symbol, value: Value) -> FrameId {
        let prior = self.bindings.insert(symbol, value);
        self.push(FrameKind::Binding { symbol, prior })
    }

    /// Remove a frame whose owning scope is returning.
    ///
    /// An active frame has its effect applied here (normal exit, or native
    /// unwinding on the slow path). A frame already passed by a proceed walk
    /// is only removed. Returns the cleanup to run, if any.
    pub fn exit(&mut self, id: FrameId) -> Option<Cleanup> {
        let index = id.index as usize;
        let Some(record) = self
            .frames
            .get_mut(index)
            .filter(|record| record.serial == id.serial)
        else {
            protocol_violation(format_args!("exit of {} which is not on the frame stack", id));
        };

        let mut cleanup = None;
        if record.state == FrameState::Active {
            if self.head != Some(id) {
                protocol_violation(format_args!(
                    "exit of {} while the chain head is {:?}",
                    id, self.head
                ));
            }
            match &mut record.kind {
                FrameKind::Binding { symbol, prior } => {
                    restore_binding(&mut self.bindings, *symbol, prior.take());
                }
                FrameKind::UnwindProtect { cleanup: registered } => {
                    cleanup = registered.take();
                }
                _ => {}
            }
            self.head = record.outer;
        }
        self.frames.truncate(index);
        cleanup
    }

    /// Advance a proceed walk toward `destination`.
    ///
    /// Frames are passed in order from the head outward; each is marked
    /// abandoned and unlinked before its effect is applied.
    pub fn proceed_step(&mut self, destination: FrameId) -> ProceedStep {
        loop {
            let Some(id) = self.head else {
                protocol_violation(format_args!(
                    "proceed toward {} reached the root of the chain",
                    destination
                ));
            };
            if id == destination {
                return ProceedStep::Arrived;
            }
            let Some(record) = self
                .frames
                .get_mut(id.index as usize)
                .filter(|record| record.serial == id.serial)
            else {
                protocol_violation(format_args!("chain head {} is not on the frame stack", id));
            };
            if matches!(record.kind, FrameKind::Unknown) {
                protocol_violation(format_args!(
                    "proceed toward {} crossed opaque frame {}",
                    destination, id
                ));
            }

            record.state = FrameState::Abandoned;
            self.head = record.outer;
            tracing::trace!(frame = %id, kind = ?record.kind.frame_type(), "proceed passes frame");

            match &mut record.kind {
                FrameKind::Binding { symbol, prior } => {
                    restore_binding(&mut self.bindings, *symbol, prior.take());
                }
                FrameKind::UnwindProtect { cleanup } => {
                    if let Some(cleanup) = cleanup.take() {
                        return ProceedStep::Cleanup(cleanup);
                    }
                }
                _ => {}
            }
        }
    }

    /// Check that a destination about to resume is the chain head.
    pub fn land(&mut self, destination: FrameId) {
        if self.head != Some(destination) {
            protocol_violation(format_args!(
                "transfer landed at {} but the chain head is {:?}",
                destination, self.head
            ));
        }
    }

    /* ---------- Saved destination ---------- */

    pub fn saved(&self) -> Option<Landing> {
        self.saved
    }

    pub fn replace_saved(&mut self, landing: Option<Landing>) -> Option<Landing> {
        std::mem::replace(&mut self.saved, landing)
    }

    /* ---------- Pending values ---------- */

    /// Write the in-flight result set. One payload per transfer.
    pub fn save_values(&mut self, values: Values) {
        if self.pending.is_some() {
            tracing::warn!("pending values overwritten before their transfer consumed them");
        }
        self.pending = Some(values);
    }

    pub fn take_values(&mut self) -> Option<Values> {
        self.pending.take()
    }

    pub fn restore_values(&mut self, values: Option<Values>) {
        self.pending = values;
    }

    /* ---------- Instrumentation ---------- */

    pub fn count_fast_transfer(&mut self) {
        self.stats.transfers += 1;
        self.stats.fast_transfers += 1;
    }

    pub fn start_fallback(&mut self) {
        self.stats.transfers += 1;
        self.stats.fallback_transfers += 1;
        self.fallback_started = Some(Instant::now());
    }

    /// Accumulate the time since the last fallback was raised.
    pub fn finish_fallback(&mut self) -> Duration {
        let elapsed = self
            .fallback_started
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.stats.fallback_time += elapsed;
        elapsed
    }
}

fn restore_binding(bindings: &mut HashMap<Symbol, Value>, symbol: Symbol, prior: Option<Value>) {
    match prior {
        Some(value) => {
            bindings.insert(symbol, value);
        }
        None => {
            bindings.remove(&symbol);
        }
    }
}

/* ===================== Public Queries ===================== */

/// The chain head: the innermost active frame, `None` at the root
pub fn current_frame() -> Option<FrameId> {
    with_state(|state| state.head())
}

/// The Nth enclosing frame (0 = current head), `None` when the chain is
/// shorter than `n + 1` frames.
pub fn enclosing_frame(n: usize) -> Option<FrameId> {
    with_state(|state| {
        let mut cursor = state.head;
        for _ in 0..n {
            cursor = cursor.and_then(|id| state.record(id)).and_then(|r| r.outer);
        }
        cursor
    })
}

/// Snapshot of a frame still on this thread's frame stack
pub fn frame_info(id: FrameId) -> Option<FrameInfo> {
    with_state(|state| {
        state.record(id).map(|record| FrameInfo {
            id,
            frame_type: record.kind.frame_type(),
            outer: record.outer,
            active: record.state == FrameState::Active,
        })
    })
}

/// Number of frames reachable from the head
pub fn chain_depth() -> usize {
    ChainHead(current_frame()).frames().len()
}

/// A chain head passed explicitly to a callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead(pub(crate) Option<FrameId>);

impl ChainHead {
    pub fn frame(&self) -> Option<FrameId> {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_none()
    }

    /// Frames from this head outward to the root
    pub fn frames(&self) -> Vec<FrameInfo> {
        let mut frames = Vec::new();
        let mut cursor = self.0;
        while let Some(info) = cursor.and_then(frame_info) {
            cursor = info.outer;
            frames.push(info);
        }
        frames
    }
}

/// Current value of a dynamic variable: the thread binding if there is one,
/// else the global value.
pub fn symbol_value(symbol: Symbol) -> Option<Value> {
    with_state(|state| state.bindings.get(&symbol).cloned()).or_else(|| symbol.global_value())
}

/// Assign a dynamic variable: the innermost thread binding if there is one,
/// else the global value.
pub fn set_symbol_value(symbol: Symbol, value: Value) {
    let global = with_state(|state| match state.bindings.get_mut(&symbol) {
        Some(slot) => {
            *slot = value;
            None
        }
        None => Some(value),
    });
    if let Some(value) = global {
        symbol.set_global_value(value);
    }
}

/// Whether `symbol` is dynamically bound in this thread
pub fn is_bound_in_thread(symbol: Symbol) -> bool {
    with_state(|state| state.bindings.contains_key(&symbol))
}

pub fn stats() -> UnwindStats {
    with_state(|state| state.stats)
}

pub fn reset_stats() {
    with_state(|state| state.stats = UnwindStats::default());
}

pub fn thread_settings() -> Settings {
    with_state(|state| state.settings.clone())
}

/// Override the settings of the calling thread only.
pub fn set_thread_settings(settings: Settings) {
    with_state(|state| state.settings = settings);
}
