//! Type definitions for the control-transfer core
//!
//! - Runtime values and multiple-value sets (Value, Values)
//! - Dynamic variables (Symbol)
//! - Dynamic-environment frames and destination handles
//! - Search outcomes (SearchStatus)
//! - Transfer payloads (Landing, Unwind, TransferSignal)

pub mod control;
pub mod frame;
pub mod status;
pub mod symbol;
pub mod values;

pub use control::{Landing, TransferResult, TransferSignal, Unwind};
pub use frame::{BlockExit, Cleanup, FrameId, FrameInfo, FrameType, TagbodyExit};
pub(crate) use frame::{FrameKind, FrameRecord, FrameState};
pub use status::SearchStatus;
pub use symbol::Symbol;
pub use values::{Value, Values};
