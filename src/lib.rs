pub mod benchmark;
pub mod cli;
pub mod config;
pub mod unwind;

// Re-export the control-transfer API
pub use crate::unwind::*;

pub use crate::config::{Config, Settings};
