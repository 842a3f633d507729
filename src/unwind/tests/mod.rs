//! Tests for the control-transfer core
//!
//! Organized by construct. Scenarios that must behave the same on both paths
//! run twice through `helpers::on_both_paths`.

mod helpers;
mod unwind_protect_tests;
