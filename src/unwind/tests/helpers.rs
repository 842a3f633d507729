//! Test helpers for the unwind tests
//!
//! An event log that cleanups (which must be `'static`) can write into, and
//! runners that execute a scenario on the fast path, the forced fallback
//! path, or both.

use crate::config::Settings;
use crate::unwind::{set_thread_settings, thread_settings, Symbol, TransferResult, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Ordered record of what ran, shared between a test and its cleanups
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    /// A cleanup that records `event`
    pub fn cleanup(&self, event: &str) -> impl FnOnce() -> TransferResult<()> + 'static {
        let log = self.clone();
        let event = event.to_string();
        move || {
            log.push(event);
            Ok(())
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }
}

/// A dynamic variable no other test touches, with global value `value`
pub fn fresh_special(value: i64) -> Symbol {
    let sym = Symbol::gensym("*special-");
    sym.set_global_value(Value::Int(value));
    sym
}

/// A tag symbol unique to the calling test
pub fn fresh_tag(name: &str) -> Value {
    Value::Symbol(Symbol::gensym(name))
}

/// Run `f` with this thread's settings changed by `adjust`, then restore them
pub fn with_settings<R>(adjust: impl FnOnce(&mut Settings), f: impl FnOnce() -> R) -> R {
    let previous = thread_settings();
    let mut settings = previous.clone();
    adjust(&mut settings);
    set_thread_settings(settings);
    let result = f();
    set_thread_settings(previous);
    result
}

pub fn forced_fallback<R>(f: impl FnOnce() -> R) -> R {
    with_settings(|s| s.force_fallback = true, f)
}

pub fn strict_abandon<R>(f: impl FnOnce() -> R) -> R {
    with_settings(|s| s.strict_abandon = true, f)
}

/// Run `scenario` on both paths; returns (fast, fallback)
pub fn on_both_paths<R>(scenario: impl Fn() -> R) -> (R, R) {
    let fast = scenario();
    let fallback = forced_fallback(&scenario);
    (fast, fallback)
}
