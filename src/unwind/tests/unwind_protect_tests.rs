//! Tests for unwind-protect cleanups

use super::helpers::{forced_fallback, fresh_tag, on_both_paths, EventLog};
use crate::unwind::{
    call_with_catch, call_with_escape, call_with_unwind_protect, current_frame, escape, throw,
    TransferResult, Value, Values,
};
use std::panic::{self, AssertUnwindSafe};

#[test]
fn test_cleanup_runs_on_normal_exit() {
    let log = EventLog::new();
    let value = call_with_unwind_protect(
        || {
            log.push("body");
            Ok(42)
        },
        log.cleanup("cleanup"),
    );
    assert_eq!(value.ok(), Some(42));
    assert_eq!(log.events(), vec!["body", "cleanup"]);
    assert_eq!(current_frame(), None);
}

#[test]
fn test_nested_cleanups_run_once_innermost_first() {
    let scenario = || {
        let log = EventLog::new();
        let result = call_with_escape(|exit| {
            call_with_unwind_protect(
                || {
                    call_with_unwind_protect(
                        || {
                            call_with_unwind_protect(
                                || Err(escape(exit, || Ok(Values::one(Value::Int(1))))),
                                log.cleanup("inner"),
                            )
                        },
                        log.cleanup("middle"),
                    )
                },
                log.cleanup("outer"),
            )
        })
        .unwrap();
        (result, log.events())
    };

    let (fast, fallback) = on_both_paths(scenario);
    assert_eq!(fast.0, Values::one(Value::Int(1)));
    assert_eq!(fast.1, vec!["inner", "middle", "outer"]);
    assert_eq!(fallback, fast);
}

#[test]
fn test_cleanup_outside_destination_does_not_run_early() {
    let log = EventLog::new();
    call_with_unwind_protect(
        || {
            call_with_escape(|exit| {
                call_with_unwind_protect(
                    || Err(escape(exit, || Ok(Values::none()))),
                    log.cleanup("inside"),
                )
            })
            .unwrap();
            log.push("after block");
            Ok(())
        },
        log.cleanup("outside"),
    )
    .unwrap();
    assert_eq!(log.events(), vec!["inside", "after block", "outside"]);
}

#[test]
fn test_cleanup_may_transfer_within_itself() {
    let log = EventLog::new();
    let cleanup_log = log.clone();
    let result = call_with_escape(|outer| {
        call_with_unwind_protect(
            || Err(escape(outer, || Ok(Values::one(Value::Int(1))))),
            move || {
                let inner = call_with_escape(|block| {
                    Err(escape(block, || Ok(Values::one(Value::Int(2)))))
                });
                match inner {
                    Ok(values) => cleanup_log.push(format!("cleanup got {}", values.primary())),
                    Err(unwind) => cleanup_log.push(format!("cleanup failed: {}", unwind)),
                }
                Ok(())
            },
        )
    })
    .unwrap();

    // The outer transfer's values survive the cleanup's own transfer
    assert_eq!(result, Values::one(Value::Int(1)));
    assert_eq!(log.events(), vec!["cleanup got 2"]);
    assert_eq!(current_frame(), None);
}

#[test]
fn test_cleanup_may_throw_within_itself() {
    let log = EventLog::new();
    let cleanup_log = log.clone();
    let k = fresh_tag(":outer");
    let result = call_with_catch(k.clone(), || {
        call_with_unwind_protect(
            || Err(throw(&k, || Ok(Values::one(Value::Int(10))))),
            move || {
                let local = fresh_tag(":local");
                let caught =
                    call_with_catch(local.clone(), || Err(throw(&local, || Ok(Values::none()))));
                cleanup_log.push(format!("local catch ok: {}", caught.is_ok()));
                Ok(())
            },
        )
    })
    .unwrap();
    assert_eq!(result, Values::one(Value::Int(10)));
    assert_eq!(log.events(), vec!["local catch ok: true"]);
}

#[test]
fn test_cleanup_runs_when_a_panic_passes() {
    let log = EventLog::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        call_with_escape(|_exit| {
            call_with_unwind_protect(
                || -> TransferResult<Values> { panic!("boom") },
                log.cleanup("cleanup"),
            )
        })
    }));
    assert!(outcome.is_err());
    assert_eq!(log.events(), vec!["cleanup"]);
    assert_eq!(current_frame(), None);
}

#[test]
fn test_cleanup_count_under_fallback() {
    let log = EventLog::new();
    forced_fallback(|| {
        for _ in 0..3 {
            call_with_escape(|exit| {
                call_with_unwind_protect(
                    || Err(escape(exit, || Ok(Values::none()))),
                    log.cleanup("cleanup"),
                )
            })
            .unwrap();
        }
    });
    assert_eq!(log.count("cleanup"), 3);
}

#[test]
fn test_cleanup_escape_supersedes_transfer_in_flight() {
    let scenario = || {
        let log = EventLog::new();
        let result = call_with_escape(|outer| {
            let inner = call_with_escape(|inner| {
                call_with_unwind_protect(
                    || Err(escape(inner, || Ok(Values::one(Value::Int(1))))),
                    move || Err(escape(outer, || Ok(Values::one(Value::Int(2))))),
                )
            })?;
            log.push("inner block returned");
            Ok(inner)
        })
        .unwrap();
        (result, log.events(), current_frame())
    };

    let (fast, fallback) = on_both_paths(scenario);
    assert_eq!(fast, (Values::one(Value::Int(2)), Vec::<String>::new(), None));
    assert_eq!(fallback, fast);
}

#[test]
fn test_cleanup_escape_after_normal_return() {
    let scenario = || {
        let log = EventLog::new();
        let cleanup_log = log.clone();
        let result = call_with_escape(|outer| {
            call_with_unwind_protect(
                || {
                    log.push("body");
                    Ok(Values::one(Value::Int(1)))
                },
                move || {
                    cleanup_log.push("cleanup");
                    Err(escape(outer, || Ok(Values::one(Value::Int(2)))))
                },
            )
        })
        .unwrap();
        (result, log.events(), current_frame())
    };

    let (fast, fallback) = on_both_paths(scenario);
    assert_eq!(fast.0, Values::one(Value::Int(2)));
    assert_eq!(fast.1, vec!["body", "cleanup"]);
    assert_eq!(fast.2, None);
    assert_eq!(fallback, fast);
}

#[test]
fn test_cleanup_escape_supersedes_a_panic() {
    let result = call_with_escape(|exit| {
        call_with_unwind_protect(
            || -> TransferResult<Values> { panic::panic_any("abandoned failure") },
            move || Err(escape(exit, || Ok(Values::one(Value::Int(5))))),
        )
    })
    .unwrap();
    assert_eq!(result, Values::one(Value::Int(5)));
    assert_eq!(current_frame(), None);
}

#[test]
fn test_nested_cleanups_after_superseding_escape() {
    let scenario = || {
        let log = EventLog::new();
        let result = call_with_escape(|outer| {
            call_with_unwind_protect(
                || {
                    call_with_escape(|inner| {
                        call_with_unwind_protect(
                            || Err(escape(inner, || Ok(Values::one(Value::Int(1))))),
                            move || Err(escape(outer, || Ok(Values::one(Value::Int(3))))),
                        )
                    })
                },
                log.cleanup("outer cleanup"),
            )
        })
        .unwrap();
        (result, log.events())
    };

    // The cleanup between the two blocks runs once, for the new transfer
    let (fast, fallback) = on_both_paths(scenario);
    assert_eq!(fast.0, Values::one(Value::Int(3)));
    assert_eq!(fast.1, vec!["outer cleanup"]);
    assert_eq!(fallback, fast);
}
