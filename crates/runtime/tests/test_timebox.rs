//! Integration tests for TIMEBOX
//!
//! Every test here spawns workers and some read the process-wide worker
//! counter, so they all run serially.

use serial_test::serial;
use std::error::Error as _;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempo_core::{FnOperator, Macro, MacroBuilder, Operator, ScriptError, Stack, Value};
use tempo_runtime::config::keys;
use tempo_runtime::{Properties, TimeBox, active_workers};

// Scheduling slack allowed on top of a deadline
const EPSILON: Duration = Duration::from_millis(400);

fn ms_props(max_ms: u64) -> Properties {
    Properties::new()
        .with(keys::TIMEBOX_MAXTIME, max_ms.to_string())
        .with(keys::TIME_UNITS, "ms")
}

fn add() -> Arc<dyn Operator> {
    Arc::new(FnOperator::new("+", |stack: &mut Stack| {
        stack.require("+", 2)?;
        match (stack.pop()?, stack.pop()?) {
            (Value::Int(b), Value::Int(a)) => {
                stack.push(a + b);
                Ok(())
            }
            _ => Err(ScriptError::type_error("+", "operates on two LONGs.")),
        }
    }))
}

/// Loops until cancelled
fn spin() -> Arc<dyn Operator> {
    Arc::new(FnOperator::new("SPIN", |stack: &mut Stack| {
        while !stack.is_cancelled() {
            thread::sleep(Duration::from_millis(1));
        }
        Err(ScriptError::Cancelled)
    }))
}

fn spin_macro() -> Macro {
    MacroBuilder::named("spin").push(1).call(spin()).build()
}

fn wait_for_workers_to_exit(within: Duration) -> bool {
    let start = Instant::now();
    while active_workers() > 0 {
        if start.elapsed() > within {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

#[test]
#[serial]
fn test_completed_macro_updates_caller_stack() {
    let tb = TimeBox::new("TIMEBOX", &ms_props(1_000)).unwrap();
    let mut stack = Stack::new();
    stack.push("below");
    stack.push(MacroBuilder::new().push(40).push(2).call(add()).build());
    stack.push(500);

    tb.apply(&mut stack).unwrap();
    assert_eq!(stack.values(), &[Value::from("below"), Value::Int(42)]);
    assert_eq!(active_workers(), 0);
}

#[test]
#[serial]
fn test_worker_sees_caller_values() {
    let tb = TimeBox::new("TIMEBOX", &ms_props(1_000)).unwrap();
    let mut stack = Stack::new();
    stack.push(40);
    stack.push(MacroBuilder::new().push(2).call(add()).build());
    stack.push(500);

    tb.apply(&mut stack).unwrap();
    assert_eq!(stack.values(), &[Value::Int(42)]);
}

#[test]
#[serial]
fn test_timeout_within_deadline_and_stack_untouched() {
    let tb = TimeBox::new("TIMEBOX", &ms_props(10_000)).unwrap();
    let mut stack = Stack::new();
    stack.push("below");
    stack.push(spin_macro());
    stack.push(100);

    let start = Instant::now();
    let err = tb.apply(&mut stack).unwrap_err();
    let elapsed = start.elapsed();

    assert!(
        matches!(err, ScriptError::Timeout { limit_ms: 100, .. }),
        "got {:?}",
        err
    );
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(100) + EPSILON, "{:?}", elapsed);
    // Arguments consumed, nothing the worker pushed is visible
    assert_eq!(stack.values(), &[Value::from("below")]);
    assert_eq!(active_workers(), 0);
}

#[test]
#[serial]
fn test_repeated_timeouts_leak_no_workers() {
    let tb = TimeBox::new("TIMEBOX", &ms_props(1_000)).unwrap();
    let code = spin_macro();
    for _ in 0..20 {
        let mut stack = Stack::new();
        stack.push(code.clone());
        stack.push(5);
        assert!(matches!(
            tb.apply(&mut stack),
            Err(ScriptError::Timeout { .. })
        ));
    }
    assert_eq!(active_workers(), 0);
}

#[test]
#[serial]
fn test_requested_deadline_is_clamped_to_configured_max() {
    let tb = TimeBox::new("TIMEBOX", &ms_props(150)).unwrap();
    let mut stack = Stack::new();
    stack.push(spin_macro());
    stack.push(150 + 1_000);

    let start = Instant::now();
    let err = tb.apply(&mut stack).unwrap_err();
    assert!(matches!(err, ScriptError::Timeout { limit_ms: 150, .. }));
    assert!(start.elapsed() < Duration::from_millis(150) + EPSILON);
}

#[test]
#[serial]
fn test_deadline_in_default_platform_units() {
    // Default unit is microseconds
    let props = Properties::new().with(keys::TIMEBOX_MAXTIME, "5000");
    let tb = TimeBox::new("TIMEBOX", &props).unwrap();
    let mut stack = Stack::new();
    stack.push(spin_macro());
    stack.push(50_000);

    let err = tb.apply(&mut stack).unwrap_err();
    assert!(matches!(err, ScriptError::Timeout { limit_ms: 50, .. }));
}

#[test]
#[serial]
fn test_failure_is_wrapped_with_its_cause() {
    let fail = Arc::new(FnOperator::new("FAIL", |_: &mut Stack| {
        Err(ScriptError::value_error("FAIL", "Invalid checksum."))
    }));
    let tb = TimeBox::new("TIMEBOX", &ms_props(1_000)).unwrap();
    let mut stack = Stack::new();
    stack.push(7);
    stack.push(MacroBuilder::new().push(1).call(fail).build());
    stack.push(500);

    let err = tb.apply(&mut stack).unwrap_err();
    assert_eq!(err.to_string(), "TIMEBOX encountered an error while executing");
    let cause = err.source().map(|c| c.to_string());
    assert_eq!(cause.as_deref(), Some("FAIL: Invalid checksum."));
    assert_eq!(stack.values(), &[Value::Int(7)]);
}

#[test]
#[serial]
fn test_worker_panic_is_reported() {
    let boom = Arc::new(FnOperator::new("BOOM", |_: &mut Stack| -> tempo_core::Result<()> {
        panic!("boom")
    }));
    let tb = TimeBox::with_operator("BOXED", boom, 1_000);
    let mut stack = Stack::new();

    match tb.apply(&mut stack).unwrap_err() {
        ScriptError::Execution { name, source } => {
            assert_eq!(name, "BOXED");
            assert!(matches!(*source, ScriptError::Panic(ref msg) if msg == "boom"));
        }
        other => panic!("Expected Execution, got {:?}", other),
    }
    assert_eq!(active_workers(), 0);
}

#[test]
#[serial]
fn test_wrapped_operator_uses_caller_arguments() {
    let tb = TimeBox::with_configured_operator(
        "BOXED+",
        add(),
        &Properties::new().with("custom.maxtime", "200"),
        "custom.maxtime",
    );
    assert_eq!(tb.max_ms(), 200);
    let mut stack = Stack::new();
    stack.push(1);
    stack.push(2);
    tb.apply(&mut stack).unwrap();
    assert_eq!(stack.values(), &[Value::Int(3)]);
}

#[test]
#[serial]
fn test_outer_deadline_cancels_nested_timebox() {
    let inner: Arc<dyn Operator> = Arc::new(TimeBox::new("TIMEBOX", &ms_props(10_000)).unwrap());
    let outer = TimeBox::new("TIMEBOX", &ms_props(10_000)).unwrap();

    let nested = MacroBuilder::new()
        .push(spin_macro())
        .push(5_000)
        .call(inner)
        .build();
    let mut stack = Stack::new();
    stack.push(nested);
    stack.push(100);

    let start = Instant::now();
    let err = outer.apply(&mut stack).unwrap_err();
    assert!(matches!(err, ScriptError::Timeout { limit_ms: 100, .. }));
    assert!(start.elapsed() < Duration::from_millis(100) + EPSILON);
    assert_eq!(active_workers(), 0);
}

#[test]
#[serial]
fn test_worker_ignoring_cancellation_is_shutdown_error() {
    let stubborn = Arc::new(FnOperator::new("SLEEP", |_: &mut Stack| {
        thread::sleep(Duration::from_millis(300));
        Ok(())
    }));
    let tb = TimeBox::with_operator("BOXED", stubborn, 20).with_grace(Duration::from_millis(10));
    let mut stack = Stack::new();

    let err = tb.apply(&mut stack).unwrap_err();
    match &err {
        ScriptError::Shutdown { name, source } => {
            assert_eq!(name, "BOXED");
            assert!(matches!(
                source.as_deref(),
                Some(ScriptError::Timeout { limit_ms: 20, .. })
            ));
        }
        other => panic!("Expected Shutdown, got {:?}", other),
    }
    assert!(err.cause_chain().contains("reached the execution time limit"));

    // The detached worker is still counted until it finishes
    assert_eq!(active_workers(), 1);
    assert!(wait_for_workers_to_exit(Duration::from_secs(2)));
}
