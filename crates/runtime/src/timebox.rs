//! TIMEBOX: time-bounded execution
//!
//! Runs a unit of work on a dedicated worker thread and gives up once a
//! deadline passes.
//!
//! # API
//!
//! ```text
//! macro deadline TIMEBOX    # ( MACRO LONG -- ... ) deadline in platform time units
//! ```
//!
//! An operator can also be wrapped directly with a fixed or configured
//! ceiling, in which case the operator's own arguments are used unchanged.
//!
//! ## Outcomes
//!
//! | Worker | Caller's stack | Result |
//! |--------|----------------|--------|
//! | completes in time | takes the worker's values | `Ok` |
//! | fails in time | untouched | `Execution` with the failure as source |
//! | still running at the deadline | untouched | `Timeout` |
//! | ignores cancellation past the grace period | untouched | `Shutdown` with the timeout as source |
//!
//! ## Design
//!
//! The worker gets a fork of the caller's stack carrying a child of the
//! caller's cancellation token, so the caller never observes partial
//! mutations and an outer deadline also cancels nested boxes. Cancellation is
//! cooperative: macros check the token between instructions.
//!
//! Every worker holds a guard on a process-wide counter until it exits;
//! [`active_workers`] exposes it so leaked workers are observable.

use crate::config::{Properties, keys};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tempo_core::{Macro, Operator, Result, ScriptError, Stack, Value, format_panic_payload};
use tracing::{debug, warn};

/// Ceiling (ms) used when `tempo.timebox.maxtime` is unset or unparsable
pub const DEFAULT_TIMEBOX_MAXTIME: u64 = 30_000;

/// Shutdown grace (ms) used when `tempo.timebox.grace` is unset
pub const DEFAULT_TIMEBOX_GRACE: u64 = 50;

// Workers currently alive (spawned and not yet exited)
static ACTIVE_WORKERS: AtomicUsize = AtomicUsize::new(0);

// Thread name suffixes
static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Number of TIMEBOX workers that have not exited yet
pub fn active_workers() -> usize {
    ACTIVE_WORKERS.load(Ordering::Acquire)
}

/// Holds one slot of `ACTIVE_WORKERS` for as long as it lives
struct WorkerGuard;

impl WorkerGuard {
    fn enter() -> Self {
        ACTIVE_WORKERS.fetch_add(1, Ordering::AcqRel);
        WorkerGuard
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        ACTIVE_WORKERS.fetch_sub(1, Ordering::AcqRel);
    }
}

enum Work {
    /// Wrapped operator with a fixed ceiling
    Operator(Arc<dyn Operator>),
    /// Macro and deadline taken from the stack
    Macro { units_per_ms: u64 },
}

/// Time-bounded execution wrapper
pub struct TimeBox {
    name: String,
    work: Work,
    max_ms: u64,
    grace: Duration,
}

impl TimeBox {
    /// Macro mode, configured from `tempo.timebox.*` and `tempo.time.units`
    pub fn new(name: impl Into<String>, props: &Properties) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            work: Work::Macro {
                units_per_ms: props.time_units_per_ms()?,
            },
            max_ms: props.get_u64(keys::TIMEBOX_MAXTIME, DEFAULT_TIMEBOX_MAXTIME),
            grace: grace_from(props),
        })
    }

    /// Wrap `op`, bounding every call to `max_ms`
    pub fn with_operator(name: impl Into<String>, op: Arc<dyn Operator>, max_ms: u64) -> Self {
        Self {
            name: name.into(),
            work: Work::Operator(op),
            max_ms,
            grace: Duration::from_millis(DEFAULT_TIMEBOX_GRACE),
        }
    }

    /// Wrap `op` with the ceiling read once from `key`
    pub fn with_configured_operator(
        name: impl Into<String>,
        op: Arc<dyn Operator>,
        props: &Properties,
        key: &str,
    ) -> Self {
        Self {
            name: name.into(),
            work: Work::Operator(op),
            max_ms: props.get_u64(key, DEFAULT_TIMEBOX_MAXTIME),
            grace: grace_from(props),
        }
    }

    /// Override the shutdown grace period
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Largest deadline (ms) this wrapper will honor
    pub fn max_ms(&self) -> u64 {
        self.max_ms
    }

    /// Deadline in platform units -> ms, clamped to `[0, max_ms]`
    fn clamp_deadline(&self, requested: i64, units_per_ms: u64) -> u64 {
        let ms = u64::try_from(requested).unwrap_or(0) / units_per_ms.max(1);
        ms.min(self.max_ms)
    }

    fn pop_macro_args(&self, stack: &mut Stack, units_per_ms: u64) -> Result<(Arc<Macro>, u64)> {
        stack.require(&self.name, 2)?;
        let requested = match stack.peek()? {
            Value::Int(d) => *d,
            _ => {
                return Err(ScriptError::type_error(
                    &self.name,
                    "expects a maximum execution time on top of the stack.",
                ));
            }
        };
        if !matches!(stack.get(1)?, Value::Macro(_)) {
            return Err(ScriptError::type_error(&self.name, "operates on a macro."));
        }
        stack.pop()?;
        match stack.pop()? {
            Value::Macro(code) => Ok((code, self.clamp_deadline(requested, units_per_ms))),
            _ => Err(ScriptError::Underflow),
        }
    }

    /// Run `job` against a fork of `stack` on a worker thread
    fn run_bounded<F>(&self, stack: &mut Stack, limit_ms: u64, job: F) -> Result<()>
    where
        F: FnOnce(&mut Stack) -> Result<()> + Send + 'static,
    {
        if stack.is_cancelled() {
            return Err(ScriptError::Cancelled);
        }

        let token = stack.cancel_token().child();
        let mut forked = stack.fork(token.clone());
        let (tx, rx) = mpsc::channel();
        let guard = WorkerGuard::enter();
        let worker_id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);

        let handle = thread::Builder::new()
            .name(format!("tempo-timebox-{}", worker_id))
            .spawn(move || {
                let _guard = guard;
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| job(&mut forked))) {
                    Ok(result) => result.map(|()| forked.into_values()),
                    Err(payload) => Err(ScriptError::Panic(format_panic_payload(&payload))),
                };
                // Receiver is gone only if the caller already gave up
                let _ = tx.send(outcome);
            })?;

        debug!(name = %self.name, worker_id, limit_ms, "timebox worker started");
        let started = Instant::now();

        match rx.recv_timeout(Duration::from_millis(limit_ms)) {
            Ok(outcome) => {
                join_worker(handle, worker_id);
                debug!(
                    name = %self.name,
                    worker_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = outcome.is_ok(),
                    "timebox worker finished"
                );
                match outcome {
                    Ok(values) => {
                        stack.replace_values(values);
                        Ok(())
                    }
                    Err(source) => Err(ScriptError::Execution {
                        name: self.name.clone(),
                        source: Box::new(source),
                    }),
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                join_worker(handle, worker_id);
                Err(ScriptError::Execution {
                    name: self.name.clone(),
                    source: Box::new(ScriptError::Panic(
                        "worker exited without reporting".to_string(),
                    )),
                })
            }
            Err(RecvTimeoutError::Timeout) => {
                token.cancel();
                let timeout = ScriptError::Timeout {
                    name: self.name.clone(),
                    limit_ms,
                };
                match rx.recv_timeout(self.grace) {
                    Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                        join_worker(handle, worker_id);
                        debug!(name = %self.name, worker_id, limit_ms, "timebox worker cancelled");
                        Err(timeout)
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        // Detached; its guard keeps it visible in active_workers()
                        warn!(
                            name = %self.name,
                            worker_id,
                            grace_ms = self.grace.as_millis() as u64,
                            "timebox worker ignored cancellation"
                        );
                        Err(ScriptError::Shutdown {
                            name: self.name.clone(),
                            source: Some(Box::new(timeout)),
                        })
                    }
                }
            }
        }
    }
}

impl Operator for TimeBox {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        match &self.work {
            Work::Operator(op) => {
                let op = Arc::clone(op);
                self.run_bounded(stack, self.max_ms, move |s| op.apply(s))
            }
            Work::Macro { units_per_ms } => {
                let (code, limit_ms) = self.pop_macro_args(stack, *units_per_ms)?;
                self.run_bounded(stack, limit_ms, move |s| s.exec(&code))
            }
        }
    }
}

fn grace_from(props: &Properties) -> Duration {
    Duration::from_millis(props.get_u64(keys::TIMEBOX_GRACE, DEFAULT_TIMEBOX_GRACE))
}

fn join_worker(handle: thread::JoinHandle<()>, worker_id: u64) {
    if handle.join().is_err() {
        warn!(worker_id, "timebox worker panicked outside its job");
    }
}
