//! Per-function timing record.
//!
//! A `ProfiledFunction` is shared by every thread that calls the wrapped
//! callable. Cumulative counters live behind one lock so that a checkpoint
//! always reads a consistent `(calls, whole, isolated)` triple, never one torn
//! by a concurrent `leave`.
//!
//! In-flight invocations are kept as a single LIFO of start timestamps tagged
//! with the tracker that opened them. Popping takes the most recent entry for
//! the calling tracker, which keeps recursion on one stack correct while other
//! threads interleave their own activations of the same function.

use std::time::Duration;

use parking_lot::Mutex;

use crate::config::TimeUnit;
use crate::error::Error;
use crate::tracker::TrackerId;

/// Immutable capture of a function's cumulative counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointSnapshot {
    pub at: Duration,
    pub calls: u64,
    pub whole_time: Duration,
    pub isolated_time: Duration,
}

impl CheckpointSnapshot {
    /// Activity between `earlier` and this snapshot.
    pub fn delta(&self, earlier: &CheckpointSnapshot) -> Window {
        Window {
            span: self.at.saturating_sub(earlier.at),
            calls: self.calls.saturating_sub(earlier.calls),
            whole_time: self.whole_time.saturating_sub(earlier.whole_time),
            isolated_time: self.isolated_time.saturating_sub(earlier.isolated_time),
        }
    }
}

/// Windowed (as opposed to lifetime) statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub span: Duration,
    pub calls: u64,
    pub whole_time: Duration,
    pub isolated_time: Duration,
}

/// Consistent read of the cumulative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub calls: u64,
    pub whole_time: Duration,
    pub isolated_time: Duration,
}

/// One unterminated invocation.
#[derive(Debug, Clone)]
pub(crate) struct Invocation {
    pub(crate) tracker: TrackerId,
    pub(crate) start: Duration,
    pub(crate) context: String,
}

#[derive(Debug, Default)]
struct State {
    totals: Totals,
    in_flight: Vec<Invocation>,
    checkpoints: Vec<CheckpointSnapshot>,
}

#[derive(Debug)]
pub struct ProfiledFunction {
    path: String,
    name_at: usize,
    state: Mutex<State>,
}

impl ProfiledFunction {
    pub(crate) fn new(container_path: &str, name: &str) -> Self {
        Self {
            path: format!("{container_path}.{name}"),
            name_at: container_path.len() + 1,
            state: Mutex::new(State::default()),
        }
    }

    /// Fully-qualified path: container path plus name.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.path[self.name_at..]
    }

    pub fn container_path(&self) -> &str {
        &self.path[..self.name_at - 1]
    }

    pub fn call_count(&self) -> u64 {
        self.state.lock().totals.calls
    }

    pub fn whole_time(&self) -> Duration {
        self.state.lock().totals.whole_time
    }

    pub fn isolated_time(&self) -> Duration {
        self.state.lock().totals.isolated_time
    }

    pub fn whole_time_in(&self, unit: TimeUnit) -> f64 {
        unit.convert(self.whole_time())
    }

    pub fn isolated_time_in(&self, unit: TimeUnit) -> f64 {
        unit.convert(self.isolated_time())
    }

    pub fn totals(&self) -> Totals {
        self.state.lock().totals
    }

    /// Number of invocations currently open, across all trackers.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Call-path label (`a > b > c`) of the most recent open invocation.
    pub fn current_context(&self) -> Option<String> {
        self.state.lock().in_flight.last().map(|i| i.context.clone())
    }

    /// Append the current counters as a snapshot tagged with `at`. Only the
    /// instrumentor stamps snapshots, so every function shares one timeline.
    pub(crate) fn checkpoint(&self, at: Duration) -> Result<CheckpointSnapshot, Error> {
        let mut state = self.state.lock();
        if state.checkpoints.last().is_some_and(|last| last.at > at) {
            return Err(Error::CheckpointOutOfOrder {
                path: self.path.clone(),
            });
        }
        let snapshot = CheckpointSnapshot {
            at,
            calls: state.totals.calls,
            whole_time: state.totals.whole_time,
            isolated_time: state.totals.isolated_time,
        };
        state.checkpoints.push(snapshot);
        Ok(snapshot)
    }

    pub fn checkpoints(&self) -> Vec<CheckpointSnapshot> {
        self.state.lock().checkpoints.clone()
    }

    pub fn last_checkpoint(&self) -> Option<CheckpointSnapshot> {
        self.state.lock().checkpoints.last().copied()
    }

    /// Activity since the most recent checkpoint, or lifetime totals if none
    /// has been taken. `span` is only known relative to a checkpoint and is
    /// zero otherwise.
    pub fn since_last_checkpoint(&self) -> Window {
        let state = self.state.lock();
        let t = state.totals;
        match state.checkpoints.last() {
            Some(last) => Window {
                span: Duration::ZERO,
                calls: t.calls - last.calls,
                whole_time: t.whole_time - last.whole_time,
                isolated_time: t.isolated_time - last.isolated_time,
            },
            None => Window {
                span: Duration::ZERO,
                calls: t.calls,
                whole_time: t.whole_time,
                isolated_time: t.isolated_time,
            },
        }
    }

    pub(crate) fn push_start(&self, invocation: Invocation) {
        self.state.lock().in_flight.push(invocation);
    }

    /// Remove the newest open invocation that `tracker` started.
    pub(crate) fn pop_start(&self, tracker: TrackerId) -> Option<Invocation> {
        let mut state = self.state.lock();
        let idx = state.in_flight.iter().rposition(|i| i.tracker == tracker)?;
        Some(state.in_flight.remove(idx))
    }

    pub(crate) fn record(&self, whole: Duration, isolated: Duration) {
        debug_assert!(isolated <= whole, "isolated {isolated:?} > whole {whole:?}");
        let mut state = self.state.lock();
        state.totals.calls += 1;
        state.totals.whole_time += whole;
        state.totals.isolated_time += isolated;
    }
}
