//! Call-stack bookkeeping and isolated-time attribution.
//!
//! A `CallStackTracker` models one logical call stack: one per thread or task.
//! It is `Send` but not `Sync`; share the `ProfiledFunction`s, not the tracker.
//!
//! Attribution works without a call tree. Each depth has a slot holding the
//! whole time of children that already returned directly beneath the frame
//! open at that depth. `enter` zeroes the slot for the new frame. `leave`
//! decrements the depth first, so `depth + 1` addresses the closing frame and
//! `depth` its parent: the closing frame's isolated time is its elapsed time
//! minus its own slot, and its elapsed time is then added to the parent's slot.
//! By the time a frame closes all of its direct children have closed, so the
//! slot is complete. Both operations are O(1).
//!
//! Slots are stored at index `depth + 1`; index 0 belongs to "no call in
//! progress" and accumulates the whole time of top-level calls.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::config::Config;
use crate::error::Error;
use crate::function::{Invocation, ProfiledFunction};

/// Separator between path labels in an invocation's call-path context.
pub const CONTEXT_SEPARATOR: &str = " > ";

/// Distinguishes trackers sharing the same `ProfiledFunction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerId(pub(crate) u64);

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Stack {
    /// -1 when no call is in progress.
    depth: isize,
    claimed: Vec<Duration>,
    contexts: Vec<String>,
}

impl Stack {
    fn new() -> Self {
        Self {
            depth: -1,
            claimed: vec![Duration::ZERO],
            contexts: Vec::new(),
        }
    }

    fn slot(depth: isize) -> usize {
        (depth + 1) as usize
    }
}

pub struct CallStackTracker {
    id: TrackerId,
    clock: Arc<dyn Clock>,
    config: Config,
    stack: RefCell<Stack>,
}

impl CallStackTracker {
    pub fn new(clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            id: TrackerId(NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed)),
            clock,
            config,
            stack: RefCell::new(Stack::new()),
        }
    }

    pub fn id(&self) -> TrackerId {
        self.id
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Current nesting depth; -1 when idle.
    pub fn depth(&self) -> isize {
        self.stack.borrow().depth
    }

    pub fn is_idle(&self) -> bool {
        self.depth() < 0
    }

    /// Paths of the open calls, outermost first.
    pub fn contexts(&self) -> Vec<String> {
        self.stack.borrow().contexts.clone()
    }

    /// Whole time of every completed top-level call on this tracker.
    pub fn top_level_time(&self) -> Duration {
        self.stack.borrow().claimed[0]
    }

    /// Record the start of an invocation of `function`.
    pub fn enter(&self, function: &ProfiledFunction) {
        let depth = {
            let mut stack = self.stack.borrow_mut();
            stack.depth += 1;
            let slot = Stack::slot(stack.depth);
            if slot == stack.claimed.len() {
                stack.claimed.push(Duration::ZERO);
            } else {
                stack.claimed[slot] = Duration::ZERO;
            }
            stack.contexts.push(function.path().to_owned());

            function.push_start(Invocation {
                tracker: self.id,
                start: self.clock.now(),
                context: stack.contexts.join(CONTEXT_SEPARATOR),
            });
            stack.depth
        };

        if self.config.real_time_logging {
            self.trace("start:", depth, function);
        }
    }

    /// Record the end of the innermost open invocation, which must belong to
    /// `function`. On error nothing is modified.
    pub fn leave(&self, function: &ProfiledFunction) -> Result<(), Error> {
        let depth = {
            let mut stack = self.stack.borrow_mut();
            match stack.contexts.last() {
                None => {
                    return Err(Error::StackUnderflow {
                        path: function.path().to_owned(),
                    });
                }
                Some(top) if top != function.path() => {
                    return Err(Error::StackMismatch {
                        expected: top.clone(),
                        found: function.path().to_owned(),
                    });
                }
                Some(_) => {}
            }
            let invocation = function
                .pop_start(self.id)
                .ok_or_else(|| Error::StackUnderflow {
                    path: function.path().to_owned(),
                })?;
            let now = self.clock.now();

            stack.depth -= 1;
            let closing = Stack::slot(stack.depth + 1);
            let parent = Stack::slot(stack.depth);

            let call_time = now.saturating_sub(invocation.start);
            let isolated = call_time.saturating_sub(stack.claimed[closing]);
            function.record(call_time, isolated);
            stack.claimed[parent] += call_time;
            stack.contexts.pop();
            stack.depth
        };

        if self.config.real_time_logging {
            self.trace("stop: ", depth + 1, function);
        }
        Ok(())
    }

    /// Enter `function` and return a guard that leaves it on drop, on every
    /// exit path including unwinding.
    pub fn guard<'a>(&'a self, function: &'a ProfiledFunction) -> Guard<'a> {
        self.enter(function);
        Guard {
            tracker: self,
            function,
        }
    }

    fn trace(&self, event: &str, depth: isize, function: &ProfiledFunction) {
        let indent = "  ".repeat(depth.max(0) as usize);
        let isolated = self.config.time_unit.format(function.isolated_time());
        tracing::info!(
            target: "tempo::realtime",
            depth,
            isolated = %isolated,
            "{indent}{event} {} {isolated}",
            function.path()
        );
    }
}

impl Default for CallStackTracker {
    fn default() -> Self {
        Self::new(Arc::new(MonotonicClock::new()), Config::default())
    }
}

impl std::fmt::Debug for CallStackTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stack = self.stack.borrow();
        f.debug_struct("CallStackTracker")
            .field("id", &self.id)
            .field("depth", &stack.depth)
            .field("contexts", &stack.contexts)
            .finish()
    }
}

/// RAII scope for one invocation. Leaves the function on drop.
///
/// A stack-discipline violation is an assertion failure: the guard panics,
/// unless the thread is already unwinding, where it logs instead of aborting
/// the process with a double panic.
#[must_use = "dropping the guard immediately records ~0ms; bind it with `let _guard = ...`"]
pub struct Guard<'a> {
    tracker: &'a CallStackTracker,
    function: &'a ProfiledFunction,
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.tracker.leave(self.function) {
            if std::thread::panicking() {
                tracing::error!("tempo-runtime: {e} (while unwinding)");
            } else {
                panic!("tempo-runtime: {e}");
            }
        }
    }
}
