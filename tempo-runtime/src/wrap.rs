//! Transparent timing adapters around callables.
//!
//! Wrapping adds timing side effects only. Arguments, return values and
//! `Result` errors pass through untouched, and a panic in the original still
//! records the call: the tracker guard leaves on unwinding before the panic
//! reaches the caller.

use std::sync::Arc;

use crate::function::ProfiledFunction;
use crate::tracker::CallStackTracker;

/// A callable obtained from the instrumentor. Holds the original and, when the
/// path was instrumented, the profile that times it.
#[derive(Clone)]
pub struct Instrumented<F> {
    original: F,
    profile: Option<Arc<ProfiledFunction>>,
}

impl<F> std::fmt::Debug for Instrumented<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumented")
            .field("path", &self.profile.as_ref().map(|p| p.path()))
            .finish_non_exhaustive()
    }
}

impl<F> Instrumented<F> {
    pub fn new(original: F, profile: Arc<ProfiledFunction>) -> Self {
        Self {
            original,
            profile: Some(profile),
        }
    }

    /// A callable that is handed out through the same API but never timed
    /// (excluded paths and constructible types).
    pub fn passthrough(original: F) -> Self {
        Self {
            original,
            profile: None,
        }
    }

    pub fn profile(&self) -> Option<&Arc<ProfiledFunction>> {
        self.profile.as_ref()
    }

    pub fn is_timed(&self) -> bool {
        self.profile.is_some()
    }

    pub fn original(&self) -> &F {
        &self.original
    }

    pub fn into_original(self) -> F {
        self.original
    }

    /// Invoke through `call`, which receives the original callable and
    /// supplies the arguments. Works for any arity:
    ///
    /// ```ignore
    /// let sum = add.invoke(&tracker, |f| f(2, 3));
    /// ```
    pub fn invoke<R>(&self, tracker: &CallStackTracker, call: impl FnOnce(&F) -> R) -> R {
        match &self.profile {
            Some(profile) => {
                let _guard = tracker.guard(profile);
                call(&self.original)
            }
            None => call(&self.original),
        }
    }

    /// Mutable counterpart of `invoke` for `FnMut` originals.
    pub fn invoke_mut<R>(
        &mut self,
        tracker: &CallStackTracker,
        call: impl FnOnce(&mut F) -> R,
    ) -> R {
        match &self.profile {
            Some(profile) => {
                let _guard = tracker.guard(profile);
                call(&mut self.original)
            }
            None => call(&mut self.original),
        }
    }

    /// Call a single-argument original; pass a tuple for several arguments.
    pub fn call<A, R>(&self, tracker: &CallStackTracker, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        self.invoke(tracker, |f| f(args))
    }
}

/// Produce a replacement for `original` that is timed against `profile` on
/// `tracker`.
pub fn wrap<'t, A, R, F>(
    original: F,
    profile: Arc<ProfiledFunction>,
    tracker: &'t CallStackTracker,
) -> impl Fn(A) -> R + 't
where
    F: Fn(A) -> R + 't,
{
    move |args| {
        let _guard = tracker.guard(&profile);
        original(args)
    }
}

/// `wrap` for originals that mutate captured state.
pub fn wrap_mut<'t, A, R, F>(
    mut original: F,
    profile: Arc<ProfiledFunction>,
    tracker: &'t CallStackTracker,
) -> impl FnMut(A) -> R + 't
where
    F: FnMut(A) -> R + 't,
{
    move |args| {
        let _guard = tracker.guard(&profile);
        original(args)
    }
}

/// Time `body` as one invocation of `profile`.
pub fn profile_scope<R>(
    tracker: &CallStackTracker,
    profile: &ProfiledFunction,
    body: impl FnOnce() -> R,
) -> R {
    let _guard = tracker.guard(profile);
    body()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::time::Duration;

    fn setup() -> (CallStackTracker, ManualClock) {
        let clock = ManualClock::new();
        let tracker = CallStackTracker::new(Arc::new(clock.clone()), Config::default());
        (tracker, clock)
    }

    #[derive(Debug, PartialEq)]
    struct ParseError(&'static str);

    #[test]
    fn wrapped_returns_original_value() {
        let (t, clock) = setup();
        let profile = Arc::new(ProfiledFunction::new("app", "add"));
        let add = wrap(
            |(a, b): (i32, i32)| {
                clock.advance_ms(2);
                a + b
            },
            Arc::clone(&profile),
            &t,
        );
        assert_eq!(add((2, 3)), 5);
        assert_eq!(add((10, -4)), 6);
        assert_eq!(profile.call_count(), 2);
        assert_eq!(profile.whole_time(), Duration::from_millis(4));
    }

    #[test]
    fn wrapped_error_propagates_and_is_timed() {
        let (t, clock) = setup();
        let profile = Arc::new(ProfiledFunction::new("app", "parse"));
        let parse = Instrumented::new(
            |input: &str| -> Result<u32, ParseError> {
                clock.advance_ms(9);
                input.parse().map_err(|_| ParseError("not a number"))
            },
            Arc::clone(&profile),
        );

        assert_eq!(parse.call(&t, "nope"), Err(ParseError("not a number")));
        assert_eq!(profile.call_count(), 1);
        assert_eq!(profile.whole_time(), Duration::from_millis(9));
        assert_eq!(profile.isolated_time(), Duration::from_millis(9));
        assert!(t.is_idle());
    }

    #[test]
    fn panic_is_propagated_unchanged_and_still_timed() {
        let (t, clock) = setup();
        let profile = Arc::new(ProfiledFunction::new("app", "explode"));
        let explode = Instrumented::new(
            |code: u32| -> u32 {
                clock.advance_ms(5);
                std::panic::panic_any(code)
            },
            Arc::clone(&profile),
        );

        let payload = catch_unwind(AssertUnwindSafe(|| explode.call(&t, 42))).unwrap_err();
        assert_eq!(payload.downcast_ref::<u32>(), Some(&42));
        assert_eq!(profile.call_count(), 1);
        assert_eq!(profile.whole_time(), Duration::from_millis(5));
        assert!(t.is_idle(), "leave must run on unwind");
    }

    #[test]
    fn passthrough_is_not_timed() {
        let (t, _clock) = setup();
        let double = Instrumented::passthrough(|x: u64| x * 2);
        assert!(!double.is_timed());
        assert_eq!(format!("{double:?}"), "Instrumented { path: None, .. }");
        assert_eq!(double.call(&t, 21), 42);
        assert!(t.is_idle());
    }

    #[test]
    fn invoke_supports_any_arity() {
        let (t, _clock) = setup();
        let profile = Arc::new(ProfiledFunction::new("app", "clamp"));
        let clamp = Instrumented::new(|v: i64, lo: i64, hi: i64| v.max(lo).min(hi), profile);
        assert_eq!(clamp.invoke(&t, |f| f(15, 0, 10)), 10);
        assert_eq!(clamp.profile().unwrap().call_count(), 1);
    }

    #[test]
    fn wrap_mut_and_invoke_mut_keep_state() {
        let (t, _clock) = setup();
        let profile = Arc::new(ProfiledFunction::new("app", "count"));
        let mut total = 0;
        {
            let mut count = wrap_mut(|n: u32| total += n, Arc::clone(&profile), &t);
            count(3);
            count(4);
        }
        assert_eq!(total, 7);

        let hits = Cell::new(0);
        let mut bump = Instrumented::new(|| hits.set(hits.get() + 1), Arc::clone(&profile));
        bump.invoke_mut(&t, |f| f());
        assert_eq!(hits.get(), 1);
        assert_eq!(profile.call_count(), 3);
    }

    #[test]
    fn profile_scope_times_body() {
        let (t, clock) = setup();
        let profile = ProfiledFunction::new("app", "block");
        let out = profile_scope(&t, &profile, || {
            clock.advance_ms(3);
            "done"
        });
        assert_eq!(out, "done");
        assert_eq!(profile.whole_time(), Duration::from_millis(3));
    }
}
