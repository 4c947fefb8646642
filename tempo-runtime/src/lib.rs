//! Call-level instrumentation profiling.
//!
//! Every invocation of a wrapped callable is timed twice over: its whole time
//! (everything between entry and return) and its isolated time (whole time
//! minus the whole time of instrumented calls made directly beneath it).
//!
//! Typical flow:
//!
//! ```ignore
//! let inst = Instrumentor::builder("app")
//!     .config(Config::from_env())
//!     .instrument([Candidate::function("app.io", "load")])?;
//! let tracker = inst.tracker(); // one per thread
//! let load = inst.bind("app.io.load", |path: &str| std::fs::read(path))?;
//! let bytes = load.call(&tracker, "data.bin");
//! inst.checkpoint()?;
//! ```

mod clock;
mod config;
mod error;
mod function;
mod instrumentor;
mod registry;
mod tracker;
mod wrap;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Config, TimeUnit};
pub use error::Error;
pub use function::{CheckpointSnapshot, ProfiledFunction, Totals, Window};
pub use instrumentor::{Builder, Candidate, Instrumentor, MEMBER_CONTAINER_NAME, SkipReason};
pub use registry::{ChildFilter, Container, ContainerKind, ContainerRegistry};
pub use tracker::{CONTEXT_SEPARATOR, CallStackTracker, Guard, TrackerId};
pub use wrap::{Instrumented, profile_scope, wrap, wrap_mut};
