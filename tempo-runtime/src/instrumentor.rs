//! Instrumentation setup and checkpointing.
//!
//! Setup takes an explicit list of candidates (what a discovery layer or a
//! static manifest produced), builds the container tree and one
//! `ProfiledFunction` per timed candidate. It is all-or-nothing: the first
//! error discards everything built so far, so a program is never left
//! half-instrumented.
//!
//! Callables are bound afterwards by path with `bind`, which hands back the
//! timed adapter (or a pass-through for paths that are deliberately not
//! timed). Setup must finish before any bound callable runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::{Clock, MonotonicClock};
use crate::config::Config;
use crate::error::Error;
use crate::function::ProfiledFunction;
use crate::registry::{ContainerKind, ContainerRegistry};
use crate::tracker::CallStackTracker;
use crate::wrap::Instrumented;

/// Name of the member container created under every constructible type.
pub const MEMBER_CONTAINER_NAME: &str = "instance";

/// One instrumentation target as produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub container_path: String,
    pub name: String,
    /// Constructible type rather than a plain function. Registered as a
    /// container and never timed itself.
    pub class_like: bool,
    /// Candidates sharing a key refer to the same underlying callable.
    pub alias_of: Option<String>,
}

impl Candidate {
    pub fn function(container_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container_path: container_path.into(),
            name: name.into(),
            class_like: false,
            alias_of: None,
        }
    }

    pub fn class_like(container_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class_like: true,
            ..Self::function(container_path, name)
        }
    }

    pub fn alias_of(mut self, key: impl Into<String>) -> Self {
        self.alias_of = Some(key.into());
        self
    }

    pub fn path(&self) -> String {
        format!("{}.{}", self.container_path, self.name)
    }
}

/// Why a known path is handed out untimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    ClassLike,
    /// Another reference to the same callable is a constructible type.
    ClassLikeAlias,
}

#[derive(Debug, Clone)]
enum Target {
    Timed(Arc<ProfiledFunction>),
    Untimed(SkipReason),
}

pub struct Builder<'a> {
    root: String,
    config: Config,
    clock: Arc<dyn Clock>,
    exclude: Box<dyn Fn(&str) -> bool + 'a>,
}

impl<'a> Builder<'a> {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Predicate applied to a candidate's container path and full path before
    /// wrapping. Either matching excludes the candidate.
    pub fn exclude(mut self, predicate: impl Fn(&str) -> bool + 'a) -> Self {
        self.exclude = Box::new(predicate);
        self
    }

    pub fn instrument(
        self,
        candidates: impl IntoIterator<Item = Candidate>,
    ) -> Result<Instrumentor, Error> {
        let mut registry = ContainerRegistry::new(&self.root)?;
        let mut targets: BTreeMap<String, Target> = BTreeMap::new();
        let candidates: Vec<Candidate> = candidates.into_iter().collect();

        let excluded = |c: &Candidate, path: &str| {
            (self.exclude)(&c.container_path) || (self.exclude)(path)
        };

        // Excluded types never become candidates, so they cannot veto their
        // aliases.
        let class_like_aliases: HashSet<&str> = candidates
            .iter()
            .filter(|c| c.class_like && !excluded(c, &c.path()))
            .filter_map(|c| c.alias_of.as_deref())
            .collect();

        // Types first, shallowest first, so a type nested in another type
        // finds its parent already registered as a type.
        let mut types: Vec<&Candidate> = candidates.iter().filter(|c| c.class_like).collect();
        types.sort_by_key(|c| c.container_path.split('.').count());
        for candidate in types {
            let path = candidate.path();
            if excluded(candidate, &path) {
                tracing::debug!(path = %path, "excluded");
                targets
                    .entry(path)
                    .or_insert(Target::Untimed(SkipReason::Excluded));
                continue;
            }
            if targets.contains_key(&path) {
                return Err(Error::DuplicateContainer { path });
            }
            ensure_namespaces(&mut registry, &candidate.container_path)?;
            registry.register_container(
                &candidate.container_path,
                &candidate.name,
                ContainerKind::CallableAsContainer,
            )?;
            registry.register_container(
                &path,
                MEMBER_CONTAINER_NAME,
                ContainerKind::MemberContainer,
            )?;
            targets.insert(path, Target::Untimed(SkipReason::ClassLike));
        }

        for candidate in candidates.iter().filter(|c| !c.class_like) {
            let path = candidate.path();
            if excluded(candidate, &path) {
                tracing::debug!(path = %path, "excluded");
                targets
                    .entry(path)
                    .or_insert(Target::Untimed(SkipReason::Excluded));
                continue;
            }
            if targets.contains_key(&path) {
                return Err(Error::DuplicateFunction { path });
            }
            let aliased_type = candidate
                .alias_of
                .as_deref()
                .is_some_and(|key| class_like_aliases.contains(key));
            if aliased_type {
                tracing::debug!(path = %path, "alias of a constructible type, not timed");
                targets.insert(path, Target::Untimed(SkipReason::ClassLikeAlias));
                continue;
            }
            ensure_namespaces(&mut registry, &candidate.container_path)?;
            let function = registry.register_function(&candidate.container_path, &candidate.name)?;
            targets.insert(path, Target::Timed(function));
        }

        let timed = targets
            .values()
            .filter(|t| matches!(t, Target::Timed(_)))
            .count();
        tracing::info!(
            "instrumented {timed} functions in {} containers",
            registry.container_count()
        );

        Ok(Instrumentor {
            registry,
            targets,
            config: self.config,
            clock: self.clock,
            last_checkpoint: Mutex::new(None),
        })
    }
}

/// Create any namespace missing between the registry root and `path`.
///
/// Member containers only come into being with their type, so a missing
/// `instance` segment means the type itself was never declared.
fn ensure_namespaces(registry: &mut ContainerRegistry, path: &str) -> Result<(), Error> {
    let root = registry.root_path().to_owned();
    if path == root {
        return Ok(());
    }
    let rest = path
        .strip_prefix(&root)
        .and_then(|r| r.strip_prefix('.'))
        .ok_or_else(|| Error::MissingContainer {
            path: path.to_owned(),
        })?;

    let mut parent = root;
    for segment in rest.split('.') {
        let current = format!("{parent}.{segment}");
        if !registry.contains(&current) {
            if segment == MEMBER_CONTAINER_NAME {
                return Err(Error::MissingContainer { path: current });
            }
            registry.register_container(&parent, segment, ContainerKind::Namespace)?;
        }
        parent = current;
    }
    Ok(())
}

pub struct Instrumentor {
    registry: ContainerRegistry,
    targets: BTreeMap<String, Target>,
    config: Config,
    clock: Arc<dyn Clock>,
    last_checkpoint: Mutex<Option<Duration>>,
}

impl Instrumentor {
    /// Start configuring setup for a registry rooted at `root`. Defaults: no
    /// exclusions, `Config::default()`, a monotonic wall clock.
    pub fn builder<'a>(root: impl Into<String>) -> Builder<'a> {
        Builder {
            root: root.into(),
            config: Config::default(),
            clock: Arc::new(MonotonicClock::new()),
            exclude: Box::new(|_| false),
        }
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// A fresh call stack for the current thread or task.
    pub fn tracker(&self) -> CallStackTracker {
        CallStackTracker::new(Arc::clone(&self.clock), self.config)
    }

    pub fn function(&self, path: &str) -> Option<&Arc<ProfiledFunction>> {
        match self.targets.get(path) {
            Some(Target::Timed(f)) => Some(f),
            _ => None,
        }
    }

    /// Every timed function, ordered by path.
    pub fn functions(&self) -> Vec<Arc<ProfiledFunction>> {
        self.registry.functions()
    }

    /// Known paths that are handed out untimed, with the reason.
    pub fn skipped(&self) -> Vec<(&str, SkipReason)> {
        self.targets
            .iter()
            .filter_map(|(path, t)| match t {
                Target::Untimed(reason) => Some((path.as_str(), *reason)),
                Target::Timed(_) => None,
            })
            .collect()
    }

    /// Obtain the callable to use for `path`: timed if it was instrumented,
    /// the original itself if it was deliberately skipped.
    pub fn bind<F>(&self, path: &str, callable: F) -> Result<Instrumented<F>, Error> {
        match self.targets.get(path) {
            Some(Target::Timed(f)) => Ok(Instrumented::new(callable, Arc::clone(f))),
            Some(Target::Untimed(_)) => Ok(Instrumented::passthrough(callable)),
            None => Err(Error::UnknownTarget {
                path: path.to_owned(),
            }),
        }
    }

    /// Snapshot every function's counters at the current clock reading.
    /// Concurrent checkpoints are serialized. A reading older than the
    /// previous checkpoint fails before any function is stamped.
    pub fn checkpoint(&self) -> Result<Duration, Error> {
        let mut last = self.last_checkpoint.lock();
        let at = self.clock.now();
        if last.is_some_and(|prev| at < prev) {
            return Err(Error::CheckpointOutOfOrder {
                path: self.registry.root_path().to_owned(),
            });
        }
        for function in self.registry.functions() {
            function.checkpoint(at)?;
        }
        *last = Some(at);
        tracing::debug!(at = ?at, "checkpoint taken");
        Ok(at)
    }

    pub fn last_checkpoint_time(&self) -> Option<Duration> {
        *self.last_checkpoint.lock()
    }

    /// Sorted unique container paths that own at least one timed function.
    pub fn package_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .registry
            .functions()
            .iter()
            .map(|f| f.container_path().to_owned())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

impl std::fmt::Debug for Instrumentor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentor")
            .field("root", &self.registry.root_path())
            .field("targets", &self.targets.len())
            .field("config", &self.config)
            .finish()
    }
}
