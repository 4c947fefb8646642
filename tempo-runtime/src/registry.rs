//! Hierarchical namespace of profiled entities.
//!
//! Containers are addressed by dot-delimited paths beneath a single root.
//! Children are only ever added. Adding the same container or function path
//! twice is a setup error, never a silent merge. Maps are ordered so reports
//! come out deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::Error;
use crate::function::ProfiledFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Namespace,
    /// A constructible type used as a container for its associated callables.
    CallableAsContainer,
    /// Instance-level callables of a `CallableAsContainer`.
    MemberContainer,
}

impl ContainerKind {
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            ContainerKind::CallableAsContainer | ContainerKind::MemberContainer
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ContainerKind::Namespace => "namespace",
            ContainerKind::CallableAsContainer => "type",
            ContainerKind::MemberContainer => "members",
        }
    }
}

/// Selects which direct children `child_containers` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildFilter {
    All,
    ClassLike,
}

#[derive(Debug)]
pub struct Container {
    path: String,
    kind: ContainerKind,
    children: BTreeSet<String>,
    functions: BTreeMap<String, Arc<ProfiledFunction>>,
}

impl Container {
    fn new(path: String, kind: ContainerKind) -> Self {
        Self {
            path,
            kind,
            children: BTreeSet::new(),
            functions: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Paths of the direct child containers.
    pub fn child_paths(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<ProfiledFunction>> {
        self.functions.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

#[derive(Debug)]
pub struct ContainerRegistry {
    root: String,
    containers: BTreeMap<String, Container>,
}

impl ContainerRegistry {
    /// Create a registry whose root namespace is `root` (which may itself be
    /// dotted, e.g. `my.app`).
    pub fn new(root: &str) -> Result<Self, Error> {
        if root.split('.').any(str::is_empty) {
            return Err(Error::InvalidPath {
                path: root.to_owned(),
            });
        }
        let mut containers = BTreeMap::new();
        containers.insert(
            root.to_owned(),
            Container::new(root.to_owned(), ContainerKind::Namespace),
        );
        Ok(Self {
            root: root.to_owned(),
            containers,
        })
    }

    pub fn root(&self) -> &Container {
        &self.containers[&self.root]
    }

    pub fn root_path(&self) -> &str {
        &self.root
    }

    pub fn get(&self, path: &str) -> Option<&Container> {
        self.containers.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.containers.contains_key(path)
    }

    /// Number of containers, including the root.
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn register_container(
        &mut self,
        parent_path: &str,
        name: &str,
        kind: ContainerKind,
    ) -> Result<&Container, Error> {
        let path = child_path(parent_path, name)?;
        let parent = self
            .containers
            .get_mut(parent_path)
            .ok_or_else(|| Error::MissingContainer {
                path: parent_path.to_owned(),
            })?;
        if !parent.children.insert(path.clone()) {
            return Err(Error::DuplicateContainer { path });
        }
        tracing::debug!(path = %path, kind = kind.label(), "registered container");
        Ok(self
            .containers
            .entry(path.clone())
            .or_insert_with(|| Container::new(path, kind)))
    }

    pub fn register_function(
        &mut self,
        container_path: &str,
        name: &str,
    ) -> Result<Arc<ProfiledFunction>, Error> {
        let path = child_path(container_path, name)?;
        let container = self
            .containers
            .get_mut(container_path)
            .ok_or_else(|| Error::MissingContainer {
                path: container_path.to_owned(),
            })?;
        if container.functions.contains_key(&path) {
            return Err(Error::DuplicateFunction { path });
        }
        let function = Arc::new(ProfiledFunction::new(container_path, name));
        container.functions.insert(path.clone(), Arc::clone(&function));
        tracing::debug!(path = %path, "registered function");
        Ok(function)
    }

    /// Look up a profiled function by its full path.
    pub fn function(&self, path: &str) -> Option<&Arc<ProfiledFunction>> {
        let (container, _) = path.rsplit_once('.')?;
        self.containers.get(container)?.functions.get(path)
    }

    /// Every profiled function, ordered by path.
    pub fn functions(&self) -> Vec<Arc<ProfiledFunction>> {
        let mut all: Vec<_> = self
            .containers
            .values()
            .flat_map(|c| c.functions.values().cloned())
            .collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all
    }

    /// Direct children of `path`; empty when `path` is unknown.
    pub fn child_containers(&self, path: &str, filter: ChildFilter) -> Vec<&Container> {
        let Some(container) = self.containers.get(path) else {
            return Vec::new();
        };
        container
            .children
            .iter()
            .filter_map(|child| self.containers.get(child))
            .filter(|child| match filter {
                ChildFilter::All => true,
                ChildFilter::ClassLike => child.kind.is_class_like(),
            })
            .collect()
    }

    pub fn child_functions(&self, path: &str) -> Vec<Arc<ProfiledFunction>> {
        self.containers
            .get(path)
            .map(|c| c.functions.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn child_function_count(&self, path: &str) -> usize {
        self.containers.get(path).map_or(0, Container::function_count)
    }

    /// Number of direct children that are constructible types.
    pub fn child_class_like_count(&self, path: &str) -> usize {
        self.child_containers(path, ChildFilter::ClassLike)
            .iter()
            .filter(|c| c.kind == ContainerKind::CallableAsContainer)
            .count()
    }
}

fn child_path(parent_path: &str, name: &str) -> Result<String, Error> {
    let path = format!("{parent_path}.{name}");
    if name.is_empty() || name.contains('.') {
        return Err(Error::InvalidPath { path });
    }
    Ok(path)
}
