//! Static manifest of instrumentation targets.
//!
//! The manifest stands in for runtime discovery: it lists every candidate
//! container/name pair up front, plus the settings the profiler runs with.
//!
//! ```toml
//! [settings]
//! root = "app"
//! exclude = ["app.internal", "debug_*"]
//!
//! [[target]]
//! container = "app.geometry"
//! name = "Point"
//! class_like = true
//!
//! [[target]]
//! container = "app.geometry.Point.instance"
//! name = "area"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tempo_runtime::{Candidate, Instrumentor};

use crate::error::Error;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetEntry {
    pub container: String,
    pub name: String,
    #[serde(default)]
    pub class_like: bool,
    #[serde(default)]
    pub alias_of: Option<String>,
}

impl TargetEntry {
    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            container_path: self.container.clone(),
            name: self.name.clone(),
            class_like: self.class_like,
            alias_of: self.alias_of.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub settings: Settings,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parse manifest text; `path` is only used in error messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, Error> {
        let manifest: Manifest =
            toml_edit::de::from_str(contents).map_err(|e| Error::ManifestParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        manifest.settings.validate()?;
        tracing::debug!(
            path = %path.display(),
            targets = manifest.targets.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.targets.iter().map(TargetEntry::to_candidate).collect()
    }

    /// Run instrumentation setup for every target, applying the manifest's
    /// exclusions and settings.
    pub fn instrument(&self) -> Result<Instrumentor, Error> {
        let exclude = self.settings.exclude_set();
        let inst = Instrumentor::builder(self.settings.root.as_str())
            .config(self.settings.runtime_config())
            .exclude(|path| exclude.is_excluded(path))
            .instrument(self.candidates())?;
        Ok(inst)
    }
}

/// Manifest path used when none is given on the command line.
pub fn default_path() -> PathBuf {
    match std::env::var_os("TEMPO_MANIFEST") {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from("tempo.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tempo_runtime::{ContainerKind, SkipReason};

    const SAMPLE: &str = r#"
[settings]
root = "app"
exclude = ["app.internal", "debug_*"]

[[target]]
container = "app.geometry.Point.instance"
name = "area"

[[target]]
container = "app.geometry"
name = "Point"
class_like = true

[[target]]
container = "app.geometry"
name = "distance"

[[target]]
container = "app.internal"
name = "cache_get"

[[target]]
container = "app"
name = "debug_dump"
"#;

    fn sample() -> Manifest {
        Manifest::parse(SAMPLE, Path::new("tempo.toml")).unwrap()
    }

    #[test]
    fn parses_targets_in_order() {
        let manifest = sample();
        assert_eq!(manifest.settings.root, "app");
        assert_eq!(manifest.targets.len(), 5);
        let point = &manifest.targets[1];
        assert!(point.class_like);
        assert_eq!(point.to_candidate().path(), "app.geometry.Point");
    }

    #[test]
    fn instrument_applies_exclusions_and_types() {
        let inst = sample().instrument().unwrap();
        let timed: Vec<_> = inst.functions().iter().map(|f| f.path().to_owned()).collect();
        assert_eq!(
            timed,
            vec!["app.geometry.Point.instance.area", "app.geometry.distance"]
        );
        assert_eq!(
            inst.registry().get("app.geometry.Point").unwrap().kind(),
            ContainerKind::CallableAsContainer
        );
        let skipped = inst.skipped();
        assert!(skipped.contains(&("app.internal.cache_get", SkipReason::Excluded)));
        assert!(skipped.contains(&("app.debug_dump", SkipReason::Excluded)));
        assert!(inst.registry().get("app.internal").is_none());
    }

    #[test]
    fn duplicate_target_fails_setup() {
        let text = format!("{SAMPLE}\n[[target]]\ncontainer = \"app.geometry\"\nname = \"distance\"\n");
        let manifest = Manifest::parse(&text, Path::new("tempo.toml")).unwrap();
        let err = manifest.instrument().unwrap_err();
        assert!(
            err.to_string().contains("app.geometry.distance"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = Manifest::parse("[[target]]\nname = 3\n", Path::new("bad.toml")).unwrap_err();
        assert!(
            matches!(&err, Error::ManifestParse { path, .. } if path.ends_with("bad.toml")),
            "{err}"
        );
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Manifest::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::ManifestRead { .. }), "{err}");
    }

    #[test]
    fn load_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tempo.toml");
        fs::write(&path, SAMPLE).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.candidates().len(), 5);
    }
}
