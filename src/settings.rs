//! Tool settings, read from the `[settings]` table of a manifest.

use serde::{Deserialize, Deserializer};
use tempo_runtime::{Config, TimeUnit};

use crate::error::Error;
use crate::exclude::ExcludeSet;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Root namespace every target must live beneath.
    pub root: String,
    #[serde(default)]
    pub real_time_logging: bool,
    #[serde(default, deserialize_with = "time_unit")]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.root.split('.').any(|s| s.trim().is_empty()) {
            return Err(Error::InvalidSetting {
                name: "root",
                reason: format!("`{}` is not a dotted path", self.root),
            });
        }
        Ok(())
    }

    /// Runtime config from these settings, overlaid with `TEMPO_*` env vars.
    pub fn runtime_config(&self) -> Config {
        Config {
            real_time_logging: self.real_time_logging,
            time_unit: self.time_unit,
        }
        .with_env_overrides()
    }

    pub fn exclude_set(&self) -> ExcludeSet {
        ExcludeSet::new(self.exclude.iter().cloned())
    }
}

fn time_unit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeUnit, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_optional_fields() {
        let settings: Settings = toml_edit::de::from_str(r#"root = "app""#).unwrap();
        assert_eq!(settings.root, "app");
        assert!(!settings.real_time_logging);
        assert_eq!(settings.time_unit, TimeUnit::Millis);
        assert!(settings.exclude_set().is_empty());
        settings.validate().unwrap();
    }

    #[test]
    fn time_unit_is_parsed() {
        let settings: Settings =
            toml_edit::de::from_str("root = \"app\"\ntime_unit = \"us\"\n").unwrap();
        assert_eq!(settings.time_unit, TimeUnit::Micros);

        let err = toml_edit::de::from_str::<Settings>("root = \"app\"\ntime_unit = \"weeks\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("weeks"), "unexpected error: {err}");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err =
            toml_edit::de::from_str::<Settings>("root = \"app\"\nrealtime = true\n").unwrap_err();
        assert!(err.to_string().contains("realtime"), "unexpected error: {err}");
    }

    #[test]
    fn bad_root_fails_validation() {
        let settings: Settings = toml_edit::de::from_str(r#"root = "app..x""#).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("root"), "unexpected error: {err}");
    }
}
