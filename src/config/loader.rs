use super::Config;
use crate::core::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Key under `[package.metadata]` / `[workspace.metadata]`.
#[cfg(feature = "cargo-metadata")]
const METADATA_KEY: &str = "suite-runner";

/// Configuration loader that supports multiple sources.
///
/// Sources are merged as JSON values, so a later layer only overrides the keys
/// it actually sets.
pub struct ConfigLoader {
    /// Path to a standalone config file.
    config_file: Option<PathBuf>,
    /// Manifest whose metadata table is read.
    manifest_path: Option<PathBuf>,
    /// Whether to load from Cargo.toml metadata.
    use_cargo_metadata: bool,
}

impl ConfigLoader {
    /// Create a loader that reads nothing but defaults and the environment.
    pub fn new() -> Self {
        Self {
            config_file: None,
            manifest_path: None,
            use_cargo_metadata: false,
        }
    }

    /// Set a standalone configuration file path.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Also read `[package.metadata.suite-runner]` from Cargo.toml.
    pub fn cargo_metadata(mut self) -> Self {
        self.use_cargo_metadata = true;
        self
    }

    /// Read metadata from this Cargo.toml instead of the current package.
    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self.use_cargo_metadata = true;
        self
    }

    /// Load configuration from all enabled sources.
    ///
    /// Priority (later sources override earlier):
    /// 1. Default values
    /// 2. Cargo.toml metadata (workspace then package)
    /// 3. Standalone TOML file
    /// 4. Profile overlay (`SUITE_RUNNER_PROFILE`)
    /// 5. Individual env var overrides (`SUITE_RUNNER_*`)
    pub fn load(self) -> Result<Config> {
        let mut merged = serde_json::to_value(Config::default())?;
        let mut profiles: HashMap<String, serde_json::Value> = HashMap::new();

        if self.use_cargo_metadata {
            for layer in self.load_cargo_metadata()? {
                extract_profiles(&layer, &mut profiles);
                deep_merge(&mut merged, &strip_profiles(layer));
            }
        }

        if let Some(ref config_path) = self.config_file {
            let layer = load_toml_file(config_path)?;
            extract_profiles(&layer, &mut profiles);
            deep_merge(&mut merged, &strip_profiles(layer));
        }

        let mut config: Config = serde_json::from_value(merged.clone())
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;

        // Apply profile overlay if SUITE_RUNNER_PROFILE is set
        if let Some(profile_name) = super::env::get_profile_name() {
            let profile_value = profiles.get(&profile_name).ok_or_else(|| {
                let mut available: Vec<&str> = profiles.keys().map(String::as_str).collect();
                available.sort_unstable();
                if available.is_empty() {
                    Error::config(format!(
                        "profile '{}' not found (no profiles defined)",
                        profile_name,
                    ))
                } else {
                    Error::config(format!(
                        "profile '{}' not found. Available profiles: {}",
                        profile_name,
                        available.join(", "),
                    ))
                }
            })?;

            tracing::debug!(target: "suite_runner::config", profile = %profile_name, "applying profile");
            deep_merge(&mut merged, profile_value);
            config = serde_json::from_value(merged).map_err(|e| {
                Error::config(format!("failed to apply profile '{}': {}", profile_name, e))
            })?;
        }

        // Apply individual env var overrides (highest priority)
        super::env::apply_env_overrides(&mut config);
        for (key, value) in super::env::detect_active_overrides() {
            tracing::debug!(target: "suite_runner::config", %key, %value, "env override");
        }

        Ok(config)
    }

    /// Metadata layers from Cargo.toml, workspace first, then package.
    #[cfg(feature = "cargo-metadata")]
    fn load_cargo_metadata(&self) -> Result<Vec<serde_json::Value>> {
        use cargo_metadata::MetadataCommand;

        let mut cmd = MetadataCommand::new();
        cmd.no_deps();
        if let Some(ref manifest_path) = self.manifest_path {
            cmd.manifest_path(manifest_path);
        } else if let Ok(manifest_path) = std::env::var("CARGO_MANIFEST_PATH") {
            cmd.manifest_path(manifest_path);
        }

        let metadata = cmd.exec()?;
        let mut layers = Vec::new();

        // [workspace.metadata.suite-runner]
        if let Some(ws_value) = metadata.workspace_metadata.get(METADATA_KEY) {
            layers.push(ws_value.clone());
        }

        let pkg_name = std::env::var("CARGO_PKG_NAME").ok();
        let package = match pkg_name {
            Some(ref pkg_name) => metadata
                .packages
                .iter()
                .find(|p| &p.name == pkg_name)
                .or_else(|| metadata.root_package()),
            None => metadata.root_package(),
        };

        // [package.metadata.suite-runner]
        if let Some(value) = package.and_then(|p| p.metadata.get(METADATA_KEY)) {
            layers.push(value.clone());
        }

        Ok(layers)
    }

    #[cfg(not(feature = "cargo-metadata"))]
    fn load_cargo_metadata(&self) -> Result<Vec<serde_json::Value>> {
        let _ = &self.manifest_path;
        Err(Error::feature_not_enabled("cargo-metadata"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a standalone TOML file as a JSON value.
fn load_toml_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read config file: {}", e)))?;
    let value: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("failed to parse TOML config: {}", e)))?;
    Ok(serde_json::to_value(value)?)
}

/// Extract profile definitions from a metadata JSON value.
///
/// Profiles live at `value["profiles"]` as `{ name: { ...config fields... } }`.
/// Later sources override earlier profiles with the same name.
fn extract_profiles(
    value: &serde_json::Value,
    profiles: &mut HashMap<String, serde_json::Value>,
) {
    if let Some(serde_json::Value::Object(map)) = value.get("profiles") {
        for (name, profile_value) in map {
            profiles.insert(name.clone(), profile_value.clone());
        }
    }
}

fn strip_profiles(mut value: serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::Object(ref mut map) = value {
        map.remove("profiles");
    }
    value
}

/// Recursively deep-merge `overlay` into `base`.
///
/// - Objects: keys are merged recursively (overlay keys win for conflicts).
/// - Scalars and arrays: overlay replaces base entirely.
pub(crate) fn deep_merge(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let entry = base_map
                    .entry(key.clone())
                    .or_insert(serde_json::Value::Null);
                deep_merge(entry, overlay_val);
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorMode;

    /// Load while holding the env lock so env override tests cannot interfere.
    fn load(loader: ConfigLoader) -> Result<Config> {
        let _guard = crate::config::env::ENV_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        loader.load()
    }

    #[test]
    fn test_load_defaults_only() {
        let config = load(ConfigLoader::new()).unwrap();
        assert_eq!(config.run.repeat, 1);
        assert_eq!(config.console.columns, 80);
    }

    #[test]
    fn test_load_standalone_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("suite-runner.toml");
        std::fs::write(
            &config_path,
            r#"
[run]
repeat = 2
groups = ["fast"]

[stop-on]
failure = true

[console]
colors = "never"
"#,
        )
        .unwrap();

        let config = load(ConfigLoader::new().config_file(&config_path)).unwrap();

        assert_eq!(config.run.repeat, 2);
        assert_eq!(config.run.groups, vec!["fast".to_string()]);
        assert!(config.stop_on.failure);
        assert_eq!(config.console.colors, ColorMode::Never);
        // Untouched keys in a touched section keep their defaults
        assert_eq!(config.console.columns, 80);
        assert_eq!(config.timeouts.large, 60);
    }

    #[test]
    fn test_missing_config_file_error() {
        let result = load(ConfigLoader::new().config_file("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bad.toml");
        std::fs::write(&config_path, "this is not valid { toml [[[").unwrap();

        let result = load(ConfigLoader::new().config_file(&config_path));
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_type_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("typed.toml");
        std::fs::write(&config_path, "[run]\nrepeat = \"many\"\n").unwrap();

        let err = load(ConfigLoader::new().config_file(&config_path)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_deep_merge_objects() {
        let mut base = serde_json::json!({
            "run": { "repeat": 1 },
            "timeouts": { "small": 1, "medium": 10 }
        });
        let overlay = serde_json::json!({
            "timeouts": { "medium": 30 }
        });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["timeouts"]["medium"], 30);
        assert_eq!(base["timeouts"]["small"], 1);
        assert_eq!(base["run"]["repeat"], 1);
    }

    #[test]
    fn test_deep_merge_array_replaces() {
        let mut base = serde_json::json!({ "run": { "groups": ["a", "b"] } });
        let overlay = serde_json::json!({ "run": { "groups": ["c"] } });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["run"]["groups"], serde_json::json!(["c"]));
    }

    #[test]
    fn test_extract_and_strip_profiles() {
        let value = serde_json::json!({
            "run": { "repeat": 1 },
            "profiles": {
                "ci": { "console": { "colors": "never" } },
                "soak": { "run": { "repeat": 50 } }
            }
        });
        let mut profiles = HashMap::new();
        extract_profiles(&value, &mut profiles);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["soak"]["run"]["repeat"], 50);

        let stripped = strip_profiles(value);
        assert!(stripped.get("profiles").is_none());
        assert_eq!(stripped["run"]["repeat"], 1);
    }

    #[test]
    fn test_extract_profiles_none() {
        let value = serde_json::json!({ "run": { "repeat": 1 } });
        let mut profiles = HashMap::new();
        extract_profiles(&value, &mut profiles);
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_profile_application_via_deep_merge() {
        let mut base_value = serde_json::to_value(Config::default()).unwrap();
        let profile = serde_json::json!({
            "stop-on": { "error": true },
            "timeouts": { "enforce": true }
        });
        deep_merge(&mut base_value, &profile);

        let result: Config = serde_json::from_value(base_value).unwrap();
        assert!(result.stop_on.error);
        assert!(result.timeouts.enforce);
        assert_eq!(result.timeouts.small, 1);
    }
}
