//! Environment variable processing for runtime configuration overrides.
//!
//! Env var prefix: `SUITE_RUNNER_`
//!
//! - `SUITE_RUNNER_PROFILE` — select a configuration profile
//! - `SUITE_RUNNER_FILTER` — name filter expression
//! - `SUITE_RUNNER_REPEAT` — number of repetitions
//! - `SUITE_RUNNER_COLORS` — auto/always/never
//! - `SUITE_RUNNER_COLUMNS` — console width
//! - `SUITE_RUNNER_VERBOSE` — verbose console output (1/true/yes)
//! - `SUITE_RUNNER_STOP_ON_FAILURE` — stop at the first failure
//! - `SUITE_RUNNER_STOP_ON_ERROR` — stop at the first error
//! - `SUITE_RUNNER_ENFORCE_TIME_LIMIT` — enforce per-size time limits

use super::{ColorMode, Config};

const PREFIX: &str = "SUITE_RUNNER_";

const OVERRIDE_KEYS: [&str; 8] = [
    "FILTER",
    "REPEAT",
    "COLORS",
    "COLUMNS",
    "VERBOSE",
    "STOP_ON_FAILURE",
    "STOP_ON_ERROR",
    "ENFORCE_TIME_LIMIT",
];

/// Read the active profile name from `SUITE_RUNNER_PROFILE`.
pub fn get_profile_name() -> Option<String> {
    env_str("PROFILE")
}

/// Apply individual env var overrides to a config.
///
/// Each override is applied only if the env var is set and parses correctly.
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(val) = env_str("FILTER") {
        config.run.filter = Some(val);
    }

    match env_parse::<usize>("REPEAT") {
        Some(0) | None => {}
        Some(val) => config.run.repeat = val,
    }

    if let Some(val) = env_str("COLORS") {
        match val.parse::<ColorMode>() {
            Ok(mode) => config.console.colors = mode,
            Err(e) => tracing::warn!(target: "suite_runner::config", "ignoring {PREFIX}COLORS: {e}"),
        }
    }

    if let Some(val) = env_parse::<usize>("COLUMNS") {
        config.console.columns = val;
    }

    if let Some(val) = env_bool("VERBOSE") {
        config.console.verbose = val;
    }

    if let Some(val) = env_bool("STOP_ON_FAILURE") {
        config.stop_on.failure = val;
    }

    if let Some(val) = env_bool("STOP_ON_ERROR") {
        config.stop_on.error = val;
    }

    if let Some(val) = env_bool("ENFORCE_TIME_LIMIT") {
        config.timeouts.enforce = val;
    }
}

/// Summarize which env var overrides are currently active.
///
/// Returns a list of `(env_var_name, value)` pairs.
pub fn detect_active_overrides() -> Vec<(String, String)> {
    let mut active = Vec::new();
    for key in OVERRIDE_KEYS.iter().chain(std::iter::once(&"PROFILE")) {
        let full = format!("{PREFIX}{key}");
        if let Ok(val) = std::env::var(&full) {
            if !val.is_empty() {
                active.push((full, val));
            }
        }
    }
    active
}

// --- helpers ---

fn env_str(suffix: &str) -> Option<String> {
    std::env::var(format!("{PREFIX}{suffix}"))
        .ok()
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    env_str(suffix).and_then(|s| s.parse().ok())
}

fn env_bool(suffix: &str) -> Option<bool> {
    env_str(suffix).map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Env vars are process-global, so tests that read or mutate them serialize
/// on this lock.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
