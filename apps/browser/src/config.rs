use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "browser.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fixture_path: PathBuf,
    pub log_filter: String,
    pub latency_ms: u64,
    pub event_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fixture_path: PathBuf::from("apps/browser/fixtures/demo.json"),
            log_filter: "resource_tree=info,browser=info".into(),
            latency_ms: 400,
            event_capacity: 1024,
        }
    }
}

/// Defaults, then `path` if it exists, then `APP__*` environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };
    Ok(apply_env_overrides(settings, |key| std::env::var(key).ok()))
}

pub fn apply_env_overrides(
    mut settings: Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    if let Some(v) = lookup("APP__FIXTURE_PATH") {
        settings.fixture_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = lookup("APP__LATENCY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.latency_ms = parsed;
        }
    }
    if let Some(v) = lookup("APP__EVENT_CAPACITY") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.event_capacity = parsed;
        }
    }
    settings
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = env::temp_dir().join("browser_settings_that_do_not_exist.toml");
        let settings = load_settings(&path).expect("settings");
        assert_eq!(settings.latency_ms, Settings::default().latency_ms);
    }

    #[test]
    fn file_values_override_defaults() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("browser_settings_{suffix}.toml"));
        fs::write(&path, "fixture_path = \"/tmp/tree.json\"\nlatency_ms = 5\n").expect("write");

        let settings = load_settings(&path).expect("settings");
        assert_eq!(settings.fixture_path, PathBuf::from("/tmp/tree.json"));
        assert_eq!(settings.latency_ms, 5);
        assert_eq!(settings.event_capacity, 1024);

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn malformed_file_is_reported() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("browser_settings_bad_{suffix}.toml"));
        fs::write(&path, "latency_ms = \"soon\"\n").expect("write");

        let err = load_settings(&path).expect_err("bad type");
        assert!(err.to_string().contains("failed to parse settings file"));

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn env_overrides_apply_and_bad_numbers_are_ignored() {
        let vars = HashMap::from([
            ("APP__LOG_FILTER", "debug"),
            ("APP__LATENCY_MS", "not-a-number"),
            ("APP__EVENT_CAPACITY", "16"),
        ]);
        let settings = apply_env_overrides(Settings::default(), |key| {
            vars.get(key).map(|v| v.to_string())
        });
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.latency_ms, Settings::default().latency_ms);
        assert_eq!(settings.event_capacity, 16);
    }
}
