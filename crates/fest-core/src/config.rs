use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::error::FestError;
use crate::root::{CONFIG_FILE, MARKER_DIR};

/// Per-root settings from `.festival/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Update `id_registry.json` on status moves.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Append to each festival's `status_history.json` on status moves.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

#[must_use]
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(MARKER_DIR).join(CONFIG_FILE)
}

pub fn load_project_config(root: &Path) -> Result<ProjectConfig> {
    let path = project_config_path(root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content).map_err(|e| {
        FestError::Config {
            path: path.clone(),
            message: e.message().to_string(),
        }
        .into()
    })
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("fest").join(CONFIG_FILE))
}

fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load project and user config and settle the output mode.
///
/// `root` is `None` outside a festivals root (e.g. before `fest init`).
pub fn resolve_config(root: Option<&Path>, cli_json: bool) -> Result<EffectiveConfig> {
    let project = match root {
        Some(root) => load_project_config(root)?,
        None => ProjectConfig::default(),
    };
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

/// `--json`, then `FORMAT`, then the user config, then TTY detection.
#[must_use]
pub fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_project_config_uses_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let cfg = load_project_config(tmp.path()).expect("load should succeed");
        assert!(cfg.registry.enabled);
        assert!(cfg.history.enabled);
    }

    #[test]
    fn project_config_can_disable_side_records() {
        let tmp = TempDir::new().expect("tempdir");
        let path = project_config_path(tmp.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "[history]\nenabled = false\n").expect("write");

        let cfg = load_project_config(tmp.path()).expect("load");
        assert!(!cfg.history.enabled);
        assert!(cfg.registry.enabled);
    }

    #[test]
    fn malformed_project_config_names_the_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = project_config_path(tmp.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "[registry\n").expect("write");

        let err = load_project_config(tmp.path()).expect_err("parse failure");
        assert!(err.to_string().contains("config.toml"));
        assert!(matches!(
            err.downcast_ref::<FestError>(),
            Some(FestError::Config { .. })
        ));
    }

    #[test]
    fn user_config_reads_output() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "output = \"json\"\n").expect("write");
        let cfg = load_user_config_from(&path).expect("load");
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_beats_user_config() {
        assert_eq!(resolve_output(false, Some("json"), Some("text")), "text");
        assert_eq!(resolve_output(false, Some("human"), Some("bogus")), "pretty");
    }
}
