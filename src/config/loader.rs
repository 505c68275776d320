//! Settings file loading

use super::Settings;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CANDIDATES: &[&str] =
    &["deploy-merge.toml", ".deploy-merge.toml", "deploy-merge.yml", "deploy-merge.yaml"];

/// Load settings from `settings_path`, or from a file discovered in `dir`.
///
/// An explicit file that cannot be read or parsed is an error. A discovered
/// one only logs a warning and yields the defaults.
pub fn load_settings(dir: &Path, settings_path: Option<&Path>) -> Result<Settings> {
    let explicit = settings_path.is_some();

    let discovered = match settings_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_settings(dir),
    };

    let Some(settings_file) = discovered else {
        return Ok(Settings::default());
    };

    match read_settings(&settings_file) {
        Ok(settings) => {
            tracing::debug!("Loaded settings from {}", settings_file.display());
            Ok(settings)
        }
        Err(e) if !explicit => {
            tracing::warn!(
                "Failed to load auto-discovered settings {}: {:#}",
                settings_file.display(),
                e
            );
            Ok(Settings::default())
        }
        Err(e) => Err(e),
    }
}

fn read_settings(settings_file: &Path) -> Result<Settings> {
    let content = fs::read_to_string(settings_file)
        .with_context(|| format!("Failed reading settings file: {}", settings_file.display()))?;

    let ext =
        settings_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    match ext.as_str() {
        "toml" => parse_toml_settings(&content, settings_file),
        "yaml" | "yml" => parse_yaml_settings(&content, settings_file),
        other => anyhow::bail!(
            "Unsupported settings extension '.{}' for file {}",
            other,
            settings_file.display()
        ),
    }
}

/// Settings may sit at the top level or under a `[deploy-merge]` table.
fn parse_toml_settings(content: &str, settings_file: &Path) -> Result<Settings> {
    let raw: toml::Value = toml::from_str(content)
        .with_context(|| format!("Invalid TOML syntax: {}", settings_file.display()))?;

    let value = match raw.get("deploy-merge") {
        Some(nested) => nested.clone(),
        None => raw,
    };

    value.try_into().with_context(|| format!("Invalid TOML settings: {}", settings_file.display()))
}

fn parse_yaml_settings(content: &str, settings_file: &Path) -> Result<Settings> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid YAML syntax: {}", settings_file.display()))?;

    let value = match raw {
        serde_yaml::Value::Null => return Ok(Settings::default()),
        raw => match raw.get("deploy-merge") {
            Some(nested) => nested.clone(),
            None => raw,
        },
    };

    serde_yaml::from_value(value)
        .with_context(|| format!("Invalid YAML settings: {}", settings_file.display()))
}

fn discover_settings(dir: &Path) -> Option<PathBuf> {
    CANDIDATES.iter().map(|candidate| dir.join(candidate)).find(|path| path.is_file())
}
