use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::error::{CitreeError, Result};
use crate::providers::de::string_or_list;

use super::schema::ConfigSchema;

const CONFIG_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

#[derive(Debug, Deserialize)]
struct ConfigEntry {
    #[serde(default)]
    job: Option<JobDefinition>,
}

/// A `job` entry of a configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub branches: Vec<String>,
    #[serde(default)]
    pub vars: IndexMap<String, serde_json::Value>,
}

fn invalid(path: &Path, reason: impl Into<String>) -> CitreeError {
    CitreeError::ConfigValidation {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Reads the job definitions of one file.
///
/// # Errors
///
/// Returns `ConfigValidation` when the file cannot be read as UTF-8 text, or
/// when any of its documents is not YAML or does not match the configuration
/// schema.
pub fn parse_file(path: &Path, schema: &ConfigSchema) -> Result<Vec<JobDefinition>> {
    let bytes = fs::read(path).map_err(|e| invalid(path, e.to_string()))?;
    let content = String::from_utf8(bytes).map_err(|e| invalid(path, e.to_string()))?;
    let mut definitions = Vec::new();

    for document in serde_yaml::Deserializer::from_str(&content) {
        let yaml = serde_yaml::Value::deserialize(document)
            .map_err(|e| invalid(path, e.to_string()))?;
        if yaml.is_null() {
            continue;
        }

        let document =
            serde_json::to_value(yaml).map_err(|e| invalid(path, e.to_string()))?;

        let violations = schema.violations(&document);
        if !violations.is_empty() {
            return Err(invalid(path, violations.join(", ")));
        }

        let entries: Vec<ConfigEntry> =
            serde_json::from_value(document).map_err(|e| invalid(path, e.to_string()))?;
        definitions.extend(entries.into_iter().filter_map(|entry| entry.job));
    }

    Ok(definitions)
}

/// Lists YAML files below `dir` in a stable order, skipping `.git`.
///
/// Symlinked directories are not descended into.
pub fn find_config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                if path.file_name().is_some_and(|name| name != ".git") {
                    pending.push(path);
                }
            } else if file_type.is_symlink() && path.is_dir() {
                debug!("Not following directory link {}", path.display());
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| CONFIG_EXTENSIONS.contains(&ext))
            {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Collects the job definitions of every valid file below `dir`; files that
/// fail validation are skipped.
pub fn load_definitions(dir: &Path, schema: &ConfigSchema) -> Result<Vec<JobDefinition>> {
    let mut definitions = Vec::new();

    for file in find_config_files(dir)? {
        match parse_file(&file, schema) {
            Ok(found) => {
                debug!("Found {} job definitions in {}", found.len(), file.display());
                definitions.extend(found);
            }
            Err(CitreeError::ConfigValidation { path, reason }) => {
                debug!("Skipping {path}: {reason}");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(definitions)
}
