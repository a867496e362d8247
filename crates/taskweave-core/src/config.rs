//! Runtime settings.
//!
//! ```yaml
//! ledger_path: /var/lib/taskweave/tasks.json
//! workflow_dirs:
//!   - ./workflows
//! ```
//!
//! Every field is optional; missing ones fall back to [`Settings::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::workflow::WorkflowCatalog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Where the task ledger is persisted.
    pub ledger_path: PathBuf,
    /// Directories scanned for workflow YAML files.
    pub workflow_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_path: default_data_dir().join("tasks.json"),
            workflow_dirs: vec![PathBuf::from("workflows")],
        }
    }
}

/// `<user data dir>/taskweave`, or `./.taskweave` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("taskweave"))
        .unwrap_or_else(|| PathBuf::from(".taskweave"))
}

/// `<user config dir>/taskweave/config.yaml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskweave").join("config.yaml"))
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| WorkflowError::Definition(format!("Failed to parse settings: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::Definition(format!(
                "Failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Load settings from `path` if given (it must exist), otherwise from the
    /// default config file when present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, WorkflowError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => {
                    tracing::debug!("Loading settings from {}", path.display());
                    Self::from_file(path)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Build a catalog from every configured workflow directory. Missing
    /// directories are skipped with a warning; invalid files are errors.
    pub fn build_catalog(&self) -> Result<WorkflowCatalog, WorkflowError> {
        let mut catalog = WorkflowCatalog::new();
        for dir in &self.workflow_dirs {
            if !dir.is_dir() {
                tracing::warn!("Workflow directory '{}' not found; skipping", dir.display());
                continue;
            }
            let count = catalog.load_dir(dir)?;
            tracing::debug!("Loaded {} workflow(s) from {}", count, dir.display());
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml("ledger_path: /tmp/ledger.json").unwrap();
        assert_eq!(settings.ledger_path, PathBuf::from("/tmp/ledger.json"));
        assert_eq!(settings.workflow_dirs, Settings::default().workflow_dirs);

        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
        assert!(Settings::from_yaml("workflow_dirs: 3").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "workflow_dirs: [\"a\", \"b\"]\n").unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(
            settings.workflow_dirs,
            vec![PathBuf::from("a"), PathBuf::from("b")]
        );
        assert!(Settings::load(Some(dir.path().join("missing.yaml").as_path())).is_err());
    }

    #[test]
    fn test_build_catalog_skips_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("echo.yaml"),
            "name: echo\nsteps:\n  - { name: say, agent: builtin, action: echo }\n",
        )
        .unwrap();

        let settings = Settings {
            ledger_path: dir.path().join("tasks.json"),
            workflow_dirs: vec![dir.path().join("nope"), dir.path().to_path_buf()],
        };
        let catalog = settings.build_catalog().unwrap();
        assert_eq!(catalog.names(), vec!["echo"]);
    }
}
