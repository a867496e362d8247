//! Workflow catalog — the named Step Definition Sets the registry can start.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::WorkflowError;
use crate::workflow::definition::WorkflowDefinition;
use crate::workflow::schema::WorkflowFile;

#[derive(Debug, Default)]
pub struct WorkflowCatalog {
    workflows: HashMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a workflow. Names must be unique within the catalog.
    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), WorkflowError> {
        definition.validate()?;
        if self.contains(&definition.name) {
            return Err(WorkflowError::Definition(format!(
                "workflow '{}' is already registered",
                definition.name
            )));
        }
        self.workflows
            .insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, definition: WorkflowDefinition) -> Result<Self, WorkflowError> {
        self.register(definition)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// Registered workflow names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.workflows.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Load a single workflow YAML file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<String, WorkflowError> {
        let path = path.as_ref();
        let definition = WorkflowFile::from_file(path)?
            .into_definition()
            .map_err(|e| match e {
                WorkflowError::Definition(msg) => {
                    WorkflowError::Definition(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?;
        let name = definition.name.clone();
        self.register(definition)?;
        tracing::info!("[WorkflowCatalog] Loaded workflow: {} ({})", name, path.display());
        Ok(name)
    }

    /// Load every `.yaml`/`.yml` file in `dir` (not recursive). Files are
    /// loaded in name order so duplicate errors are reproducible.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, WorkflowError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(WorkflowError::Definition(format!(
                "Workflow directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| {
            WorkflowError::Definition(format!(
                "Failed to read directory '{}': {}",
                dir.display(),
                e
            ))
        })? {
            let path = entry
                .map_err(|e| WorkflowError::Definition(format!("Directory entry error: {}", e)))?
                .path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if path.is_file() && matches!(ext, "yaml" | "yml") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }
        Ok(paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::StepDefinition;

    const ECHO: &str = r#"
name: "echo"
steps:
  - name: "say"
    agent: "builtin"
    action: "echo"
"#;

    #[test]
    fn test_register_and_lookup() {
        let catalog = WorkflowCatalog::new()
            .with(WorkflowDefinition::new("b", vec![StepDefinition::new("s", "x", "y")]))
            .unwrap()
            .with(WorkflowDefinition::new("a", vec![StepDefinition::new("s", "x", "y")]))
            .unwrap();
        assert_eq!(catalog.names(), vec!["a", "b"]);
        assert_eq!(catalog.get("a").unwrap().steps.len(), 1);
        assert!(catalog.get("c").is_none());
    }

    #[test]
    fn test_register_rejects_duplicates_and_invalid() {
        let mut catalog = WorkflowCatalog::new();
        catalog
            .register(WorkflowDefinition::new("a", vec![StepDefinition::new("s", "x", "y")]))
            .unwrap();
        assert!(catalog
            .register(WorkflowDefinition::new("a", vec![StepDefinition::new("t", "x", "y")]))
            .is_err());
        assert!(catalog.register(WorkflowDefinition::new("empty", vec![])).is_err());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_load_dir_picks_yaml_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("echo.yaml"), ECHO).unwrap();
        std::fs::write(
            dir.path().join("other.yml"),
            ECHO.replace("name: \"echo\"", "name: \"other\""),
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "# not a workflow").unwrap();

        let mut catalog = WorkflowCatalog::new();
        assert_eq!(catalog.load_dir(dir.path()).unwrap(), 2);
        assert_eq!(catalog.names(), vec!["echo", "other"]);
    }

    #[test]
    fn test_load_dir_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = WorkflowCatalog::new();
        assert!(catalog.load_dir(dir.path().join("missing")).is_err());

        std::fs::write(dir.path().join("a.yaml"), ECHO).unwrap();
        std::fs::write(dir.path().join("b.yaml"), ECHO).unwrap();
        let err = catalog.load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }
}
