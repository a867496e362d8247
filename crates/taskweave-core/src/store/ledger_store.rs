//! JSON snapshot file holding the full array of task records.
//!
//! The file is overwritten on every save, never appended to. Writes go
//! through `tokio::task::spawn_blocking` so the async runtime is not
//! blocked by `fsync`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::WorkflowError;
use crate::models::Task;
use crate::store::fs_atomic::atomic_write_file;

#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last persisted snapshot. A missing file is an empty ledger.
    pub fn load(&self) -> Result<Vec<Task>, WorkflowError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(WorkflowError::Ledger(format!(
                    "Failed to read ledger '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            WorkflowError::Ledger(format!(
                "Failed to parse ledger '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Overwrite the file with `tasks`.
    pub async fn save(&self, tasks: Vec<Task>) -> Result<(), WorkflowError> {
        let json = serde_json::to_vec_pretty(&tasks)
            .map_err(|e| WorkflowError::Ledger(format!("Failed to serialize ledger: {}", e)))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write_file(&path, &json))
            .await
            .map_err(|e| WorkflowError::Ledger(format!("Ledger writer panicked: {}", e)))?
            .map_err(|e| {
                WorkflowError::Ledger(format!(
                    "Failed to write ledger '{}': {}",
                    self.path.display(),
                    e
                ))
            })
    }
}
