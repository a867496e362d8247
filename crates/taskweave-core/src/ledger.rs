//! Task Ledger — the shared, atomically published record of every task.
//!
//! Readers only ever see whole `Task` values: a mutation is applied to a
//! private clone and the clone replaces the stored task in a single write
//! under the lock. After every published mutation the full collection is
//! written to the backing [`LedgerStore`] (if any).
//!
//! The in-memory ledger is authoritative. A failed write is logged and kept
//! as [`TaskLedger::persist_error`]; it never turns a published mutation
//! into an error, since readers already see the new state.
//!
//! Snapshots are taken while holding the writer lock, so a slower writer can
//! never overwrite the file with an older view of the ledger.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::WorkflowError;
use crate::models::Task;
use crate::store::LedgerStore;

#[derive(Default)]
struct LedgerState {
    /// Task ids in insertion order.
    order: Vec<String>,
    tasks: HashMap<String, Task>,
}

struct LedgerInner {
    state: RwLock<LedgerState>,
    store: Option<LedgerStore>,
    writer: tokio::sync::Mutex<()>,
    /// Error of the most recent write, cleared by the next successful one.
    persist_error: Mutex<Option<String>>,
}

/// Cheap-to-clone handle to the ledger.
#[derive(Clone)]
pub struct TaskLedger {
    inner: Arc<LedgerInner>,
}

impl TaskLedger {
    /// A ledger that lives only in memory (for testing and embedding).
    pub fn in_memory() -> Self {
        Self::with_state(LedgerState::default(), None)
    }

    /// Open the ledger backed by the JSON file at `path`, loading whatever
    /// was last persisted there. Restored tasks keep their recorded status.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WorkflowError> {
        let store = LedgerStore::new(path);
        let tasks = store.load()?;

        let mut state = LedgerState::default();
        for task in tasks {
            if state.tasks.contains_key(&task.id) {
                tracing::warn!(task_id = %task.id, "Duplicate task id in ledger file; keeping the last record");
            } else {
                state.order.push(task.id.clone());
            }
            state.tasks.insert(task.id.clone(), task);
        }

        tracing::info!(
            "Task ledger opened at: {} ({} task(s))",
            store.path().display(),
            state.order.len()
        );
        Ok(Self::with_state(state, Some(store)))
    }

    fn with_state(state: LedgerState, store: Option<LedgerStore>) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                state: RwLock::new(state),
                store,
                writer: tokio::sync::Mutex::new(()),
                persist_error: Mutex::new(None),
            }),
        }
    }

    /// Why the last write to the backing file failed, if it did.
    pub fn persist_error(&self) -> Option<String> {
        self.inner
            .persist_error
            .lock()
            .ok()
            .and_then(|error| error.clone())
    }

    /// Add a new task and persist.
    pub async fn insert(&self, task: Task) -> Result<(), WorkflowError> {
        {
            let mut state = self.write_state()?;
            if state.tasks.contains_key(&task.id) {
                return Err(WorkflowError::Ledger(format!(
                    "Task {} already exists",
                    task.id
                )));
            }
            state.order.push(task.id.clone());
            state.tasks.insert(task.id.clone(), task);
        }
        self.persist().await;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Task, WorkflowError> {
        self.read_state()?
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::TaskNotFound(id.to_string()))
    }

    /// Every task, in insertion order.
    pub fn history(&self) -> Result<Vec<Task>, WorkflowError> {
        let state = self.read_state()?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect())
    }

    /// `PENDING` and `RUNNING` tasks, in insertion order.
    pub fn active(&self) -> Result<Vec<Task>, WorkflowError> {
        let state = self.read_state()?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .filter(|task| task.status.is_active())
            .cloned()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.read_state().map(|s| s.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `mutate` to a copy of the task, publish the copy, then persist.
    pub async fn update<R>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Task) -> R,
    ) -> Result<R, WorkflowError> {
        self.try_update(id, |task| Ok(mutate(task))).await
    }

    /// Like [`update`](Self::update), but nothing is published or persisted
    /// when `mutate` returns an error.
    ///
    /// Errors come only from the lookup or from `mutate`; once the new state
    /// is published the call succeeds even if the write fails.
    pub async fn try_update<R>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Task) -> Result<R, WorkflowError>,
    ) -> Result<R, WorkflowError> {
        let out = {
            let mut state = self.write_state()?;
            let current = state
                .tasks
                .get(id)
                .ok_or_else(|| WorkflowError::TaskNotFound(id.to_string()))?;
            let mut next = current.clone();
            let out = mutate(&mut next)?;
            state.tasks.insert(id.to_string(), next);
            out
        };
        self.persist().await;
        Ok(out)
    }

    async fn persist(&self) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let _writer = self.inner.writer.lock().await;
        let result = match self.history() {
            Ok(snapshot) => store.save(snapshot).await,
            Err(e) => Err(e),
        };
        let error = match result {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Failed to persist task ledger: {}", e);
                Some(e.to_string())
            }
        };
        if let Ok(mut last) = self.inner.persist_error.lock() {
            *last = error;
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, WorkflowError> {
        self.inner
            .state
            .read()
            .map_err(|e| WorkflowError::Ledger(format!("Lock poisoned: {}", e)))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, WorkflowError> {
        self.inner
            .state
            .write()
            .map_err(|e| WorkflowError::Ledger(format!("Lock poisoned: {}", e)))
    }
}
