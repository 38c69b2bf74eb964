use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a scheduled task returns: `Ok(())` on success, any error otherwise.
/// The manager never propagates this to the caller — it is recorded on the
/// task's stats (see `TaskInfo::last_error`) and logged.
pub type TaskResult = anyhow::Result<()>;
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

/// A scheduled task body. Takes ownership of its `TaskContext` so it can be
/// moved into the spawned future.
pub type TaskFn = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// Invoked once per firing, outside any internal lock, to let the embedding
/// application stamp request-scoped values onto the context before the task
/// body runs (e.g. a trace id, a tenant id).
pub type ContextInjector = Arc<dyn Fn(TaskContext, &str) -> TaskContext + Send + Sync>;

/// The value a running task sees: its own name, a snapshot of the manager's
/// static context values, and a cancellation signal derived from the
/// manager's root context.
///
/// The static values are a snapshot taken at firing time, not a live view —
/// a task that runs for an hour sees the values as they were when it
/// started, not as they are updated mid-run.
#[derive(Clone)]
pub struct TaskContext {
    name: String,
    values: HashMap<String, String>,
    cancellation: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        name: impl Into<String>,
        values: HashMap<String, String>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            values,
            cancellation,
        }
    }

    /// The name the task was registered under.
    pub fn task_name(&self) -> &str {
        &self.name
    }

    /// A static value set via `TaskManager::set_context_value`, as it stood
    /// when this invocation fired.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Stamps or overwrites a value on this invocation only — does not
    /// affect the manager's shared values or other invocations.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Resolves when the manager is stopped or this task's run is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
