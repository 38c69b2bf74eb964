pub mod context;
pub mod manager;

pub use context::{ContextInjector, TaskContext, TaskFn, TaskFuture, TaskResult};
pub use manager::{Concurrency, TaskInfo, TaskManager, TaskOptions, TaskStats};
