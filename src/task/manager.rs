use crate::errors::{invalid_input, CoreResult};
use crate::scheduler::Schedule;
use crate::task::context::{ContextInjector, TaskContext, TaskFn};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Point-in-time metadata for a registered task, handed back by `get_task`
/// and `list_tasks` as an owned snapshot — mutating it has no effect on the
/// manager.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: String,
    pub schedule: String,
    pub enabled: bool,
    pub running: bool,
    pub allow_overlap: bool,
    pub added_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub error_count: u64,
    pub last_error: String,
}

#[derive(Debug, Clone, Default)]
pub struct TaskStats {
    pub total_tasks: usize,
    pub enabled_tasks: usize,
    pub running_tasks: usize,
    pub total_runs: u64,
    pub total_errors: u64,
    pub max_concurrency: usize,
}

/// Registration-time knobs beyond name/schedule/body.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// If `false` (the default) a firing that would overlap a still-running
    /// previous invocation is skipped and logged instead of run.
    pub allow_overlap: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            allow_overlap: false,
        }
    }
}

struct TaskEntry {
    schedule: Schedule,
    func: TaskFn,
    allow_overlap: bool,
    enabled: bool,
    running: bool,
    added_at: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
    run_count: u64,
    error_count: u64,
    last_error: String,
}

impl TaskEntry {
    fn to_info(&self, name: &str) -> TaskInfo {
        let next_run = if self.enabled {
            self.schedule
                .next_after(Utc::now().with_timezone(&self.schedule.timezone()))
                .map(|t| t.with_timezone(&Utc))
        } else {
            None
        };
        TaskInfo {
            name: name.to_string(),
            schedule: self.schedule.expression().to_string(),
            enabled: self.enabled,
            running: self.running,
            allow_overlap: self.allow_overlap,
            added_at: self.added_at,
            last_run: self.last_run,
            next_run,
            run_count: self.run_count,
            error_count: self.error_count,
            last_error: self.last_error.clone(),
        }
    }
}

/// A counting wait-group with a timed drain, used to give `stop` a bounded
/// grace period for in-flight task bodies instead of waiting forever.
struct WaitGroup {
    count: AtomicI64,
    notify: Notify,
}

impl WaitGroup {
    fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
            notify: Notify::new(),
        }
    }

    fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) <= 1 {
            self.notify.notify_waiters();
        }
    }

    /// Waits until the count drops to zero or `timeout` elapses. Returns
    /// `true` if it drained in time.
    async fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) <= 0 {
                return true;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let _ = tokio::time::timeout(remaining, notified).await;
        }
    }
}

struct Inner {
    tasks: RwLock<HashMap<String, TaskEntry>>,
    context_values: RwLock<HashMap<String, String>>,
    injector: RwLock<Option<ContextInjector>>,
    cancellation: CancellationToken,
    concurrency: Option<Arc<Semaphore>>,
    max_concurrency: usize,
    wait_group: WaitGroup,
    shutdown_timeout: Duration,
    wake: Notify,
    started: AtomicBool,
    stopped: AtomicBool,
    evaluator: Mutex<Option<JoinHandle<()>>>,
    tz: Tz,
}

impl Inner {
    fn build_context(&self, task_name: &str) -> TaskContext {
        let snapshot = self.context_values.read().unwrap().clone();
        let mut ctx = TaskContext::new(task_name, snapshot, self.cancellation.child_token());
        let injector = self.injector.read().unwrap().clone();
        if let Some(injector) = injector {
            ctx = (*injector)(ctx, task_name);
        }
        ctx
    }
}

/// Owns the registered task set, a background evaluator that sleeps until
/// the nearest next-fire time, and a worker pool bounded by an optional
/// concurrency semaphore.
///
/// Cheaply `Clone`-able: all state lives behind an `Arc`.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

/// Bounds how many task bodies may run at once. `Unlimited` matches the
/// manager's historical default of letting every firing run immediately.
#[derive(Debug, Clone, Copy)]
pub enum Concurrency {
    Unlimited,
    Limited(usize),
}

impl TaskManager {
    pub fn new(tz: Tz, concurrency: Concurrency) -> Self {
        let (semaphore, max_concurrency) = match concurrency {
            Concurrency::Unlimited => (None, usize::MAX),
            Concurrency::Limited(n) => (Some(Arc::new(Semaphore::new(n))), n),
        };
        Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(HashMap::new()),
                context_values: RwLock::new(HashMap::new()),
                injector: RwLock::new(None),
                cancellation: CancellationToken::new(),
                concurrency: semaphore,
                max_concurrency,
                wait_group: WaitGroup::new(),
                shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
                wake: Notify::new(),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                evaluator: Mutex::new(None),
                tz,
            }),
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_shutdown_timeout must be called before the manager is cloned")
            .shutdown_timeout = timeout;
        self
    }

    pub fn set_context_injector(&self, injector: ContextInjector) {
        *self.inner.injector.write().unwrap() = Some(injector);
    }

    pub fn set_context_value(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner
            .context_values
            .write()
            .unwrap()
            .insert(key.into(), value.into());
    }

    pub fn get_context_value(&self, key: &str) -> Option<String> {
        self.inner.context_values.read().unwrap().get(key).cloned()
    }

    pub fn add_task(&self, name: impl Into<String>, schedule_expr: &str, func: TaskFn) -> CoreResult<()> {
        self.add_task_with_options(name, schedule_expr, TaskOptions::default(), func)
    }

    pub fn add_task_with_options(
        &self,
        name: impl Into<String>,
        schedule_expr: &str,
        options: TaskOptions,
        func: TaskFn,
    ) -> CoreResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(invalid_input("task name must not be empty"));
        }
        let schedule = Schedule::parse(schedule_expr, self.inner.tz)?;

        let mut tasks = self.inner.tasks.write().unwrap();
        if tasks.contains_key(&name) {
            return Err(invalid_input(format!("task `{name}` is already registered")));
        }
        tasks.insert(
            name.clone(),
            TaskEntry {
                schedule,
                func,
                allow_overlap: options.allow_overlap,
                enabled: true,
                running: false,
                added_at: Utc::now(),
                last_run: None,
                run_count: 0,
                error_count: 0,
                last_error: String::new(),
            },
        );
        drop(tasks);
        self.inner.wake.notify_one();
        info!(task = %name, "task registered");
        Ok(())
    }

    pub fn remove_task(&self, name: &str) -> CoreResult<()> {
        let removed = self.inner.tasks.write().unwrap().remove(name).is_some();
        if !removed {
            return Err(invalid_input(format!("task `{name}` not found")));
        }
        self.inner.wake.notify_one();
        Ok(())
    }

    pub fn enable(&self, name: &str) -> CoreResult<()> {
        self.set_enabled(name, true)
    }

    pub fn disable(&self, name: &str) -> CoreResult<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> CoreResult<()> {
        let mut tasks = self.inner.tasks.write().unwrap();
        let entry = tasks
            .get_mut(name)
            .ok_or_else(|| invalid_input(format!("task `{name}` not found")))?;
        entry.enabled = enabled;
        drop(tasks);
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Fires the task immediately, subject to the same overlap check as a
    /// scheduled firing. Returns as soon as the run is kicked off; it does
    /// not wait for the task body to finish.
    pub fn run_task_now(&self, name: &str) -> CoreResult<()> {
        {
            let tasks = self.inner.tasks.read().unwrap();
            let entry = tasks
                .get(name)
                .ok_or_else(|| invalid_input(format!("task `{name}` not found")))?;
            if !entry.enabled {
                return Err(invalid_input(format!("task `{name}` is disabled")));
            }
            if !entry.allow_overlap && entry.running {
                return Err(invalid_input(format!("task `{name}` is already running")));
            }
        }
        let inner = self.inner.clone();
        let name = name.to_string();
        tokio::spawn(async move { fire(inner, name).await });
        Ok(())
    }

    pub fn get_task(&self, name: &str) -> Option<TaskInfo> {
        self.inner.tasks.read().unwrap().get(name).map(|e| e.to_info(name))
    }

    pub fn list_tasks(&self) -> Vec<TaskInfo> {
        self.inner
            .tasks
            .read()
            .unwrap()
            .iter()
            .map(|(name, e)| e.to_info(name))
            .collect()
    }

    pub fn get_stats(&self) -> TaskStats {
        let tasks = self.inner.tasks.read().unwrap();
        let mut stats = TaskStats {
            max_concurrency: self.inner.max_concurrency,
            ..Default::default()
        };
        for entry in tasks.values() {
            stats.total_tasks += 1;
            if entry.enabled {
                stats.enabled_tasks += 1;
            }
            if entry.running {
                stats.running_tasks += 1;
            }
            stats.total_runs += entry.run_count;
            stats.total_errors += entry.error_count;
        }
        stats
    }

    /// Spawns the evaluator. Idempotent: calling it twice is a no-op.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        let handle = tokio::spawn(run_evaluator(inner));
        *self.inner.evaluator.lock().unwrap() = Some(handle);
        info!("task manager started");
    }

    /// Cancels the evaluator and in-flight task contexts, then waits up to
    /// the configured shutdown timeout (default 30s) for running task
    /// bodies to finish on their own.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancellation.cancel();
        if let Some(handle) = self.inner.evaluator.lock().unwrap().take() {
            handle.abort();
        }
        let drained = self.inner.wait_group.wait_timeout(self.inner.shutdown_timeout).await;
        if drained {
            info!("task manager stopped: all in-flight tasks completed");
        } else {
            warn!(
                timeout = ?self.inner.shutdown_timeout,
                "task manager stopped: timed out waiting for in-flight tasks"
            );
        }
    }
}

/// RAII guard ensuring the running flag and wait-group are released on every
/// exit path out of `fire`, including a panic inside the task body.
struct RunningGuard {
    inner: Arc<Inner>,
    name: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.wait_group.done();
        if let Ok(mut tasks) = self.inner.tasks.write() {
            if let Some(entry) = tasks.get_mut(&self.name) {
                entry.running = false;
            }
        }
    }
}

/// The firing closure: enforces the overlap/concurrency/cancellation
/// invariants, runs the task body, and records the outcome.
async fn fire(inner: Arc<Inner>, name: String) {
    let func = {
        let mut tasks = inner.tasks.write().unwrap();
        let Some(entry) = tasks.get_mut(&name) else {
            return;
        };
        if !entry.enabled {
            return;
        }
        if !entry.allow_overlap && entry.running {
            warn!(task = %name, "skipped: previous run still in progress");
            return;
        }
        entry.running = true;
        entry.last_run = Some(Utc::now());
        entry.run_count += 1;
        entry.func.clone()
    };

    let _permit = if let Some(sem) = inner.concurrency.clone() {
        tokio::select! {
            biased;
            _ = inner.cancellation.cancelled() => {
                let mut tasks = inner.tasks.write().unwrap();
                if let Some(entry) = tasks.get_mut(&name) {
                    entry.running = false;
                }
                return;
            }
            permit = sem.acquire_owned() => {
                match permit {
                    Ok(p) => Some(p),
                    Err(_) => {
                        let mut tasks = inner.tasks.write().unwrap();
                        if let Some(entry) = tasks.get_mut(&name) {
                            entry.running = false;
                        }
                        return;
                    }
                }
            }
        }
    } else {
        None
    };

    inner.wait_group.add();
    let _guard = RunningGuard {
        inner: inner.clone(),
        name: name.clone(),
    };

    let ctx = inner.build_context(&name);
    let result = (*func)(ctx).await;

    let mut tasks = inner.tasks.write().unwrap();
    if let Some(entry) = tasks.get_mut(&name) {
        match result {
            Ok(()) => entry.last_error.clear(),
            Err(e) => {
                entry.error_count += 1;
                entry.last_error = e.to_string();
                error!(task = %name, error = %e, "task failed");
            }
        }
    }
}

/// Single background task: repeatedly computes the nearest next-fire time
/// across all enabled tasks, sleeps until then (or until woken by a
/// registration change, or cancelled), and hands firing off to a freshly
/// spawned future. Never runs a task body itself.
async fn run_evaluator(inner: Arc<Inner>) {
    loop {
        if inner.cancellation.is_cancelled() {
            return;
        }

        let next = {
            let tasks = inner.tasks.read().unwrap();
            tasks
                .iter()
                .filter(|(_, e)| e.enabled)
                .filter_map(|(name, e)| {
                    let tz = e.schedule.timezone();
                    e.schedule
                        .next_after(Utc::now().with_timezone(&tz))
                        .map(|t| (t.with_timezone(&Utc), name.clone()))
                })
                .min_by_key(|(t, _)| *t)
        };

        match next {
            None => {
                tokio::select! {
                    _ = inner.cancellation.cancelled() => return,
                    _ = inner.wake.notified() => continue,
                }
            }
            Some((fire_at, name)) => {
                let sleep_dur = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = inner.cancellation.cancelled() => return,
                    _ = inner.wake.notified() => continue,
                    _ = tokio::time::sleep(sleep_dur) => {
                        let inner2 = inner.clone();
                        tokio::spawn(async move { fire(inner2, name).await });
                    }
                }
            }
        }
    }
}
