use crate::config::rd::RD;
use crate::config::AppConfig;
use crate::errors::CoreResult;
use crate::service::search_service::FullTextSearch;
use crate::task::{Concurrency, TaskManager};
use chrono_tz::Tz;
use jieba_rs::Jieba;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod scheduler;
pub mod service;
pub mod task;
pub mod util;

#[cfg(test)]
mod tests;

/// Wires the index store and the task manager onto a shared Redis pool —
/// the composition root an embedding application constructs once at
/// startup and holds for the process lifetime.
#[derive(Clone)]
pub struct Engine {
    pub rd: Arc<RD>,
    pub search: Arc<FullTextSearch>,
    pub tasks: TaskManager,
    partial_match: bool,
    max_results: usize,
}

impl Engine {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let rd = Arc::new(RD::new(&config.redis_url).await?);

        let search = Arc::new(FullTextSearch::new(
            rd.clone(),
            Arc::new(Jieba::new()),
            config.search_config.key_prefix.clone(),
        ));

        let tz = Tz::from_str(&config.scheduler_config.timezone).unwrap_or(Tz::UTC);
        let concurrency = if config.scheduler_config.max_concurrent == 0 {
            Concurrency::Unlimited
        } else {
            Concurrency::Limited(config.scheduler_config.max_concurrent)
        };
        let tasks = TaskManager::new(tz, concurrency)
            .with_shutdown_timeout(Duration::from_secs(config.scheduler_config.shutdown_timeout_secs));

        Ok(Self {
            rd,
            search,
            tasks,
            partial_match: config.search_config.partial_match,
            max_results: config.search_config.max_results,
        })
    }

    /// Searches using the partial-match/max-results knobs from the engine's
    /// configuration, so callers don't have to thread them through manually.
    pub async fn search(&self, query: &str) -> CoreResult<(Vec<String>, Vec<(i64, f64)>)> {
        self.search.search(query, self.partial_match, self.max_results).await
    }

    /// Starts the scheduler's background evaluator. Idempotent.
    pub fn start(&self) {
        self.tasks.start();
    }

    /// Cancels in-flight task contexts and waits (bounded by the configured
    /// shutdown timeout) for running task bodies to finish.
    pub async fn stop(&self) {
        self.tasks.stop().await;
    }
}
