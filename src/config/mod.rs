use crate::util::common::{get_bool_from_env_or, get_env_or, load_dotenv};

pub mod rd;

/// Index-store / query-engine knobs.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub partial_match: bool,
    pub max_results: usize,
    pub key_prefix: String,
}

impl SearchConfig {
    pub fn from_env() -> Self {
        load_dotenv();

        let partial_match = get_bool_from_env_or("PARTIAL_MATCH", true).unwrap();
        let key_prefix = get_env_or("KEY_PREFIX", "".to_string()).unwrap();
        let max_results = get_env_or("MAX_RESULTS", 500).unwrap();

        Self {
            partial_match,
            max_results,
            key_prefix,
        }
    }
}

/// Task-manager / scheduler knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub timezone: String,
    pub max_concurrent: usize,
    pub shutdown_timeout_secs: u64,
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        load_dotenv();

        let timezone = get_env_or("SCHEDULER_TIMEZONE", "UTC".to_string()).unwrap();
        let max_concurrent = get_env_or("SCHEDULER_MAX_CONCURRENT", 0usize).unwrap();
        let shutdown_timeout_secs = get_env_or("SCHEDULER_SHUTDOWN_TIMEOUT_SECS", 30u64).unwrap();

        Self {
            timezone,
            max_concurrent,
            shutdown_timeout_secs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: String,

    pub search_config: SearchConfig,
    pub scheduler_config: SchedulerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv();

        let redis_url = get_env_or("REDIS_URL", "redis://127.0.0.1".to_string()).unwrap();

        AppConfig {
            redis_url,
            search_config: SearchConfig::from_env(),
            scheduler_config: SchedulerConfig::from_env(),
        }
    }
}
