use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// The Pipe trait provides a method to pipe a value through a transformation.
///
/// This trait allows for a more functional programming style by enabling
/// method chaining and easy value transformation.
///
/// # Examples
///
/// ```rust
/// use pebble_core::util::common::Pipe;
/// let result = 5.pipe(|x| x * 2);  // result is 10
/// let string = "hello".pipe(|s| s.to_uppercase());  // string is "HELLO"
/// ```
pub trait Pipe {
    /// Transforms the current value by applying the given function.
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
        Self: Sized;
}

impl<T> Pipe for T {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
        Self: Sized,
    {
        f(self)
    }
}

// A static variable to ensure that environment variables are loaded only once.
static LOAD_ENV: OnceLock<()> = OnceLock::new();

/// Loads environment variables from `.env` and environment-specific files.
///
/// This function initializes environment variables by loading them from `.env` files.
/// It follows a specific order of precedence:
/// 1. Loads the default `.env` file.
/// 2. Loads an environment-specific file (`.env.dev` for debug mode or `.env.prod` for production mode).
/// 3. Loads a local override file (`.env.local`) if it exists.
pub fn load_dotenv() {
    LOAD_ENV.get_or_init(|| {
        dotenv().ok();

        let debug = cfg!(debug_assertions);
        let env_file = if debug { ".env.dev" } else { ".env.prod" };

        if Path::new(env_file).exists() {
            dotenvy::from_filename(env_file).ok();
        }

        if Path::new(".env.local").exists() {
            dotenvy::from_filename(".env.local").ok();
        }
    });
}

/// Retrieves a value from an environment variable and parses it into type `T`.
/// If the variable is not set, returns `default`. If parsing fails, returns an error.
pub fn get_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Debug,
{
    match env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|_| anyhow!(format!("Failed to parse {} env var", key))),
        Err(_) => Ok(default),
    }
}

/// Retrieves a `bool` from an environment variable.
/// Recognizes `"true"`, `"1"`, `"yes"`, `"on"` as `true`; `"false"`, `"0"`, `"no"`, `"off"` as `false`.
/// If the variable is not set, returns `default`. If parsing fails, returns an error.
pub fn get_bool_from_env_or(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(value) => {
            let value = value.to_lowercase();
            match value.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(anyhow!(format!("Failed to parse {} env var as `bool`", key))),
            }
        }
        Err(_) => Ok(default),
    }
}

/// Counts occurrences of each item in an ordered sequence, preserving nothing
/// but the tally — used to turn an analyzed token stream into a
/// `TermFrequency` map.
pub fn count_frequencies<T>(items: &[T]) -> HashMap<T, usize>
where
    T: Eq + Hash + Clone,
{
    let mut counts = HashMap::with_capacity(items.len());
    for item in items {
        *counts.entry(item.clone()).or_insert(0) += 1;
    }
    counts
}

/// Measures and logs the execution time of a code block.
///
/// Supports both synchronous and asynchronous code. Logs the elapsed time using `info!`.
///
/// # Usage
/// - Sync: `timeit!("Task", { /* code */ })`
/// - Async: `timeit!("Task", async { /* code */ }, async)`
#[macro_export]
macro_rules! timeit {
    ($expr:expr) => {
        timeit!("Time elapsed", $expr)
    };

    ($expr:expr, async) => {
        timeit!("Time elapsed", $expr, async)
    };

    ($prefix:expr, $expr:expr) => {{
        let start = std::time::Instant::now();
        let result = $expr;
        let duration = start.elapsed();
        tracing::info!("{}: {:?}", $prefix, duration);
        result
    }};

    ($prefix:expr, $expr:expr, async) => {{
        let start = std::time::Instant::now();
        let result = $expr.await;
        let duration = start.elapsed();
        tracing::info!("{}: {:?}", $prefix, duration);
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_frequencies() {
        let tokens = vec!["rust", "is", "fun", "rust", "rust"];
        let freq = count_frequencies(&tokens);
        assert_eq!(freq.get("rust"), Some(&3));
        assert_eq!(freq.get("is"), Some(&1));
        assert_eq!(freq.get("fun"), Some(&1));
    }

    #[test]
    fn test_count_frequencies_empty() {
        let tokens: Vec<&str> = vec![];
        assert!(count_frequencies(&tokens).is_empty());
    }
}
