// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::ranking::{CounterStrategy, RetryPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,

    /// Page size used both for listings without `size` and for the page
    /// number returned after a comment write.
    pub comment_page_size: i64,
    /// Deepest reply allowed; roots are depth 0.
    pub max_comment_depth: i32,

    /// Strategy used for the view count bump on post reads.
    pub view_count_strategy: CounterStrategy,
    pub retry_policy: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let defaults = RetryPolicy::default();
        let retry_policy = RetryPolicy {
            max_attempts: parse_or("OPTIMISTIC_MAX_ATTEMPTS", defaults.max_attempts),
            base_delay: Duration::from_millis(parse_or(
                "OPTIMISTIC_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            step_delay: Duration::from_millis(parse_or(
                "OPTIMISTIC_STEP_DELAY_MS",
                defaults.step_delay.as_millis() as u64,
            )),
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 3600),
            rust_log,
            bind_addr,
            comment_page_size: parse_or("COMMENT_PAGE_SIZE", 20),
            max_comment_depth: parse_or("MAX_COMMENT_DEPTH", 10),
            view_count_strategy: parse_or("VIEW_COUNT_STRATEGY", CounterStrategy::Atomic),
            retry_policy,
        }
    }

    /// Settings for tests and local runs that never touch the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            comment_page_size: 20,
            max_comment_depth: 10,
            view_count_strategy: CounterStrategy::Atomic,
            retry_policy: RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(1),
                step_delay: Duration::from_millis(1),
            },
        }
    }
}

/// Reads `key`, falling back to `default` when unset.
///
/// A value that is set but does not parse stops startup, the same as a missing
/// required variable: logging is not up yet, and silently running with the
/// default would hide the typo.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    parse_value(key, env::var(key).ok(), default).unwrap_or_else(|msg| panic!("{msg}"))
}

fn parse_value<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, String> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back() {
        // Keys that no test environment sets.
        assert_eq!(parse_or("GRPIFY_TEST_UNSET_KEY", 7_i64), 7);
        assert_eq!(
            parse_or("GRPIFY_TEST_UNSET_STRATEGY", CounterStrategy::Pessimistic),
            CounterStrategy::Pessimistic
        );
    }

    #[test]
    fn parse_value_accepts_set_values() {
        assert_eq!(parse_value("COMMENT_PAGE_SIZE", Some("50".to_string()), 20_i64), Ok(50));
        assert_eq!(
            parse_value("VIEW_COUNT_STRATEGY", Some("optimistic".to_string()), CounterStrategy::Atomic),
            Ok(CounterStrategy::Optimistic)
        );
    }

    #[test]
    fn misspelled_strategy_is_an_error() {
        let err = parse_value(
            "VIEW_COUNT_STRATEGY",
            Some("optimistc".to_string()),
            CounterStrategy::Atomic,
        )
        .unwrap_err();
        assert!(err.contains("VIEW_COUNT_STRATEGY"));
        assert!(err.contains("optimistc"));

        assert!(parse_value("COMMENT_PAGE_SIZE", Some("twenty".to_string()), 20_i64).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::for_tests("s");
        assert_eq!(config.comment_page_size, 20);
        assert_eq!(config.retry_policy.max_attempts, 5);
    }
}
