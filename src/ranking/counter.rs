//! Four ways to bump a shared integer counter under concurrent requests.
//!
//! | strategy      | round trips            | lost updates | failure mode                 |
//! |---------------|------------------------|--------------|------------------------------|
//! | `Naive`       | read, then write       | yes          | silently drops increments    |
//! | `Atomic`      | one `col = col + 1`    | no           | none                         |
//! | `Pessimistic` | lock, read, write      | no           | writers queue on the row     |
//! | `Optimistic`  | read, compare-and-set  | no           | [`AppError::RetryExhausted`] |
//!
//! `Naive` exists to demonstrate the lost-update bug and must not be used for
//! counters that matter. The other three only differ in throughput.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::CounterStore;

/// A single denormalized counter column on a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterTarget {
    PostViews(i64),
    PostLikes(i64),
    PostComments(i64),
    CommentLikes(i64),
}

impl CounterTarget {
    pub fn row_id(&self) -> i64 {
        match *self {
            CounterTarget::PostViews(id)
            | CounterTarget::PostLikes(id)
            | CounterTarget::PostComments(id)
            | CounterTarget::CommentLikes(id) => id,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            CounterTarget::CommentLikes(_) => "comments",
            _ => "posts",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            CounterTarget::PostViews(_) => "view_count",
            CounterTarget::PostLikes(_) | CounterTarget::CommentLikes(_) => "like_count",
            CounterTarget::PostComments(_) => "comment_count",
        }
    }

    fn not_found(&self) -> AppError {
        match self {
            CounterTarget::CommentLikes(id) => {
                AppError::NotFound(format!("Comment not found. ID: {id}"))
            }
            _ => AppError::NotFound(format!("Post not found. ID: {}", self.row_id())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterStrategy {
    /// Read, add in memory, write back. Loses updates under contention.
    Naive,
    /// Single `SET col = col + 1` statement.
    #[default]
    Atomic,
    /// `SELECT ... FOR UPDATE`, then write, inside one transaction.
    Pessimistic,
    /// Compare-and-set against the value read, retried with backoff.
    Optimistic,
}

impl CounterStrategy {
    pub const ALL: [CounterStrategy; 4] = [
        CounterStrategy::Naive,
        CounterStrategy::Atomic,
        CounterStrategy::Pessimistic,
        CounterStrategy::Optimistic,
    ];

    /// False only for `Naive`.
    pub fn is_lossless(&self) -> bool {
        !matches!(self, CounterStrategy::Naive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterStrategy::Naive => "naive",
            CounterStrategy::Atomic => "atomic",
            CounterStrategy::Pessimistic => "pessimistic",
            CounterStrategy::Optimistic => "optimistic",
        }
    }
}

impl fmt::Display for CounterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CounterStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(format!("Unknown counter strategy: {s}")))
    }
}

/// Bounded retry schedule for the optimistic strategy.
///
/// After the `n`-th conflict the caller sleeps `base_delay + n * step_delay`.
/// Once `max_attempts` compare-and-set attempts have failed, the increment
/// fails with [`AppError::RetryExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub step_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
            step_delay: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        self.base_delay + self.step_delay * failed_attempts
    }
}

/// Adds one to `target` using `strategy`.
pub async fn increment<S: CounterStore + ?Sized>(
    store: &S,
    target: CounterTarget,
    strategy: CounterStrategy,
    policy: &RetryPolicy,
) -> Result<(), AppError> {
    match strategy {
        CounterStrategy::Naive => increment_naive(store, target).await,
        CounterStrategy::Atomic => {
            if !store.add_to_counter(target, 1).await? {
                return Err(target.not_found());
            }
            Ok(())
        }
        CounterStrategy::Pessimistic => {
            if !store.increment_counter_locked(target).await? {
                return Err(target.not_found());
            }
            Ok(())
        }
        CounterStrategy::Optimistic => increment_optimistic(store, target, policy).await,
    }
}

async fn increment_naive<S: CounterStore + ?Sized>(
    store: &S,
    target: CounterTarget,
) -> Result<(), AppError> {
    let current = store
        .read_counter(target)
        .await?
        .ok_or_else(|| target.not_found())?;
    // Anything that committed since the read is overwritten here.
    if !store.write_counter(target, current + 1).await? {
        return Err(target.not_found());
    }
    Ok(())
}

async fn increment_optimistic<S: CounterStore + ?Sized>(
    store: &S,
    target: CounterTarget,
    policy: &RetryPolicy,
) -> Result<(), AppError> {
    let mut failed = 0;
    loop {
        let current = store
            .read_counter(target)
            .await?
            .ok_or_else(|| target.not_found())?;

        if store
            .compare_and_set_counter(target, current, current + 1)
            .await?
        {
            return Ok(());
        }

        failed += 1;
        if failed >= policy.max_attempts {
            tracing::warn!(
                "Optimistic increment of {:?} gave up after {} attempts",
                target,
                failed
            );
            return Err(AppError::RetryExhausted(format!(
                "Counter update failed after {failed} attempts"
            )));
        }
        tracing::debug!("Optimistic conflict on {:?}, attempt {}", target, failed);
        tokio::time::sleep(policy.delay_after(failed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strategy_names() {
        assert_eq!("naive".parse::<CounterStrategy>().unwrap(), CounterStrategy::Naive);
        assert_eq!(" Atomic ".parse::<CounterStrategy>().unwrap(), CounterStrategy::Atomic);
        assert_eq!(
            "PESSIMISTIC".parse::<CounterStrategy>().unwrap(),
            CounterStrategy::Pessimistic
        );
        assert_eq!(
            "optimistic".parse::<CounterStrategy>().unwrap(),
            CounterStrategy::Optimistic
        );
        assert!("eventual".parse::<CounterStrategy>().is_err());
    }

    #[test]
    fn only_naive_is_lossy() {
        let lossy: Vec<_> = CounterStrategy::ALL
            .into_iter()
            .filter(|s| !s.is_lossless())
            .collect();
        assert_eq!(lossy, vec![CounterStrategy::Naive]);
    }

    #[test]
    fn default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(1), Duration::from_millis(70));
        assert_eq!(policy.delay_after(4), Duration::from_millis(130));
    }

    #[test]
    fn targets_map_to_columns() {
        assert_eq!(CounterTarget::PostViews(3).table(), "posts");
        assert_eq!(CounterTarget::PostViews(3).column(), "view_count");
        assert_eq!(CounterTarget::PostComments(3).column(), "comment_count");
        assert_eq!(CounterTarget::CommentLikes(8).table(), "comments");
        assert_eq!(CounterTarget::CommentLikes(8).row_id(), 8);
    }
}
