//! Re-attempt a fallible operation under a stop policy with exponential
//! backoff between attempts.

use std::fmt;
use std::time::Duration;

use tokio::time;

/// When to stop retrying and how long to wait in between.
#[derive(Debug, Clone)]
pub struct Policy {
    pub max_attempts: u32,
    pub min: Duration,
    pub max: Duration,
    pub factor: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            min: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 1.5,
        }
    }
}

/// How an attempt failed, from the retry loop's point of view.
#[derive(Debug)]
pub enum Failure {
    /// Worth trying again: the condition can change between attempts.
    Transient(anyhow::Error),
    /// Pointless to retry (wrong binary version, bad configuration).
    Fatal(anyhow::Error),
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Succeeded,
    FatalError,
    AttemptsExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::FatalError => write!(f, "hit an error retrying cannot fix"),
            Self::AttemptsExhausted => write!(f, "ran out of attempts"),
        }
    }
}

/// The result of a retried operation, with the stop status attached.
#[derive(Debug)]
pub struct Outcome<T> {
    pub attempts: u32,
    pub stopped: StopReason,
    pub result: Result<T, anyhow::Error>,
}

/// Run `op` until it succeeds, fails fatally, or spends the attempt budget.
///
/// Delays grow from `policy.min` by `policy.factor` per attempt, capped at
/// `policy.max`. No delay follows the final attempt.
pub async fn with_backoff<T, F>(policy: &Policy, mut op: F) -> Outcome<T>
where
    F: AsyncFnMut() -> Result<T, Failure>,
{
    let mut delay = policy.min;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => {
                return Outcome {
                    attempts,
                    stopped: StopReason::Succeeded,
                    result: Ok(value),
                };
            }
            Err(Failure::Fatal(err)) => {
                return Outcome {
                    attempts,
                    stopped: StopReason::FatalError,
                    result: Err(err),
                };
            }
            Err(Failure::Transient(err)) => {
                if attempts >= policy.max_attempts {
                    return Outcome {
                        attempts,
                        stopped: StopReason::AttemptsExhausted,
                        result: Err(err),
                    };
                }
                time::sleep(delay).await;
                delay = delay.mul_f64(policy.factor).min(policy.max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    fn fast_policy(max_attempts: u32) -> Policy {
        Policy {
            max_attempts,
            min: Duration::from_millis(1),
            max: Duration::from_millis(4),
            factor: 2.0,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let mut calls = 0;
        let outcome = with_backoff(&fast_policy(5), async || {
            calls += 1;
            if calls < 3 {
                Err(Failure::Transient(anyhow!("not yet")))
            } else {
                Ok(calls)
            }
        })
        .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.stopped, StopReason::Succeeded);
        assert_eq!(outcome.result.expect("succeeded"), 3);
    }

    #[tokio::test]
    async fn fatal_errors_stop_immediately() {
        let mut calls = 0;
        let outcome: Outcome<()> = with_backoff(&fast_policy(5), async || {
            calls += 1;
            Err(Failure::Fatal(anyhow!("wrong version")))
        })
        .await;

        assert_eq!(calls, 1);
        assert_eq!(outcome.stopped, StopReason::FatalError);
        assert!(outcome.result.is_err());
    }

    #[tokio::test]
    async fn the_attempt_budget_is_a_hard_stop() {
        let mut calls = 0;
        let outcome: Outcome<()> = with_backoff(&fast_policy(3), async || {
            calls += 1;
            Err(Failure::Transient(anyhow!("always failing")))
        })
        .await;

        assert_eq!(calls, 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.stopped, StopReason::AttemptsExhausted);
        assert!(outcome.result.is_err());
    }
}
