use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Backoff {
  Fixed,
  /// Multiplies the delay by `factor` after every failed attempt.
  Exponential { factor: f64 },
}

/// Bounded retries for an outbound call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub delay: Duration,
  pub backoff: Backoff,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      delay: Duration::from_secs(2),
      backoff: Backoff::Fixed,
    }
  }
}

impl RetryPolicy {
  pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
    Self {
      max_attempts,
      delay,
      backoff: Backoff::Fixed,
    }
  }

  /// Delay before attempt `attempt + 1`, `attempt` counting from 1.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    match self.backoff {
      Backoff::Fixed => self.delay,
      Backoff::Exponential { factor } => self
        .delay
        .mul_f64(factor.powi(attempt.saturating_sub(1) as i32)),
    }
  }

  /// Runs `operation` until it succeeds or `max_attempts` are used up.
  pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> anyhow::Result<T>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
  {
    let attempts = self.max_attempts.max(1);
    let mut attempt = 1;

    loop {
      match operation(attempt).await {
        Ok(value) => return Ok(value),
        Err(err) if attempt >= attempts => {
          return Err(err.context(format!("{} failed after {} attempts", what, attempts)));
        }
        Err(err) => {
          let delay = self.delay_after(attempt);
          warn!(
            "{} attempt {}/{} failed: {:#}, retrying in {:?}",
            what, attempt, attempts, err, delay
          );
          sleep(delay).await;
          attempt += 1;
        }
      }
    }
  }
}
