use crate::error::{ErrorClass, LlmError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Up to 5 attempts total, per §4.2. Inter-attempt delay depends on the
/// error class of the immediately preceding failure.
pub const MAX_ATTEMPTS: u32 = 5;

/// Chooses the inter-attempt delay for the next retry given the error class
/// of the attempt that just failed, and how many transient retries have
/// already elapsed (used to grow the transient band from 3s to 5s).
pub fn backoff_delay(class: ErrorClass, transient_attempt: u32) -> Duration {
    let mut rng = rand::thread_rng();
    match class {
        ErrorClass::RateLimit => Duration::from_secs_f64(rng.gen_range(30.0..=60.0)),
        ErrorClass::Timeout => Duration::from_secs(10),
        ErrorClass::ContextTooLong => Duration::from_secs(0),
        ErrorClass::Transient | ErrorClass::Permanent => {
            let growth = (transient_attempt as f64).min(4.0);
            let base = 3.0 + growth * (2.0 / 4.0);
            Duration::from_secs_f64(rng.gen_range(base..=(base + 0.5).min(5.0)))
        }
    }
}

/// Retries `f` up to `MAX_ATTEMPTS` times, sleeping per `backoff_delay`
/// between attempts. Aborts immediately (no further attempts) on a
/// `Permanent`-class error. On exhaustion, returns `LlmError::CallFailed`
/// wrapping the last underlying error, per §7's `LLMCallFailed`.
pub async fn retry_with_backoff<F, Fut, T>(operation_name: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<LlmError> = None;
    let mut transient_attempt = 0u32;

    for attempt in 1..=MAX_ATTEMPTS {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = operation_name, attempt, "llm call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let class = err.class();
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    class = ?class,
                    "llm call attempt failed"
                );
                if class == ErrorClass::Permanent {
                    return Err(err);
                }
                if attempt == MAX_ATTEMPTS {
                    last_error = Some(err);
                    break;
                }
                let delay = backoff_delay(class, transient_attempt);
                transient_attempt += 1;
                tokio::time::sleep(delay).await;
                last_error = Some(err);
            }
        }
    }

    let last_error = last_error.expect("loop always records an error before exiting on failure");
    tracing::error!(operation = operation_name, attempts = MAX_ATTEMPTS, "llm call exhausted retries");
    Err(LlmError::CallFailed {
        attempts: MAX_ATTEMPTS,
        last_error: last_error.to_string(),
    })
}
