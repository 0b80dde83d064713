use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// How many times one source is tried for one symbol, and how long to wait
/// between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of runs, including the first one. Clamped to at least 1.
    pub attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Retries an async operation with a fixed delay between attempts
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `policy`: Total attempts and the delay between them
/// - `is_retryable`: Errors for which this returns false are returned
///   immediately without using the remaining attempts
///
/// # Returns
/// Either the successful result or the error from the last attempt
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt >= attempts || !is_retryable(&err) {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, attempts, err
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

/// Lenient number parsing for upstream payloads: blanks, `-` placeholders
/// and garbage all read as zero, which the callers treat as "unknown".
pub fn parse_decimal(raw: &str) -> Decimal {
    let trimmed = raw.trim().trim_start_matches('+').trim_end_matches('%');
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .unwrap_or(Decimal::ZERO)
}

/// Same as [`parse_decimal`] for JSON fields that may be numbers or strings.
pub fn decimal_from_value(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::String(s)) => parse_decimal(s),
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        _ => Decimal::ZERO,
    }
}

/// Extracts the quoted payload of `var hq_str_x="...";` or `v_x="...";`
/// style responses.
pub fn quoted_payload(body: &str) -> Option<&str> {
    let start = body.find("=\"")? + 2;
    let rest = &body[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}
