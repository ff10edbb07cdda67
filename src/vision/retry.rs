use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub(crate) const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

pub(crate) fn is_transient_status(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if matches!(status.as_u16(), 500 | 502 | 503 | 504) {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("resource_exhausted")
        || lower.contains("quota exceeded")
        || lower.contains("backend error")
}

pub(crate) fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

pub(crate) async fn wait_with_backoff(
    reason: &str,
    attempt: usize,
    max_retries: usize,
    delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    let mut wait = delay;
    if let Some(retry_after) = retry_after
        && retry_after > wait
    {
        wait = retry_after.min(RETRY_MAX_DELAY);
    }
    warn!(
        "Cloud Vision {}; retrying in {:.1}s (retry {}/{})",
        reason,
        wait.as_secs_f32(),
        attempt,
        max_retries
    );
    sleep(wait).await;
    next_delay(delay)
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    let next_secs = current
        .as_secs()
        .saturating_mul(2)
        .max(RETRY_BASE_DELAY.as_secs());
    Duration::from_secs(next_secs).min(RETRY_MAX_DELAY)
}
