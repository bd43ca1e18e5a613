use std::time::Duration;

/// First attempt plus a single retry.
pub const MAX_ATTEMPTS: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Timeouts and refused/reset connections. HTTP error statuses are not transient here;
/// callers map them to their own error kinds.
pub fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Sends the request built by `build`, retrying once on a transient transport error.
pub async fn send_with_retry<F>(
    target: &'static str,
    build: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match build().send().await {
            Ok(res) => return Ok(res),
            Err(err) if attempt < MAX_ATTEMPTS && is_transient(&err) => {
                tracing::warn!(
                    target_api = target,
                    attempt,
                    backoff = ?RETRY_BACKOFF,
                    error = %err,
                    "transient network error; retrying once"
                );
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(err) => return Err(err),
        }
    }
}
