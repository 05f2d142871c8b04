use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;

use crate::{
    AccountApiError, BoxError, OutboundRequest, PendingRequest, ResponseStatus, Result, Sender,
};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_WAIT: Duration = Duration::from_millis(500);
const BACKOFF_RATIO: f64 = 1.5;

/// Retry bound and back-off base.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_wait: Duration,
}

impl Default for RetryPolicy {
    /// Returns a policy with `max_retries = 3` and `base_wait = 500ms`.
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_wait: DEFAULT_BASE_WAIT,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Number of retries allowed after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_wait(&self) -> Duration {
        self.base_wait
    }

    /// Wait before attempt `attempt` (0-indexed). Attempt 0 never waits.
    ///
    /// Saturates at [`Duration::MAX`].
    pub fn wait_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.base_wait.as_secs_f64() * BACKOFF_RATIO.powi(exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Builder for [`RetryPolicy`]; unset fields take the defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryPolicyBuilder {
    max_retries: Option<u32>,
    base_wait: Option<Duration>,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn base_wait(mut self, base_wait: Duration) -> Self {
        self.base_wait = Some(base_wait);
        self
    }

    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            base_wait: self.base_wait.unwrap_or(DEFAULT_BASE_WAIT),
        }
    }
}

/// Why an attempt is eligible for a retry.
#[derive(Debug)]
pub enum RetryCause {
    Transport(BoxError),
    Status(StatusCode),
}

/// Classification of a single attempt.
#[derive(Debug)]
pub enum AttemptOutcome<R> {
    /// `200..400` or `409`.
    Success(R),
    /// Transport error, `429` or `5xx`.
    RetryableFailure(RetryCause),
    /// Any other status. Returned to the caller without retrying.
    TerminalFailure(R),
}

/// Classifies the result of one send.
pub fn classify<R: ResponseStatus>(result: std::result::Result<R, BoxError>) -> AttemptOutcome<R> {
    let response = match result {
        Ok(response) => response,
        Err(err) => return AttemptOutcome::RetryableFailure(RetryCause::Transport(err)),
    };

    let status = response.status();
    let code = status.as_u16();
    if (200..400).contains(&code) || status == StatusCode::CONFLICT {
        AttemptOutcome::Success(response)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AttemptOutcome::RetryableFailure(RetryCause::Status(status))
    } else {
        AttemptOutcome::TerminalFailure(response)
    }
}

/// Drives a [`Sender`] under an optional [`RetryPolicy`].
///
/// Replays a [`PendingRequest`] while the outcome is retryable:
/// - a transport error, a `429 Too Many Requests` or any `5xx` is retried;
/// - a status in `200..400` or `409 Conflict` is returned as a success;
/// - any other status is returned as-is without retrying.
///
/// The first attempt never waits and is sent even when the request context
/// has already expired; every retry is gated on the context. Without a policy
/// every request is sent exactly once and the result is returned unchanged.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RetryExecutor {
    policy: Option<RetryPolicy>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    /// An executor that never retries.
    pub fn pass_through() -> Self {
        Self { policy: None }
    }

    pub async fn execute<S: Sender>(
        &self,
        sender: &S,
        request: PendingRequest,
    ) -> Result<S::Response> {
        execute(sender, self.policy.as_ref(), request).await
    }
}

impl From<Option<RetryPolicy>> for RetryExecutor {
    fn from(policy: Option<RetryPolicy>) -> Self {
        Self { policy }
    }
}

/// Sends `request` through `sender`, retrying per `policy`.
///
/// The body is buffered once before the first attempt; a body that cannot be
/// read fails the call before anything is sent.
pub async fn execute<S: Sender>(
    sender: &S,
    policy: Option<&RetryPolicy>,
    request: PendingRequest,
) -> Result<S::Response> {
    let PendingRequest {
        method,
        url,
        headers,
        body,
        context,
    } = request;

    let body: Option<Bytes> = match body {
        Some(body) => Some(
            body.buffer()
                .await
                .map_err(|err| AccountApiError::Body(err.into()))?,
        ),
        None => None,
    };

    let outbound = |timeout| OutboundRequest {
        method: method.clone(),
        url: url.clone(),
        headers: headers.clone(),
        body: body.clone(),
        timeout,
    };

    let Some(policy) = policy else {
        return sender
            .send(outbound(context.remaining()))
            .await
            .map_err(AccountApiError::Transport);
    };

    let mut attempt = 0u32;
    loop {
        if attempt > 0 {
            let delay = policy.wait_for(attempt);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                reason = context.done() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%method, %url, attempt, "retry aborted: {reason}");
                    return Err(AccountApiError::Cancelled(reason));
                }
            }
            if let Some(reason) = context.err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(%method, %url, attempt, "retry aborted: {reason}");
                return Err(AccountApiError::Cancelled(reason));
            }
        }

        let result = sender.send(outbound(context.remaining())).await;
        match classify(result) {
            AttemptOutcome::Success(response) | AttemptOutcome::TerminalFailure(response) => {
                return Ok(response);
            }
            AttemptOutcome::RetryableFailure(cause) => {
                if attempt >= policy.max_retries() {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        %method,
                        %url,
                        max_retries = policy.max_retries(),
                        "giving up after retryable failure: {cause:?}"
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = cause;
                    break;
                }

                attempt += 1;

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    %method,
                    %url,
                    attempt,
                    delay_ms = millis(policy.wait_for(attempt)),
                    "retrying request after {cause:?}"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = cause;
            }
        }
    }

    Err(AccountApiError::RetryExhausted {
        max_retries: policy.max_retries(),
    })
}

#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::{classify, millis, AttemptOutcome, RetryCause, RetryPolicy};
    use crate::{BoxError, ResponseStatus};

    struct Status(u16);

    impl ResponseStatus for Status {
        fn status(&self) -> StatusCode {
            StatusCode::from_u16(self.0).expect("test status must be valid")
        }
    }

    fn outcome(code: u16) -> AttemptOutcome<Status> {
        classify(Ok::<_, BoxError>(Status(code)))
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.base_wait(), Duration::from_millis(500));
        assert_eq!(RetryPolicy::builder().build(), policy);
    }

    #[test]
    fn builder_keeps_explicit_zero() {
        let policy = RetryPolicy::builder().max_retries(0).build();
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.base_wait(), Duration::from_millis(500));
    }

    #[test]
    fn wait_grows_by_one_and_a_half() {
        let policy = RetryPolicy::builder()
            .base_wait(Duration::from_secs(1))
            .build();
        let waits: Vec<f64> = (0..=4).map(|n| policy.wait_for(n).as_secs_f64()).collect();
        assert_eq!(waits, vec![0.0, 1.5, 2.25, 3.375, 5.0625]);
    }

    #[test]
    fn wait_saturates_instead_of_panicking() {
        let policy = RetryPolicy::builder()
            .base_wait(Duration::from_secs(u64::MAX))
            .build();
        assert_eq!(policy.wait_for(10_000), Duration::MAX);
    }

    #[test]
    fn saturated_wait_logs_as_max_millis() {
        let policy = RetryPolicy::builder()
            .base_wait(Duration::from_secs(u64::MAX))
            .build();
        assert_eq!(millis(policy.wait_for(64)), u64::MAX);
        assert_eq!(millis(Duration::from_millis(750)), 750);
    }

    #[test]
    fn success_statuses() {
        for code in [200, 201, 204, 301, 304, 399, 409] {
            assert!(
                matches!(outcome(code), AttemptOutcome::Success(_)),
                "{code} must be a success"
            );
        }
    }

    #[test]
    fn retryable_statuses() {
        for code in [429, 500, 502, 503, 504, 599] {
            assert!(
                matches!(
                    outcome(code),
                    AttemptOutcome::RetryableFailure(RetryCause::Status(_))
                ),
                "{code} must be retryable"
            );
        }
    }

    #[test]
    fn terminal_statuses() {
        for code in [100, 400, 401, 403, 404, 408, 422] {
            assert!(
                matches!(outcome(code), AttemptOutcome::TerminalFailure(_)),
                "{code} must be terminal"
            );
        }
    }

    #[test]
    fn transport_error_is_retryable() {
        let result: Result<Status, BoxError> = Err("connection refused".into());
        assert!(matches!(
            classify(result),
            AttemptOutcome::RetryableFailure(RetryCause::Transport(_))
        ));
    }
}
