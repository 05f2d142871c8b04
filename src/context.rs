use std::{fmt, future, time::Duration};

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a [`RequestContext`] stopped a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("context canceled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Caller-supplied cancellation signal and optional deadline.
///
/// The default value is a background context that never fires.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no deadline and no cancellation token.
    pub fn background() -> Self {
        Self::default()
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or_else(far_future);
        self.with_deadline(deadline)
    }

    /// Sets an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Time left until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the reason this context is done, or `None` while it is live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Never resolves on a background context.
    pub async fn done(&self) -> CancelReason {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => CancelReason::Cancelled,
            _ = expired => CancelReason::DeadlineExceeded,
        }
    }
}

// Roughly 30 years; used when `now + timeout` overflows.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::{CancelReason, RequestContext};

    #[test]
    fn background_is_never_done() {
        assert_eq!(RequestContext::background().err(), None);
        assert_eq!(RequestContext::background().remaining(), None);
    }

    #[test]
    fn cancelled_token_is_reported() {
        let token = CancellationToken::new();
        let ctx = RequestContext::background().with_cancellation(token.clone());
        assert_eq!(ctx.err(), None);
        token.cancel();
        assert_eq!(ctx.err(), Some(CancelReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(100));
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.done().await, CancelReason::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_wins() {
        let ctx = RequestContext::background()
            .with_timeout(Duration::from_millis(50))
            .with_timeout(Duration::from_secs(10));
        assert_eq!(ctx.remaining(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn reasons_display_like_context_errors() {
        assert_eq!(CancelReason::Cancelled.to_string(), "context canceled");
        assert_eq!(
            CancelReason::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }
}
