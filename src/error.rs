use crate::CancelReason;

/// Boxed error produced by a [`Sender`](crate::Sender) or a request body reader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum AccountApiError {
    /// The send itself failed and no response was received.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// The request context was cancelled or its deadline passed before a retry.
    #[error("{0}")]
    Cancelled(CancelReason),
    /// Every attempt allowed by the retry policy ended in a retryable failure.
    #[error("[exponential back-off] max retries ({max_retries}) exceeded")]
    RetryExhausted {
        /// Configured retry bound.
        max_retries: u32,
    },
    /// The request body could not be buffered before the first send.
    #[error("request body error: {0}")]
    Body(#[source] BoxError),
    /// Non-success response from the accounts API.
    #[error("account error: ({status}) {message}")]
    Api {
        status: u16,
        /// `error_message` from the response, or the raw body.
        message: String,
    },
    /// The account already exists (HTTP 409).
    #[error("duplicated account: {message}")]
    DuplicatedAccount { message: String },
    /// Delete was refused because the given version is not the current one (HTTP 409).
    #[error("version conflict: {message}")]
    VersionConflict { message: String },
    /// The health endpoint answered but did not report the service as up.
    #[error("api unavailable: status '{status}'")]
    Unavailable { status: String },
    /// Response decoding error.
    #[error("decode error: {0}")]
    Decode(String),
    /// The configured base URL or a derived resource URL is not valid.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Missing or malformed client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl AccountApiError {
    /// Returns `true` when the error was produced by the retry policy giving up.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Returns `true` when the error was produced by the request context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
