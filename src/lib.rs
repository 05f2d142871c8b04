//! `accountapi-http` is an async client for the organisation accounts API.
//!
//! The core is a retry envelope with body replay:
//! - [`RetryExecutor`] / [`execute`] drive any [`Sender`] with exponential back-off
//! - [`RequestContext`] carries cancellation and deadlines across retries
//!
//! [`AccountClient`] wraps it for the accounts resource:
//! - [`AccountClient::create`]
//! - [`AccountClient::fetch`]
//! - [`AccountClient::delete`]
//! - [`AccountClient::list`]
//! - [`AccountClient::health`]

mod account;
mod client;
mod context;
mod error;
mod options;
mod request;
mod retry;
mod sender;
mod wire;

pub use account::{AccountAttributes, AccountData, AccountPage, Links};
pub use client::{AccountClient, DEFAULT_API_VERSION};
pub use context::{CancelReason, RequestContext};
pub use error::{AccountApiError, BoxError};
pub use options::ClientOptions;
pub use request::{PendingRequest, RequestBody};
pub use retry::{
    classify, execute, AttemptOutcome, RetryCause, RetryExecutor, RetryPolicy, RetryPolicyBuilder,
};
pub use sender::{OutboundRequest, ReqwestSender, ResponseStatus, Sender};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, AccountApiError>;
