use std::{future::Future, time::Duration};

use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode, Url};

use crate::BoxError;

/// One attempt of a request, built fresh by the executor for every send.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// View over the buffered request body; every attempt sees the same bytes.
    pub body: Option<Bytes>,
    /// Time left on the request context when this attempt was built.
    pub timeout: Option<Duration>,
}

/// Exposes the status code of a response to the executor.
///
/// The executor never looks at anything else.
pub trait ResponseStatus {
    fn status(&self) -> StatusCode;
}

impl ResponseStatus for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }
}

/// Performs one request/response exchange.
///
/// Implementations must be callable repeatedly; the executor hands them a new
/// [`OutboundRequest`] per attempt.
pub trait Sender {
    type Response: ResponseStatus;

    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<Self::Response, BoxError>> + Send;
}

/// [`Sender`] backed by a `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestSender {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestSender {
    /// Wraps a client; `timeout` bounds every single attempt.
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Same underlying client with a different per-attempt timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            http: self.http.clone(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Sender for ReqwestSender {
    type Response = reqwest::Response;

    async fn send(&self, request: OutboundRequest) -> Result<reqwest::Response, BoxError> {
        let timeout = match request.timeout {
            Some(remaining) => remaining.min(self.timeout),
            None => self.timeout,
        };

        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder.send().await.map_err(BoxError::from)
    }
}
