use std::time::Duration;

use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Method, StatusCode, Url,
};
use serde::de::DeserializeOwned;

use crate::{
    wire::{DataRequest, DataResponse, ErrorResponse, HealthResponse, ListResponse},
    AccountApiError, AccountData, AccountPage, ClientOptions, PendingRequest, RequestContext,
    Result, RetryExecutor, ReqwestSender,
};

/// Default API version segment.
pub const DEFAULT_API_VERSION: &str = "v1";

const JSON_API: &str = "application/vnd.api+json";

/// HTTP client for the organisation accounts resource.
///
/// Every call goes through a [`RetryExecutor`] configured from
/// [`ClientOptions::retry`].
#[derive(Clone, Debug)]
pub struct AccountClient {
    sender: ReqwestSender,
    executor: RetryExecutor,
    base_url: Url,
    version: String,
}

/// What a call expects back, and how a `409 Conflict` reads for it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Operation {
    Create,
    Read,
    Delete,
}

impl Operation {
    fn accepts(self, status: StatusCode) -> bool {
        match self {
            Self::Delete => status == StatusCode::NO_CONTENT,
            Self::Create | Self::Read => status.is_success(),
        }
    }
}

impl AccountClient {
    /// Creates a client for the API served at `base_url`.
    ///
    /// Example: `"http://localhost:8080"` addresses
    /// `http://localhost:8080/v1/organisation/accounts`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    /// Creates a client around an existing `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = parse_base_url(base_url.as_ref())?;
        let options = ClientOptions::default();
        Ok(Self {
            sender: ReqwestSender::new(http, Duration::from_millis(options.timeout_ms)),
            executor: RetryExecutor::from(options.retry),
            base_url,
            version: DEFAULT_API_VERSION.to_owned(),
        })
    }

    /// Creates a client from the environment.
    ///
    /// Reads `ACCOUNT_API_BASE_URL` (e.g. `http://localhost:8080`). Returns
    /// an error if it is missing or empty.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("ACCOUNT_API_BASE_URL").map_err(|_| {
            AccountApiError::Config("missing ACCOUNT_API_BASE_URL environment variable".to_owned())
        })?;
        if url.trim().is_empty() {
            return Err(AccountApiError::Config(
                "ACCOUNT_API_BASE_URL is set but empty".to_owned(),
            ));
        }
        Self::new(url.trim())
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.sender = self
            .sender
            .with_timeout(Duration::from_millis(opts.timeout_ms));
        self.executor = RetryExecutor::from(opts.retry);
        self
    }

    /// Overrides the API version path segment (default `v1`).
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Creates an account and returns the stored resource.
    ///
    /// A `409 Conflict` is reported as [`AccountApiError::DuplicatedAccount`].
    pub async fn create(&self, ctx: &RequestContext, account: &AccountData) -> Result<AccountData> {
        let body = serde_json::to_vec(&DataRequest { data: account })
            .map_err(|err| AccountApiError::Decode(format!("could not encode account: {err}")))?;
        let url = self.resource_url(None)?;
        let body = self
            .send(ctx, Operation::Create, Method::POST, url, Some(body))
            .await?;
        decode::<DataResponse>(&body).map(|response| response.data)
    }

    /// Fetches an account by id.
    pub async fn fetch(&self, ctx: &RequestContext, id: &str) -> Result<AccountData> {
        let url = self.resource_url(Some(id))?;
        let body = self.send(ctx, Operation::Read, Method::GET, url, None).await?;
        decode::<DataResponse>(&body).map(|response| response.data)
    }

    /// Deletes version `version` of an account.
    ///
    /// Only `204 No Content` counts as success. A `409 Conflict` means the
    /// version is stale and is reported as [`AccountApiError::VersionConflict`].
    pub async fn delete(&self, ctx: &RequestContext, id: &str, version: i64) -> Result<()> {
        let mut url = self.resource_url(Some(id))?;
        url.query_pairs_mut()
            .append_pair("version", &version.to_string());
        self.send(ctx, Operation::Delete, Method::DELETE, url, None)
            .await?;
        Ok(())
    }

    /// Lists one page of accounts.
    pub async fn list(&self, ctx: &RequestContext, page: u32, size: u32) -> Result<AccountPage> {
        let mut url = self.resource_url(None)?;
        url.query_pairs_mut()
            .append_pair("page[number]", &page.to_string())
            .append_pair("page[size]", &size.to_string());
        let body = self.send(ctx, Operation::Read, Method::GET, url, None).await?;
        let response = decode::<ListResponse>(&body)?;
        Ok(AccountPage {
            accounts: response.data,
            links: response.links,
        })
    }

    /// Checks `/{version}/health`; the API must report `"status": "up"`.
    pub async fn health(&self, ctx: &RequestContext) -> Result<()> {
        let url = self.api_url(&["health"])?;
        let body = self.send(ctx, Operation::Read, Method::GET, url, None).await?;
        let response = decode::<HealthResponse>(&body)?;
        if response.status.eq_ignore_ascii_case("up") {
            Ok(())
        } else {
            Err(AccountApiError::Unavailable {
                status: response.status,
            })
        }
    }

    fn resource_url(&self, id: Option<&str>) -> Result<Url> {
        match id {
            Some(id) => self.api_url(&["organisation", "accounts", id]),
            None => self.api_url(&["organisation", "accounts"]),
        }
    }

    fn api_url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AccountApiError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(&self.version)
            .extend(tail);
        Ok(url)
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        operation: Operation,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<String> {
        #[cfg(feature = "tracing")]
        tracing::debug!(%method, %url, "sending accounts request");

        let mut request = PendingRequest::new(method, url)
            .headers(default_headers())
            .context(ctx.clone());
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_API))
                .body(body);
        }

        let response = self.executor.execute(&self.sender, request).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AccountApiError::Transport(err.into()))?;

        if !operation.accepts(status) {
            return Err(api_error(operation, status, &body));
        }
        Ok(body)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| AccountApiError::InvalidUrl(format!("{raw}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AccountApiError::InvalidUrl(format!(
            "{raw}: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(JSON_API));
    let date = chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert(header::DATE, value);
    }
    headers
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|err| {
        AccountApiError::Decode(format!("invalid accounts response JSON: {err}; body: {body}"))
    })
}

fn api_error(operation: Operation, status: StatusCode, body: &str) -> AccountApiError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|response| response.error_message)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_owned()
            } else {
                trimmed.to_owned()
            }
        });

    match (operation, status) {
        (Operation::Create, StatusCode::CONFLICT) => AccountApiError::DuplicatedAccount { message },
        (Operation::Delete, StatusCode::CONFLICT) => AccountApiError::VersionConflict { message },
        _ => AccountApiError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{api_error, AccountClient, Operation};
    use crate::AccountApiError;

    #[test]
    fn resource_url_appends_version_and_id() {
        let client = AccountClient::new("http://localhost:8080").expect("url must parse");
        let url = client.resource_url(Some("abc")).expect("url must build");
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/organisation/accounts/abc"
        );
    }

    #[test]
    fn resource_url_keeps_base_path_prefix() {
        let client = AccountClient::new("http://gateway/api/")
            .expect("url must parse")
            .with_version("v2");
        let url = client.resource_url(None).expect("url must build");
        assert_eq!(url.as_str(), "http://gateway/api/v2/organisation/accounts");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = AccountClient::new("ftp://localhost").expect_err("scheme must be rejected");
        assert!(matches!(err, AccountApiError::InvalidUrl(_)));
    }

    #[test]
    fn conflict_maps_to_duplicated_account() {
        let err = api_error(
            Operation::Create,
            StatusCode::CONFLICT,
            r#"{"error_message":"Account cannot be created as it violates a duplicate constraint"}"#,
        );
        match err {
            AccountApiError::DuplicatedAccount { message } => {
                assert!(message.contains("duplicate constraint"))
            }
            other => panic!("expected duplicated account, got {other:?}"),
        }
    }

    #[test]
    fn conflict_on_delete_is_version_conflict() {
        let err = api_error(
            Operation::Delete,
            StatusCode::CONFLICT,
            r#"{"error_message":"invalid version"}"#,
        );
        match err {
            AccountApiError::VersionConflict { message } => assert_eq!(message, "invalid version"),
            other => panic!("expected version conflict, got {other:?}"),
        }
        assert!(matches!(
            api_error(Operation::Read, StatusCode::CONFLICT, ""),
            AccountApiError::Api { status: 409, .. }
        ));
    }

    #[test]
    fn delete_accepts_only_no_content() {
        assert!(Operation::Delete.accepts(StatusCode::NO_CONTENT));
        assert!(!Operation::Delete.accepts(StatusCode::OK));
        assert!(Operation::Create.accepts(StatusCode::CREATED));
    }

    #[test]
    fn api_error_falls_back_to_raw_body_then_reason() {
        match api_error(Operation::Read, StatusCode::BAD_REQUEST, "plain text") {
            AccountApiError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "plain text");
            }
            other => panic!("expected api error, got {other:?}"),
        }
        match api_error(Operation::Read, StatusCode::NOT_FOUND, "") {
            AccountApiError::Api { message, .. } => assert_eq!(message, "Not Found"),
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
