//! HTTP client for the Azure Service Management API.
//!
//! [`ManagementClient`] signs requests with the management certificate,
//! stamps them with the API version and user agent, and sends them over the
//! configured [`Transport`]. Mutating requests may start a long-running
//! operation on the service; those come back as [`Submission::Pending`] and
//! can be awaited with [`ManagementClient::wait_for_operation`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use azure_management_core::auth::ManagementCertificate;
//! use azure_management_core::client::{ManagementClient, Submission};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let certificate = ManagementCertificate::from_pem_file("management.pem")?;
//! let client = ManagementClient::new("00000000-0000-0000-0000-000000000000", certificate)?;
//!
//! let submission = client
//!     .send_delete("services/hostedservices/my-service")
//!     .await?;
//!
//! if let Submission::Pending(operation_id) = submission {
//!     client
//!         .wait_for_operation(&operation_id, &CancellationToken::new())
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::Deserialize;
use url::Url;

use crate::auth::ManagementCertificate;
use crate::config::{ClientConfig, RetryPolicy, TransportSource, DEFAULT_USER_AGENT};
use crate::error::{ManagementError, ManagementResult, RequestPhase};
use crate::operation::OperationId;
use crate::transport::{ReqwestTransport, Transport};

/// Response header carrying the identifier of an asynchronous operation.
pub const REQUEST_ID_HEADER: &str = "x-ms-request-id";

/// Request header carrying the API version.
pub const VERSION_HEADER: &str = "x-ms-version";

/// Content type used when the caller does not specify one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/xml";

/// Environment variable holding the subscription ID.
pub const SUBSCRIPTION_ID_ENV: &str = "AZURE_SUBSCRIPTION_ID";

/// Environment variable overriding the management endpoint.
pub const MANAGEMENT_URL_ENV: &str = "AZURE_MANAGEMENT_URL";

const SEND_GET: &str = "SendAzureGetRequest";
const SEND_POST: &str = "SendAzurePostRequest";
const SEND_POST_WITH_RESPONSE: &str = "SendAzurePostRequestWithReturnedResponse";
const SEND_PUT: &str = "SendAzurePutRequest";
const SEND_DELETE: &str = "SendAzureDeleteRequest";

/// Determines if an HTTP status code represents a retriable error.
///
/// Retriable errors are transient server-side issues that may succeed on retry:
/// - 408 Request Timeout
/// - 429 Too Many Requests (rate limiting)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// The outcome of a mutating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The service accepted the request and is processing it asynchronously.
    Pending(OperationId),
    /// The request completed synchronously with this response body.
    Completed(Bytes),
}

impl Submission {
    /// The operation to wait for, if the request was accepted asynchronously.
    pub fn operation_id(&self) -> Option<&OperationId> {
        match self {
            Self::Pending(id) => Some(id),
            Self::Completed(_) => None,
        }
    }
}

/// The client for the Azure Service Management API.
///
/// The client is cheaply cloneable and can be shared across tasks; all
/// clones share one transport and one immutable configuration.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    subscription_id: String,
    management_url: Url,
    operation_poll_interval: Duration,
    api_version: String,
    user_agent: String,
    version_header: HeaderValue,
    user_agent_header: HeaderValue,
    poll_retry_policy: RetryPolicy,
    certificate: ManagementCertificate,
    transport: Box<dyn Transport>,
}

impl ManagementClient {
    /// Create a client with [`ClientConfig::default()`].
    pub fn new(
        subscription_id: impl Into<String>,
        certificate: ManagementCertificate,
    ) -> ManagementResult<Self> {
        Self::from_config(subscription_id, certificate, ClientConfig::default())
    }

    /// Create a client from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Configuration`] if:
    /// - the subscription ID or certificate is empty
    /// - the management URL is empty or not a valid base URL
    /// - the poll interval is zero
    /// - the API version is empty
    /// - the certificate cannot be used as a TLS identity
    pub fn from_config(
        subscription_id: impl Into<String>,
        certificate: ManagementCertificate,
        config: ClientConfig,
    ) -> ManagementResult<Self> {
        let subscription_id = subscription_id.into();
        if subscription_id.trim().is_empty() {
            return Err(ManagementError::config("subscription ID required"));
        }
        if certificate.is_empty() {
            return Err(ManagementError::config("management certificate required"));
        }

        let ClientConfig {
            management_url,
            operation_poll_interval,
            api_version,
            user_agent,
            poll_retry_policy,
            transport,
        } = config;

        if management_url.is_empty() {
            return Err(ManagementError::config("management URL required"));
        }
        let management_url = parse_base_url(&management_url)?;

        if operation_poll_interval.is_zero() {
            return Err(ManagementError::config(
                "operation poll interval must be a positive duration",
            ));
        }
        if api_version.is_empty() {
            return Err(ManagementError::config("API version required"));
        }
        let user_agent = if user_agent.is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            user_agent
        };

        let version_header = HeaderValue::from_str(&api_version)
            .map_err(|e| ManagementError::config_with_source("invalid API version", e))?;
        let user_agent_header = HeaderValue::from_str(&user_agent)
            .map_err(|e| ManagementError::config_with_source("invalid user agent", e))?;

        let transport: Box<dyn Transport> = match transport {
            TransportSource::Default => Box::new(ReqwestTransport::with_certificate(
                reqwest::Client::builder(),
                &certificate,
            )?),
            TransportSource::Builder(builder) => {
                Box::new(ReqwestTransport::with_certificate(builder, &certificate)?)
            }
            TransportSource::Custom(mut transport) => {
                if transport.supports_certificate_injection() {
                    transport.inject_certificate(&certificate)?;
                } else {
                    tracing::warn!(
                        "custom transport does not accept certificate injection; \
                         using it without the management certificate"
                    );
                }
                transport
            }
        };

        tracing::debug!(
            management_url = %management_url,
            api_version = %api_version,
            "management client created"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                subscription_id,
                management_url,
                operation_poll_interval,
                api_version,
                user_agent,
                version_header,
                user_agent_header,
                poll_retry_policy,
                certificate,
                transport,
            }),
        })
    }

    /// Create a client from the environment.
    ///
    /// Reads `AZURE_SUBSCRIPTION_ID`, the certificate file named by
    /// `AZURE_MANAGEMENT_CERTIFICATE_PATH`, and optionally `AZURE_MANAGEMENT_URL`.
    pub fn from_env() -> ManagementResult<Self> {
        let subscription_id = std::env::var(SUBSCRIPTION_ID_ENV).map_err(|_| {
            ManagementError::config(format!(
                "subscription ID required. Set {SUBSCRIPTION_ID_ENV}."
            ))
        })?;
        let certificate = ManagementCertificate::from_env()?;

        let mut config = ClientConfig::default();
        if let Ok(url) = std::env::var(MANAGEMENT_URL_ENV) {
            if !url.is_empty() {
                config = config.management_url(url);
            }
        }

        Self::from_config(subscription_id, certificate, config)
    }

    /// Get the subscription ID requests are scoped to.
    pub fn subscription_id(&self) -> &str {
        &self.inner.subscription_id
    }

    /// Get the management endpoint URL.
    pub fn management_url(&self) -> &Url {
        &self.inner.management_url
    }

    /// Get the API version sent in the `x-ms-version` header.
    pub fn api_version(&self) -> &str {
        &self.inner.api_version
    }

    /// Get the user agent string.
    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    /// Get the interval between operation status queries.
    pub fn operation_poll_interval(&self) -> Duration {
        self.inner.operation_poll_interval
    }

    /// Get the retry policy for failed operation status queries.
    pub fn poll_retry_policy(&self) -> &RetryPolicy {
        &self.inner.poll_retry_policy
    }

    /// Get the management certificate the client authenticates with.
    pub fn certificate(&self) -> &ManagementCertificate {
        &self.inner.certificate
    }

    /// Build the URL of a path relative to the subscription:
    /// `{management_url}/{subscription_id}/{path}`.
    ///
    /// The subscription ID is percent-encoded; `path` is joined as given.
    pub fn subscription_url(&self, path: &str) -> ManagementResult<Url> {
        self.subscription_segments_url([""])?
            .join(path.trim_start_matches('/'))
            .map_err(|e| ManagementError::InvalidRequest(format!("failed to construct URL: {e}")))
    }

    /// Build `{management_url}/{subscription_id}/{segment}/...`,
    /// percent-encoding the subscription ID and every segment.
    ///
    /// Use this for identifiers that come from the service, so characters
    /// such as `/`, `?` and `#` cannot change which resource is addressed.
    pub fn subscription_segments_url<I>(&self, segments: I) -> ManagementResult<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.inner.management_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| {
                ManagementError::InvalidRequest("management URL cannot carry a path".into())
            })?
            .pop_if_empty()
            .push(&self.inner.subscription_id)
            .extend(segments);
        Ok(url)
    }

    /// Build the URL of a path relative to the management endpoint.
    pub fn resource_url(&self, path: &str) -> ManagementResult<Url> {
        self.inner
            .management_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ManagementError::InvalidRequest(format!("failed to construct URL: {e}")))
    }

    /// Send a GET request and return the response body.
    #[tracing::instrument(name = "azure_management::send_get", skip(self), fields(path = %path))]
    pub async fn send_get(&self, path: &str) -> ManagementResult<Bytes> {
        let response = self
            .send_request(SEND_GET, Method::GET, path, None, None)
            .await?;
        read_body(SEND_GET, response).await
    }

    /// Send a POST request with an XML body.
    ///
    /// Returns [`Submission::Pending`] when the service starts an asynchronous
    /// operation.
    #[tracing::instrument(name = "azure_management::send_post", skip(self, body), fields(path = %path))]
    pub async fn send_post(&self, path: &str, body: impl Into<Bytes>) -> ManagementResult<Submission> {
        self.submit(SEND_POST, Method::POST, path, None, Some(body.into()))
            .await
    }

    /// Send a POST request with an XML body and return the response body.
    #[tracing::instrument(
        name = "azure_management::send_post_with_response",
        skip(self, body),
        fields(path = %path)
    )]
    pub async fn send_post_with_response(
        &self,
        path: &str,
        body: impl Into<Bytes>,
    ) -> ManagementResult<Bytes> {
        let response = self
            .send_request(
                SEND_POST_WITH_RESPONSE,
                Method::POST,
                path,
                None,
                Some(body.into()),
            )
            .await?;
        read_body(SEND_POST_WITH_RESPONSE, response).await
    }

    /// Send a PUT request.
    ///
    /// `content_type` defaults to [`DEFAULT_CONTENT_TYPE`] when `None`.
    #[tracing::instrument(name = "azure_management::send_put", skip(self, body), fields(path = %path))]
    pub async fn send_put(
        &self,
        path: &str,
        content_type: Option<&str>,
        body: impl Into<Bytes>,
    ) -> ManagementResult<Submission> {
        self.submit(SEND_PUT, Method::PUT, path, content_type, Some(body.into()))
            .await
    }

    /// Send a DELETE request.
    #[tracing::instrument(name = "azure_management::send_delete", skip(self), fields(path = %path))]
    pub async fn send_delete(&self, path: &str) -> ManagementResult<Submission> {
        self.submit(SEND_DELETE, Method::DELETE, path, None, None)
            .await
    }

    /// Send a request to an absolute URL over the client's transport.
    ///
    /// Adds the version and user agent headers. The response status is not
    /// inspected; pass the response to [`check_response`](Self::check_response).
    pub async fn execute(
        &self,
        method: Method,
        url: Url,
        content_type: Option<&str>,
        body: Option<Bytes>,
    ) -> ManagementResult<reqwest::Response> {
        let request = self.prepare(method, url, content_type, body)?;
        Ok(self.inner.transport.send(request).await?)
    }

    /// Build a request with the version, user agent and content type headers.
    fn prepare(
        &self,
        method: Method,
        url: Url,
        content_type: Option<&str>,
        body: Option<Bytes>,
    ) -> ManagementResult<reqwest::Request> {
        let mut request = reqwest::Request::new(method, url);
        let headers = request.headers_mut();
        headers.insert(VERSION_HEADER, self.inner.version_header.clone());
        headers.insert(USER_AGENT, self.inner.user_agent_header.clone());

        if let Some(body) = body {
            let content_type = HeaderValue::from_str(content_type.unwrap_or(DEFAULT_CONTENT_TYPE))
                .map_err(|e| ManagementError::InvalidRequest(format!("invalid content type: {e}")))?;
            headers.insert(CONTENT_TYPE, content_type);
            *request.body_mut() = Some(reqwest::Body::from(body));
        }

        Ok(request)
    }

    /// Send a subscription-relative request and check its status, annotating
    /// errors with `operation` and the phase they occurred in.
    async fn send_request(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<Bytes>,
    ) -> ManagementResult<reqwest::Response> {
        let request = self
            .subscription_url(path)
            .and_then(|url| self.prepare(method, url, content_type, body))
            .map_err(|e| e.context(operation, RequestPhase::Preparing))?;

        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(|e| ManagementError::from(e).context(operation, RequestPhase::Sending))?;

        Self::check_response(response)
            .await
            .map_err(|e| e.context(operation, RequestPhase::Responding))
    }

    async fn submit(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<Bytes>,
    ) -> ManagementResult<Submission> {
        let response = self
            .send_request(operation, method, path, content_type, body)
            .await?;

        let operation_id = request_id(&response)
            .map_err(|e| e.context(operation, RequestPhase::Responding))?;
        match operation_id {
            Some(operation_id) => {
                tracing::debug!(operation_id = %operation_id, "request accepted");
                Ok(Submission::Pending(operation_id))
            }
            None => {
                tracing::debug!(status = response.status().as_u16(), "request completed");
                read_body(operation, response)
                    .await
                    .map(Submission::Completed)
            }
        }
    }

    /// Maximum length for error messages taken from response bodies.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Truncate a message if it exceeds the maximum length.
    pub(crate) fn truncate_message(msg: &str) -> String {
        if msg.len() <= Self::MAX_ERROR_MESSAGE_LEN {
            return msg.to_string();
        }
        let mut end = Self::MAX_ERROR_MESSAGE_LEN;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &msg[..end])
    }

    /// Check the response status and return an error if not successful.
    ///
    /// Error bodies are decoded as a Service Management `<Error>` document,
    /// then as a JSON `{"error": {...}}` object, before falling back to the
    /// raw text.
    pub async fn check_response(response: reqwest::Response) -> ManagementResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let (code, message) = parse_error_body(&body).unwrap_or_else(|| {
            let message = if body.trim().is_empty() {
                response_reason(status)
            } else {
                body.clone()
            };
            ("Unknown".to_string(), message)
        });

        Err(ManagementError::Remote {
            status,
            code,
            message: Self::truncate_message(&message),
        })
    }
}

/// Service Management error document.
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

fn parse_error_body(body: &str) -> Option<(String, String)> {
    if let Ok(error) = quick_xml::de::from_str::<ServiceError>(body) {
        return Some((error.code, error.message));
    }

    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let error = value.get("error")?;
    let code = error
        .get("code")
        .and_then(|c| c.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or(body)
        .to_string();
    Some((code, message))
}

async fn read_body(operation: &'static str, response: reqwest::Response) -> ManagementResult<Bytes> {
    response
        .bytes()
        .await
        .map_err(|e| ManagementError::from(e).context(operation, RequestPhase::Responding))
}

fn response_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("request failed")
        .to_string()
}

fn request_id(response: &reqwest::Response) -> ManagementResult<Option<OperationId>> {
    let Some(value) = response.headers().get(REQUEST_ID_HEADER) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        ManagementError::MalformedResponse(format!("{REQUEST_ID_HEADER} header is not valid text"))
    })?;
    let value = value.trim();
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(OperationId::new(value)))
    }
}

fn parse_base_url(raw: &str) -> ManagementResult<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| ManagementError::config_with_source("invalid management URL", e))?;
    if url.cannot_be_a_base() {
        return Err(ManagementError::config(format!(
            "management URL cannot be used as a base: {raw}"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
