//! Client configuration.
//!
//! [`ClientConfig::default()`] carries the production defaults. Every
//! setter only records a value; validation happens once, when the config is
//! handed to [`ManagementClient::from_config`](crate::client::ManagementClient::from_config).

use std::time::Duration;

use crate::transport::Transport;

/// Default Azure Service Management endpoint.
pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.core.windows.net";

/// Default interval between operation status queries (30 seconds).
pub const DEFAULT_OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default value of the `x-ms-version` header.
pub const DEFAULT_API_VERSION: &str = "2014-10-01";

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = "azure-sdk-for-rust";

/// Retry behavior for failed operation status queries while waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial query).
    pub max_retries: u32,
    /// Initial backoff duration before the first retry.
    /// Subsequent retries use exponential backoff (2^attempt * initial_backoff).
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries: the first failed query ends the wait.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Retry up to `max_retries` times starting from `initial_backoff`.
    pub const fn exponential(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Backoff before retry number `attempt` (zero based), with ±25% jitter.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt));
        let jitter = 0.75 + fastrand::f64() * 0.5; // 0.75 to 1.25
        base.mul_f64(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Where the client gets its HTTP transport from.
#[derive(Debug, Default)]
pub(crate) enum TransportSource {
    /// Build a reqwest client with default settings.
    #[default]
    Default,
    /// Finish a caller-supplied reqwest builder.
    Builder(reqwest::ClientBuilder),
    /// Use a caller-supplied transport.
    Custom(Box<dyn Transport>),
}

/// Configuration used to construct a [`ManagementClient`](crate::client::ManagementClient).
#[derive(Debug)]
pub struct ClientConfig {
    pub(crate) management_url: String,
    pub(crate) operation_poll_interval: Duration,
    pub(crate) api_version: String,
    pub(crate) user_agent: String,
    pub(crate) poll_retry_policy: RetryPolicy,
    pub(crate) transport: TransportSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            management_url: DEFAULT_MANAGEMENT_URL.to_string(),
            operation_poll_interval: DEFAULT_OPERATION_POLL_INTERVAL,
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            poll_retry_policy: RetryPolicy::none(),
            transport: TransportSource::Default,
        }
    }
}

impl ClientConfig {
    /// Set the endpoint requests are sent to.
    ///
    /// Defaults to [`DEFAULT_MANAGEMENT_URL`].
    pub fn management_url(mut self, url: impl Into<String>) -> Self {
        self.management_url = url.into();
        self
    }

    /// Set the fixed interval between operation status queries.
    ///
    /// Defaults to [`DEFAULT_OPERATION_POLL_INTERVAL`]. Must be non-zero.
    pub fn operation_poll_interval(mut self, interval: Duration) -> Self {
        self.operation_poll_interval = interval;
        self
    }

    /// Set the value of the `x-ms-version` header.
    ///
    /// Defaults to [`DEFAULT_API_VERSION`].
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the `User-Agent` header.
    ///
    /// An empty value falls back to [`DEFAULT_USER_AGENT`].
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set how failed status queries are retried while waiting for an operation.
    ///
    /// Defaults to [`RetryPolicy::none()`]: a failed query ends the wait.
    pub fn poll_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.poll_retry_policy = policy;
        self
    }

    /// Use a preconfigured reqwest builder for the HTTP transport.
    ///
    /// The management certificate is installed on the builder as its TLS
    /// client identity before it is built.
    pub fn http_client_builder(mut self, builder: reqwest::ClientBuilder) -> Self {
        self.transport = TransportSource::Builder(builder);
        self
    }

    /// Use a custom transport.
    ///
    /// If the transport reports
    /// [`supports_certificate_injection`](Transport::supports_certificate_injection),
    /// the management certificate is handed to it at construction. Otherwise it
    /// is used as-is and must handle client authentication itself.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = TransportSource::Custom(Box::new(transport));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ClientConfig::default();
        assert_eq!(config.management_url, "https://management.core.windows.net");
        assert_eq!(config.operation_poll_interval, Duration::from_secs(30));
        assert_eq!(config.api_version, "2014-10-01");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.poll_retry_policy, RetryPolicy::none());
        assert!(matches!(config.transport, TransportSource::Default));
    }

    #[test]
    fn setters_override_defaults() {
        let config = ClientConfig::default()
            .management_url("https://management.example.com")
            .operation_poll_interval(Duration::from_secs(5))
            .api_version("2015-04-01")
            .user_agent("my-tool/1.0")
            .poll_retry_policy(RetryPolicy::exponential(2, Duration::from_millis(100)));

        assert_eq!(config.management_url, "https://management.example.com");
        assert_eq!(config.operation_poll_interval, Duration::from_secs(5));
        assert_eq!(config.api_version, "2015-04-01");
        assert_eq!(config.user_agent, "my-tool/1.0");
        assert_eq!(config.poll_retry_policy.max_retries, 2);
    }

    #[test]
    fn http_client_builder_selects_builder_source() {
        let config = ClientConfig::default().http_client_builder(reqwest::Client::builder());
        assert!(matches!(config.transport, TransportSource::Builder(_)));
    }

    #[test]
    fn backoff_grows_exponentially_with_jitter() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(100));
        for attempt in 0..3 {
            let base = Duration::from_millis(100) * 2_u32.pow(attempt);
            let backoff = policy.backoff(attempt);
            assert!(backoff >= base.mul_f64(0.75), "attempt {attempt}: {backoff:?}");
            assert!(backoff <= base.mul_f64(1.25), "attempt {attempt}: {backoff:?}");
        }
    }

    #[test]
    fn none_policy_has_no_retries() {
        assert_eq!(RetryPolicy::default().max_retries, 0);
    }
}
