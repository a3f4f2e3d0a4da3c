use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Backend root including the `/api` prefix, without a trailing slash.
    pub base_url: String,

    /// Upper bound for a whole request (connect + send + body).
    ///
    /// Every call the scan flow makes is bounded by this; an expired
    /// timeout surfaces as `ClientError::Timeout` and sends the
    /// submission to the outbox.
    pub request_timeout: Duration,

    /// Upper bound for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
}

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001/api";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] but reads through `lookup`, so tests do
    /// not have to touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let millis = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        Self {
            base_url: normalize_base_url(
                lookup("ROLLCALL_API_URL").unwrap_or(defaults.base_url),
            ),
            request_timeout: millis("ROLLCALL_HTTP_TIMEOUT_MS", defaults.request_timeout),
            connect_timeout: millis("ROLLCALL_CONNECT_TIMEOUT_MS", defaults.connect_timeout),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
