use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use session::SessionStore;
use tracing::{debug, error, instrument, warn};

use crate::config::ApiConfig;
use crate::endpoints::{
    AttendanceEndpoints, AuditEndpoints, AuthEndpoints, ClassEndpoints, QrEndpoints,
    ScheduleEndpoints, UserEndpoints,
};
use crate::error::ClientError;
use crate::guard::RoleGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    Anonymous,
}

/// HTTP gateway to the attendance backend.
///
/// Attaches the stored bearer token to every request, normalizes error
/// responses into [`ClientError`], and clears the session when the backend
/// rejects a token it was sent.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: SessionStore,
    guard: RoleGuard,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: SessionStore) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            guard: RoleGuard::new(session.clone()),
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn guard(&self) -> &RoleGuard {
        &self.guard
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> AuthEndpoints<'_> {
        AuthEndpoints::new(self)
    }

    pub fn qr(&self) -> QrEndpoints<'_> {
        QrEndpoints::new(self)
    }

    pub fn attendance(&self) -> AttendanceEndpoints<'_> {
        AttendanceEndpoints::new(self)
    }

    pub fn audit(&self) -> AuditEndpoints<'_> {
        AuditEndpoints::new(self)
    }

    pub fn classes(&self) -> ClassEndpoints<'_> {
        ClassEndpoints::new(self)
    }

    pub fn schedules(&self) -> ScheduleEndpoints<'_> {
        ScheduleEndpoints::new(self)
    }

    pub fn users(&self) -> UserEndpoints<'_> {
        UserEndpoints::new(self)
    }

    pub(crate) async fn get<T>(&self, path: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        self.execute(Method::GET, path, Auth::Bearer, |req| req).await
    }

    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.execute(Method::GET, path, Auth::Bearer, |req| req.query(query))
            .await
    }

    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(Method::POST, path, Auth::Bearer, |req| req.json(body))
            .await
    }

    /// POST without the stored token. A 401 here is a plain rejection of the
    /// request, never an expired session.
    pub(crate) async fn post_anonymous<T, B>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(Method::POST, path, Auth::Anonymous, |req| req.json(body))
            .await
    }

    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(Method::PUT, path, Auth::Bearer, |req| req.json(body))
            .await
    }

    #[instrument(
        skip_all,
        target = "gateway",
        fields(method = %method, path = %path, status = tracing::field::Empty)
    )]
    async fn execute<T, F>(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        build: F,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut req = build(self.http.request(method, &url));

        let token = match auth {
            Auth::Bearer => self.session.token().await,
            Auth::Anonymous => None,
        };
        let authenticated = token.is_some();
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            let err = ClientError::from_transport(e);
            warn!(error = %err, "request did not complete");
            err
        })?;

        let status = resp.status();
        tracing::Span::current().record("status", status.as_u16());

        if status == StatusCode::UNAUTHORIZED && authenticated {
            warn!("backend rejected the session token; clearing session");
            if let Err(e) = self.session.clear().await {
                // next login overwrites whatever survived
                error!(error = %e, "failed to clear expired session");
            }
            return Err(ClientError::SessionExpired);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = ClientError::from_response(status.as_u16(), status.canonical_reason(), &body);
            warn!(error = %err, "backend rejected request");
            return Err(err);
        }

        let bytes = resp.bytes().await.map_err(ClientError::from_transport)?;
        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes[..]
        };

        let parsed = serde_json::from_slice(body).map_err(|e| ClientError::Api {
            message: format!("invalid response from server: {e}"),
            status: status.as_u16(),
        })?;

        debug!("request succeeded");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn trailing_slash_is_stripped() {
        let cfg = ApiConfig {
            base_url: "http://localhost:5001/api/".into(),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&cfg, SessionStore::new(Arc::new(MemoryStore::new()))).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5001/api");
    }
}
