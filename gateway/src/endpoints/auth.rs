use session::Session;
use tracing::{info, instrument, warn};

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{AuthResponse, Credentials, ForgotPassword, MessageResponse, Registration};

/// Login, registration and logout. These are the only calls (besides the
/// gateway's 401 handling) that write the session. Requests here never carry
/// the stored token.
pub struct AuthEndpoints<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthEndpoints<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip_all, target = "gateway")]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ClientError> {
        credentials.validate()?;

        let resp: AuthResponse = self
            .client
            .post_anonymous("/auth/login", credentials)
            .await?;
        self.establish(resp).await
    }

    /// Registers and establishes the session. Backends that answer
    /// registration without a token get a follow-up login with the same
    /// credentials.
    #[instrument(skip_all, target = "gateway", fields(role = %registration.role))]
    pub async fn register(&self, registration: &Registration) -> Result<Session, ClientError> {
        registration.validate()?;

        let resp: AuthResponse = self
            .client
            .post_anonymous("/auth/register", registration)
            .await?;
        if resp.token.as_deref().is_some_and(|t| !t.is_empty()) {
            return self.establish(resp).await;
        }

        info!("registration returned no token; logging in");
        self.login(&registration.credentials()).await
    }

    /// Clears the local session. Storage failures are surfaced; a failed
    /// logout is never reported as a success.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.client.session().clear().await?;
        info!(target: "gateway", "logged out");
        Ok(())
    }

    pub async fn forgot_password(
        &self,
        identifier: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = ForgotPassword::from_identifier(identifier)?;
        self.client.post_anonymous("/auth/forgot-password", &body).await
    }

    async fn establish(&self, resp: AuthResponse) -> Result<Session, ClientError> {
        let (token, user) = match (resp.token, resp.user) {
            (Some(token), Some(user)) if !token.is_empty() && user.is_complete() => (token, user),
            _ => {
                warn!("auth response is missing token or user");
                return Err(ClientError::Api {
                    message: "Invalid response from server".into(),
                    status: 200,
                });
            }
        };

        let session = Session::new(token, user);
        // If this fails the session is treated as unestablished.
        self.client.session().save(&session).await?;

        info!(user_id = %session.user.id, role = %session.role, "session established");
        Ok(session)
    }
}
