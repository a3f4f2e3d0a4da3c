use session::Role;
use tracing::{info, instrument};

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{GenerateQr, QrGrant, QrValidation, ValidateQr};

pub struct QrEndpoints<'a> {
    client: &'a ApiClient,
}

impl<'a> QrEndpoints<'a> {
    pub const GENERATE_ROLES: &'static [Role] = &[Role::Teacher];
    pub const VALIDATE_ROLES: &'static [Role] = &[Role::Student];

    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    #[instrument(
        skip_all,
        target = "gateway",
        fields(class_id = %req.class_id, schedule_id = %req.schedule_id)
    )]
    pub async fn generate(&self, req: &GenerateQr) -> Result<QrGrant, ClientError> {
        self.client.guard().check(Self::GENERATE_ROLES).await?;
        req.coordinates.validate()?;

        let grant: QrGrant = self.client.post("/qr/generate", req).await?;
        info!(session_id = %grant.session_id, expired_at = %grant.expired_at, "qr session issued");
        Ok(grant)
    }

    /// The token is forwarded untouched; only the backend can judge it.
    pub async fn validate(&self, token: &str) -> Result<QrValidation, ClientError> {
        self.client.guard().check(Self::VALIDATE_ROLES).await?;
        if token.trim().is_empty() {
            return Err(ClientError::Validation("QR payload is empty".into()));
        }

        self.client.post("/qr/validate", &ValidateQr { token }).await
    }
}
