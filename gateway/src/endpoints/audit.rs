use session::Role;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{AuditFilters, AuditLog};

pub struct AuditEndpoints<'a> {
    client: &'a ApiClient,
}

impl<'a> AuditEndpoints<'a> {
    pub const LOGS_ROLES: &'static [Role] = &[Role::Admin];

    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn logs(&self, filters: &AuditFilters) -> Result<Vec<AuditLog>, ClientError> {
        self.client.guard().check(Self::LOGS_ROLES).await?;
        self.client.get_with_query("/audit-logs", filters).await
    }
}
