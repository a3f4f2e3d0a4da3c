use session::{Role, User};

use super::{ANY_ROLE, STAFF};
use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{ChangePassword, MessageResponse};

pub struct UserEndpoints<'a> {
    client: &'a ApiClient,
}

impl<'a> UserEndpoints<'a> {
    pub const STUDENTS_ROLES: &'static [Role] = STAFF;
    pub const CHANGE_PASSWORD_ROLES: &'static [Role] = ANY_ROLE;

    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn students(&self) -> Result<Vec<User>, ClientError> {
        self.client.guard().check(Self::STUDENTS_ROLES).await?;
        self.client.get("/users/students").await
    }

    pub async fn change_password(
        &self,
        change: &ChangePassword,
    ) -> Result<MessageResponse, ClientError> {
        self.client.guard().check(Self::CHANGE_PASSWORD_ROLES).await?;
        self.client.put("/users/change-password", change).await
    }
}
