use session::Role;

use super::{ANY_ROLE, STAFF, path_segment};
use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{Class, Enrollment, MessageResponse, NewClass};

pub struct ClassEndpoints<'a> {
    client: &'a ApiClient,
}

impl<'a> ClassEndpoints<'a> {
    pub const READ_ROLES: &'static [Role] = ANY_ROLE;
    pub const WRITE_ROLES: &'static [Role] = STAFF;

    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Classes visible to the caller (enrolled or taught).
    pub async fn all(&self) -> Result<Vec<Class>, ClientError> {
        self.client.guard().check(Self::READ_ROLES).await?;
        self.client.get("/classes").await
    }

    pub async fn by_id(&self, class_id: &str) -> Result<Class, ClientError> {
        self.client.guard().check(Self::READ_ROLES).await?;
        let class_id = path_segment(class_id, "no class selected")?;
        self.client.get(&format!("/classes/{class_id}")).await
    }

    pub async fn create(&self, class: &NewClass) -> Result<Class, ClientError> {
        self.client.guard().check(Self::WRITE_ROLES).await?;
        self.client.post("/classes", class).await
    }

    pub async fn enroll_student(
        &self,
        enrollment: &Enrollment,
    ) -> Result<MessageResponse, ClientError> {
        self.client.guard().check(Self::WRITE_ROLES).await?;
        self.client.post("/classes/enroll", enrollment).await
    }
}
