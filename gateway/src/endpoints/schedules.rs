use session::Role;

use super::{ANY_ROLE, STAFF, path_segment};
use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{NewSchedule, Schedule};

pub struct ScheduleEndpoints<'a> {
    client: &'a ApiClient,
}

impl<'a> ScheduleEndpoints<'a> {
    pub const READ_ROLES: &'static [Role] = ANY_ROLE;
    pub const WRITE_ROLES: &'static [Role] = STAFF;

    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, schedule: &NewSchedule) -> Result<Schedule, ClientError> {
        self.client.guard().check(Self::WRITE_ROLES).await?;
        schedule.location.validate()?;
        self.client.post("/schedule", schedule).await
    }

    pub async fn by_class(&self, class_id: &str) -> Result<Vec<Schedule>, ClientError> {
        self.client.guard().check(Self::READ_ROLES).await?;
        let class_id = path_segment(class_id, "no class selected")?;
        self.client.get(&format!("/schedule/{class_id}")).await
    }
}
