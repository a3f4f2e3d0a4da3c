use session::Role;
use tracing::{info, instrument};

use super::{ANY_ROLE, STAFF, path_segment};
use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{
    AttendanceFilters, AttendanceRecord, AttendanceSubmission, ClassAttendance, ManualAttendance,
    SyncBatch, SyncResult,
};

pub struct AttendanceEndpoints<'a> {
    client: &'a ApiClient,
}

impl<'a> AttendanceEndpoints<'a> {
    pub const SUBMIT_ROLES: &'static [Role] = &[Role::Student];
    pub const SYNC_ROLES: &'static [Role] = &[Role::Student];
    pub const BY_CLASS_ROLES: &'static [Role] = ANY_ROLE;
    pub const MANUAL_ROLES: &'static [Role] = STAFF;

    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip_all, target = "gateway", fields(session_id = %submission.session_id()))]
    pub async fn submit(
        &self,
        submission: &AttendanceSubmission,
    ) -> Result<AttendanceRecord, ClientError> {
        self.client.guard().check(Self::SUBMIT_ROLES).await?;
        submission.student_coordinates().validate()?;

        let record: AttendanceRecord = self.client.post("/attendances", submission).await?;
        info!(record_id = %record.id, status = ?record.status, "attendance recorded");
        Ok(record)
    }

    #[instrument(skip_all, target = "gateway", fields(batch = batch.len()))]
    pub async fn sync(&self, batch: &[AttendanceSubmission]) -> Result<SyncResult, ClientError> {
        self.client.guard().check(Self::SYNC_ROLES).await?;

        let result: SyncResult = self
            .client
            .post("/attendances/sync", &SyncBatch { attendances: batch })
            .await?;

        info!(
            success = result.success,
            failed = result.failed,
            skipped = result.skipped,
            "offline attendance synced"
        );
        Ok(result)
    }

    pub async fn by_class(
        &self,
        class_id: &str,
        filters: &AttendanceFilters,
    ) -> Result<ClassAttendance, ClientError> {
        self.client.guard().check(Self::BY_CLASS_ROLES).await?;
        let class_id = path_segment(class_id, "no class selected")?;
        if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
            if start > end {
                return Err(ClientError::Validation(
                    "start date must not be after end date".into(),
                ));
            }
        }

        let path = format!("/attendances/records/class/{class_id}");
        self.client.get_with_query(&path, filters).await
    }

    pub async fn manual(&self, entry: &ManualAttendance) -> Result<AttendanceRecord, ClientError> {
        self.client.guard().check(Self::MANUAL_ROLES).await?;
        entry.validate()?;

        self.client.post("/attendances/manual", entry).await
    }
}
