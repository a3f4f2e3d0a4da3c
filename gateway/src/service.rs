use async_trait::async_trait;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{
    AttendanceRecord, AttendanceSubmission, GenerateQr, QrGrant, QrValidation, SyncResult,
};

/// The slice of the backend the attendance flows depend on.
///
/// [`ApiClient`] is the production implementation; flows take an
/// `Arc<dyn AttendanceApi>` so they can be driven by an in-process fake.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn validate_qr(&self, token: &str) -> Result<QrValidation, ClientError>;

    async fn submit_attendance(
        &self,
        submission: &AttendanceSubmission,
    ) -> Result<AttendanceRecord, ClientError>;

    async fn sync_attendance(
        &self,
        batch: &[AttendanceSubmission],
    ) -> Result<SyncResult, ClientError>;

    async fn generate_qr(&self, request: &GenerateQr) -> Result<QrGrant, ClientError>;
}

#[async_trait]
impl AttendanceApi for ApiClient {
    async fn validate_qr(&self, token: &str) -> Result<QrValidation, ClientError> {
        self.qr().validate(token).await
    }

    async fn submit_attendance(
        &self,
        submission: &AttendanceSubmission,
    ) -> Result<AttendanceRecord, ClientError> {
        self.attendance().submit(submission).await
    }

    async fn sync_attendance(
        &self,
        batch: &[AttendanceSubmission],
    ) -> Result<SyncResult, ClientError> {
        self.attendance().sync(batch).await
    }

    async fn generate_qr(&self, request: &GenerateQr) -> Result<QrGrant, ClientError> {
        self.qr().generate(request).await
    }
}
