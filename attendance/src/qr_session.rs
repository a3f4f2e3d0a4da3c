use std::sync::Arc;

use chrono::{DateTime, Utc};
use gateway::endpoints::QrEndpoints;
use gateway::types::{GenerateQr, QrGrant};
use gateway::{AttendanceApi, ClientError, RoleGuard};
use qrcode::QrCode;
use qrcode::render::{svg, unicode};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::FlowConfig;
use crate::location::{Geolocator, LocationError, locate};

const TOKEN_PREVIEW_LEN: usize = 10;

#[derive(Error, Debug)]
pub enum QrSessionError {
    #[error("{0}")]
    Validation(String),

    #[error("could not get your location: {0}")]
    Location(#[from] LocationError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to render QR code: {0}")]
    Render(String),
}

impl QrSessionError {
    pub fn requires_login(&self) -> bool {
        matches!(self, QrSessionError::Client(e) if e.requires_login())
    }
}

/// A live code a teacher shows to the room.
///
/// The expiry is the server's; [`QrSession::looks_expired`] is only a hint
/// for the display, the backend decides whether a scan still counts.
#[derive(Debug, Clone, PartialEq)]
pub struct QrSession {
    pub session_id: String,
    pub token: String,
    pub expired_at: DateTime<Utc>,
    visible: bool,
}

impl From<QrGrant> for QrSession {
    fn from(grant: QrGrant) -> Self {
        Self {
            session_id: grant.session_id,
            token: grant.token,
            expired_at: grant.expired_at,
            visible: true,
        }
    }
}

impl QrSession {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn looks_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expired_at
    }

    /// First few characters of the token for on-screen reference.
    pub fn short_token(&self) -> String {
        let mut chars = self.token.chars();
        let head: String = chars.by_ref().take(TOKEN_PREVIEW_LEN).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }

    /// Half-block rendering for terminals with a dark background.
    pub fn render_terminal(&self) -> Result<String, QrSessionError> {
        Ok(self
            .code()?
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(true)
            .build())
    }

    pub fn render_svg(&self) -> Result<String, QrSessionError> {
        Ok(self
            .code()?
            .render::<svg::Color>()
            .min_dimensions(200, 200)
            .dark_color(svg::Color("#6200ea"))
            .light_color(svg::Color("#ffffff"))
            .build())
    }

    fn code(&self) -> Result<QrCode, QrSessionError> {
        QrCode::new(self.token.as_bytes()).map_err(|e| QrSessionError::Render(e.to_string()))
    }
}

/// Teacher side: issue a code for one class meeting.
#[derive(Clone)]
pub struct QrSessionFlow {
    api: Arc<dyn AttendanceApi>,
    guard: RoleGuard,
    locator: Arc<dyn Geolocator>,
    config: FlowConfig,
}

impl QrSessionFlow {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        guard: RoleGuard,
        locator: Arc<dyn Geolocator>,
        config: FlowConfig,
    ) -> Self {
        Self {
            api,
            guard,
            locator,
            config,
        }
    }

    /// Checks inputs and role before asking for a location fix, so a
    /// student or an empty form never triggers a location prompt.
    #[instrument(
        skip_all,
        target = "qr_session",
        fields(class_id = %class_id, schedule_id = %schedule_id)
    )]
    pub async fn generate(
        &self,
        class_id: &str,
        schedule_id: &str,
    ) -> Result<QrSession, QrSessionError> {
        if class_id.trim().is_empty() || schedule_id.trim().is_empty() {
            return Err(QrSessionError::Validation(
                "select a class and a schedule first".into(),
            ));
        }

        self.guard.check(QrEndpoints::GENERATE_ROLES).await?;

        let coordinates = locate(self.locator.as_ref(), self.config.location_timeout)
            .await
            .inspect_err(|e| warn!(error = %e, "no location for qr session"))?;

        let request = GenerateQr {
            class_id: class_id.to_string(),
            schedule_id: schedule_id.to_string(),
            coordinates,
        };
        let grant = self
            .api
            .generate_qr(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "qr generation failed"))?;

        info!(session_id = %grant.session_id, expired_at = %grant.expired_at, "qr session ready");
        Ok(grant.into())
    }
}
