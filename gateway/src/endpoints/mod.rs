//! Endpoint groups. Each method checks its required roles inline through
//! the client's [`RoleGuard`](crate::guard::RoleGuard) before any request is
//! built.
mod attendance;
mod audit;
mod auth;
mod classes;
mod qr;
mod schedules;
mod users;

pub use attendance::AttendanceEndpoints;
pub use audit::AuditEndpoints;
pub use auth::AuthEndpoints;
pub use classes::ClassEndpoints;
pub use qr::QrEndpoints;
pub use schedules::ScheduleEndpoints;
pub use users::UserEndpoints;

use session::Role;

use crate::error::ClientError;

pub const ANY_ROLE: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub const STAFF: &[Role] = &[Role::Teacher, Role::Admin];

/// An id interpolated into a request path. Blank ids would hit the
/// collection route, and separators would address a different resource.
pub(crate) fn path_segment<'a>(id: &'a str, missing: &str) -> Result<&'a str, ClientError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ClientError::validation(missing));
    }
    if id.contains(['/', '?', '#', '%']) || id.contains(char::is_whitespace) {
        return Err(ClientError::validation(format!("invalid id: {id:?}")));
    }
    Ok(id)
}
