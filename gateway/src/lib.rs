pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod guard;
pub mod service;
pub mod types;

pub use client::ApiClient;
pub use config::ApiConfig;
pub use error::ClientError;
pub use guard::RoleGuard;
pub use service::AttendanceApi;
