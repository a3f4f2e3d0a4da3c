//! Student check-in and teacher QR session flows on top of the gateway.
pub mod biometrics;
pub mod config;
pub mod location;
pub mod outbox;
pub mod qr_session;
pub mod scan;

pub use biometrics::{BiometricSample, BiometricSource, PlaceholderBiometrics};
pub use config::FlowConfig;
pub use location::{FixedLocator, Geolocator, LocationError};
pub use outbox::{Outbox, SyncReport};
pub use qr_session::{QrSession, QrSessionError, QrSessionFlow};
pub use scan::{DecodeOutcome, ScanFailure, ScanFlow, ScanMachine, ScanPhase, Ticket};
