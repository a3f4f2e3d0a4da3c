use std::time::Duration;

use async_trait::async_trait;
use gateway::types::Coordinates;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),

    #[error("device reported an invalid position: {0}")]
    Invalid(String),

    #[error("timed out waiting for a location fix")]
    Timeout,
}

/// One-shot device position source. Implementations request the highest
/// accuracy the device offers.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Acquires a single high-accuracy fix, bounded by `timeout`, and rejects
/// positions outside the valid coordinate ranges.
#[instrument(skip_all, target = "location", fields(timeout_ms = timeout.as_millis() as u64))]
pub async fn locate(
    locator: &dyn Geolocator,
    timeout: Duration,
) -> Result<Coordinates, LocationError> {
    let position = tokio::time::timeout(timeout, locator.current_position())
        .await
        .map_err(|_| {
            warn!("location fix timed out");
            LocationError::Timeout
        })??;

    position
        .validate()
        .map_err(|e| LocationError::Invalid(e.to_string()))?;

    debug!(lat = position.latitude, lon = position.longitude, "location acquired");
    Ok(position)
}

/// Locator that always reports the same position, or a configured failure.
/// Used by front ends that take coordinates from the user.
#[derive(Debug, Clone)]
pub struct FixedLocator {
    result: Result<Coordinates, LocationError>,
}

impl FixedLocator {
    pub fn new(position: Coordinates) -> Self {
        Self { result: Ok(position) }
    }

    pub fn failing(err: LocationError) -> Self {
        Self { result: Err(err) }
    }
}

#[async_trait]
impl Geolocator for FixedLocator {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl Geolocator for Stalled {
        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn fixed_position_is_returned() {
        let here = Coordinates::new(12.97, 77.59).unwrap();
        let got = locate(&FixedLocator::new(here), Duration::from_secs(1)).await;
        assert_eq!(got, Ok(here));
    }

    #[tokio::test]
    async fn stalled_locator_times_out() {
        let got = locate(&Stalled, Duration::from_millis(20)).await;
        assert_eq!(got, Err(LocationError::Timeout));
    }

    #[tokio::test]
    async fn out_of_range_fix_is_rejected() {
        let bogus = Coordinates {
            latitude: 91.0,
            longitude: 0.0,
        };
        let got = locate(&FixedLocator::new(bogus), Duration::from_secs(1)).await;
        assert!(matches!(got, Err(LocationError::Invalid(_))));
    }

    #[tokio::test]
    async fn denial_is_passed_through() {
        let locator = FixedLocator::failing(LocationError::PermissionDenied);
        let got = locate(&locator, Duration::from_secs(1)).await;
        assert_eq!(got, Err(LocationError::PermissionDenied));
    }
}
