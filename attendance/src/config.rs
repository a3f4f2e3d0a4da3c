use std::time::Duration;

#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// Bound on a single location fix, for both check-in and QR issuance.
    pub location_timeout: Duration,

    /// Network calls slower than this are flagged in the `performance` log.
    pub slow_call: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            location_timeout: Duration::from_secs(15),
            slow_call: Duration::from_secs(3),
        }
    }
}

impl FlowConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let location_timeout = lookup("ROLLCALL_LOCATION_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.location_timeout);

        Self {
            location_timeout,
            ..defaults
        }
    }
}
