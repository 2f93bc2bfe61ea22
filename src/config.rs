//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default robot address on its own access point.
pub const DEFAULT_ADDRESS: &str = "192.168.2.1";

/// Link cadence: the device's connection supervision expects a command
/// roughly every 25 ms (40 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(25);

/// Configuration for a robot session.
///
/// All fields have conservative defaults matching the device's stock setup,
/// so `SessionConfig::default()` is enough for a robot on its own WiFi
/// access point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Robot IP address.
    pub address: String,

    /// How long `connect` waits for the transport before failing.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Keepalive / hold-loop cadence.
    #[serde(with = "duration_secs")]
    pub tick_interval: Duration,

    /// Grace period for background tasks to finish on disconnect before
    /// they are abandoned.
    #[serde(with = "duration_secs")]
    pub disconnect_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            connect_timeout: Duration::from_secs(5),
            tick_interval: TICK_INTERVAL,
            disconnect_grace: Duration::from_millis(500),
        }
    }
}

impl SessionConfig {
    /// Config for a robot at a non-default address.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self { address: address.into(), ..Self::default() }
    }
}

mod duration_secs {
    //! Serialize durations as fractional seconds, the unit the caller-facing
    //! tool layer already speaks.

    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
