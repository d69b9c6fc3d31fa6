//! Duration encoding used by the config file.
//!
//! Durations are plain integers counting nanoseconds, e.g. `1500000000` for
//! one and a half seconds.

/// Serde adapter for `#[serde(with = "duration::nanos")]`.
pub mod nanos {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = u64::try_from(value.as_nanos()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = i64::deserialize(deserializer)?;
        if nanos < 0 {
            return Err(de::Error::custom(format!(
                "duration must not be negative, got {nanos}ns"
            )));
        }
        Ok(Duration::from_nanos(nanos as u64))
    }
}
