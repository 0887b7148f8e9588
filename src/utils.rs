use std::{fs::File, io::BufReader, path::Path};

use serde::de::DeserializeOwned;

use crate::engine::{Bar, check_ordered};
use crate::errors::{Error, Result};

/// Reads a JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(Error::from)
}

/// Reads bars from a JSON array in `path` and checks they are strictly ordered by time.
pub fn get_bars_from_file(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let bars: Vec<Bar> = read_json(path)?;
    if bars.is_empty() {
        return Err(Error::BarDataEmpty);
    }
    check_ordered(&bars)?;
    for bar in &bars {
        bar.validate()?;
    }
    Ok(bars)
}

/// (De)serializes a `chrono::Duration` as whole seconds.
pub(crate) mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs).ok_or_else(|| serde::de::Error::custom("duration out of range"))
    }
}

/// Same as [`duration_secs`] for an optional duration.
pub(crate) mod opt_duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => serializer.serialize_some(&duration.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            Some(secs) => Duration::try_seconds(secs)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("duration out of range")),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::Duration;

    use super::*;
    use crate::walk_forward::WalkForwardConfig;

    fn write_tmp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("wfbt-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn config_from_json() {
        let path = write_tmp(
            "config.json",
            r#"{ "params": { "initial_size": 10.0 }, "lookback": 86400, "cadence": 3600, "initial_threshold": 1.5 }"#,
        );
        let config = WalkForwardConfig::from_json_file(&path).unwrap();
        assert_eq!(config.params.initial_size, 10.0);
        assert_eq!(config.params.initial_cash, 100_000.0);
        assert_eq!(config.lookback, Duration::days(1));
        assert_eq!(config.cadence, Some(Duration::hours(1)));
        assert_eq!(config.cadence_period(), Duration::hours(1));
        assert_eq!(config.initial_threshold, 1.5);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn config_round_trip_through_json() {
        let config = WalkForwardConfig::default().lookback(Duration::hours(6));
        let json = serde_json::to_string(&config).unwrap();
        let back: WalkForwardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.cadence_period(), Duration::hours(6));
    }

    #[test]
    fn invalid_config_file() {
        let path = write_tmp("bad.json", r#"{ "lookback": 0 }"#);
        assert!(matches!(WalkForwardConfig::from_json_file(&path), Err(Error::NegZeroDuration)));
        std::fs::remove_file(path).unwrap();

        assert!(matches!(
            WalkForwardConfig::from_json_file("/nonexistent/wfbt.json"),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn bars_from_json() {
        let path = write_tmp(
            "bars.json",
            r#"[
                { "time": "2024-01-01T00:00:00Z", "close": 100.0, "fast": 1.0, "slow": 0.0 },
                { "time": "2024-01-01T01:00:00Z", "close": 101.0, "fast": 0.0, "slow": 1.0 }
            ]"#,
        );
        let bars = get_bars_from_file(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close(), 101.0);
        std::fs::remove_file(path).unwrap();

        let path = write_tmp(
            "unordered.json",
            r#"[
                { "time": "2024-01-01T01:00:00Z", "close": 100.0, "fast": 1.0, "slow": 0.0 },
                { "time": "2024-01-01T00:00:00Z", "close": 101.0, "fast": 0.0, "slow": 1.0 }
            ]"#,
        );
        assert!(matches!(get_bars_from_file(&path), Err(Error::UnorderedBars(1))));
        std::fs::remove_file(path).unwrap();

        let path = write_tmp(
            "duplicate.json",
            r#"[
                { "time": "2024-01-01T00:00:00Z", "close": 100.0, "fast": 1.0, "slow": 0.0 },
                { "time": "2024-01-01T01:00:00Z", "close": 101.0, "fast": 0.0, "slow": 1.0 },
                { "time": "2024-01-01T01:00:00Z", "close": 102.0, "fast": 0.0, "slow": 1.0 }
            ]"#,
        );
        assert!(matches!(get_bars_from_file(&path), Err(Error::UnorderedBars(2))));
        std::fs::remove_file(path).unwrap();
    }
}
