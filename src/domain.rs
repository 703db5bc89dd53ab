use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::TwlError;

/// Forecast region identifier as it appears in bulletin object names,
/// e.g. "atlgulf".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Region {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Region {
    type Err = TwlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit());
        if !is_valid {
            return Err(TwlError::InvalidRegion(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Forecast issue cycle, a UTC hour rendered two-digit ("00", "06", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cycle(u8);

impl Cycle {
    pub fn hour(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for Cycle {
    type Err = TwlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = trimmed.len() == 2 && trimmed.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(TwlError::InvalidCycle(value.to_string()));
        }
        let hour: u8 = trimmed
            .parse()
            .map_err(|_| TwlError::InvalidCycle(value.to_string()))?;
        if hour > 23 {
            return Err(TwlError::InvalidCycle(value.to_string()));
        }
        Ok(Self(hour))
    }
}

/// One fetch attempt: a (region, date, cycle) combination the scheduler
/// tries against the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletinCandidate {
    pub region: Region,
    pub date: NaiveDate,
    pub cycle: Cycle,
}

impl BulletinCandidate {
    /// Date-derived listing prefix, e.g. "nwm.20240101/".
    pub fn prefix(&self) -> String {
        format!("nwm.{}/", self.date.format("%Y%m%d"))
    }

    /// Bulletin object name without any path prefix.
    pub fn object_name(&self) -> String {
        format!(
            "nwm.t{}z.short_range_coastal.total_water.{}.shef",
            self.cycle, self.region
        )
    }
}

/// A single normalized SHEF reading. Time fields stay `None` when the raw
/// row carried an unparsable timestamp; such readings are counted but never
/// emitted into the time-series output.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub station_id: String,
    pub valid_time: Option<DateTime<Utc>>,
    pub creation_time: Option<DateTime<Utc>>,
    pub value: f64,
    pub pe_code: String,
}

impl Reading {
    pub fn is_complete(&self) -> bool {
        self.valid_time.is_some() && self.creation_time.is_some()
    }
}

/// The winning (date, cycle) table for one region. At most one per region
/// per run.
#[derive(Debug, Clone)]
pub struct RegionResult {
    pub region: Region,
    pub date: NaiveDate,
    pub cycle: Cycle,
    pub readings: Vec<Reading>,
    pub records: usize,
    pub stations: usize,
}

/// Per-region entry of the run summary's `downloads` list.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRecord {
    pub date: String,
    pub region: String,
    pub cycle: String,
    pub records: usize,
    pub stations: usize,
}

impl From<&RegionResult> for DownloadRecord {
    fn from(result: &RegionResult) -> Self {
        Self {
            date: result.date.format("%Y-%m-%d").to_string(),
            region: result.region.to_string(),
            cycle: result.cycle.to_string(),
            records: result.records,
            stations: result.stations,
        }
    }
}

/// One entry of `stations.json`.
#[derive(Debug, Clone, Serialize)]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub network: Option<String>,
}

/// One entry of a station's series in `twl_data.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    #[serde(rename = "validTime")]
    pub valid_time: String,
    #[serde(rename = "creationTime")]
    pub creation_time: String,
    pub value: f64,
    #[serde(rename = "peCode")]
    pub pe_code: String,
}

/// `metadata.json` payload. Purely descriptive, never read back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub last_updated: String,
    pub stations_count: usize,
    pub stations_with_data: usize,
    pub total_readings: usize,
    pub downloads: Vec<DownloadRecord>,
    pub regions: Vec<String>,
}

/// Round to a fixed number of decimal places. Idempotent.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_region_valid() {
        let region: Region = " AtlGulf ".parse().unwrap();
        assert_eq!(region.as_str(), "atlgulf");
    }

    #[test]
    fn parse_region_invalid() {
        let err = "atl gulf".parse::<Region>().unwrap_err();
        assert_matches!(err, TwlError::InvalidRegion(_));
    }

    #[test]
    fn parse_cycle_valid() {
        let cycle: Cycle = "06".parse().unwrap();
        assert_eq!(cycle.hour(), 6);
        assert_eq!(cycle.to_string(), "06");
    }

    #[test]
    fn parse_cycle_invalid() {
        assert_matches!("6".parse::<Cycle>().unwrap_err(), TwlError::InvalidCycle(_));
        assert_matches!("24".parse::<Cycle>().unwrap_err(), TwlError::InvalidCycle(_));
    }

    #[test]
    fn candidate_object_naming() {
        let candidate = BulletinCandidate {
            region: "atlgulf".parse().unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            cycle: "18".parse().unwrap(),
        };
        assert_eq!(candidate.prefix(), "nwm.20240101/");
        assert_eq!(
            candidate.object_name(),
            "nwm.t18z.short_range_coastal.total_water.atlgulf.shef"
        );
    }

    #[test]
    fn rounding_is_idempotent() {
        let once = round_to(12.3456789, 4);
        assert_eq!(once, 12.3457);
        assert_eq!(round_to(once, 4), once);

        let lat = round_to(-87.12345649, 6);
        assert_eq!(round_to(lat, 6), lat);

        let elev = round_to(183.999, 2);
        assert_eq!(round_to(elev, 2), elev);
    }
}
