use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::domain::Reading;
use crate::error::TwlError;

/// Maximum stderr excerpt carried into logs when the transducer fails.
const STDERR_EXCERPT_LEN: usize = 500;

/// External SHEF transducer. `decode` returns `Ok(false)` for a tool-level
/// failure (nonzero exit, empty or missing output), which the fallback loop
/// treats exactly like an absent bulletin.
pub trait ShefDecoder: Send + Sync {
    fn decode(&self, input: &Path, output: &Path) -> Result<bool, TwlError>;
}

/// `shefParser` invoked as a subprocess with the fixed whitespace-delimited
/// output format.
#[derive(Debug, Clone)]
pub struct SystemShefDecoder {
    exe: PathBuf,
}

impl SystemShefDecoder {
    /// One-time provisioning check. When the parser is absent, tries exactly
    /// one remediation (`pip install shef-parser`) before giving up.
    pub fn provision() -> Result<Self, TwlError> {
        if let Some(exe) = find_in_path("shefParser") {
            return Ok(Self { exe });
        }

        warn!("shefParser not found on PATH, attempting pip install");
        let install = Command::new("python3")
            .args(["-m", "pip", "install", "shef-parser"])
            .output()
            .map_err(|err| TwlError::MissingTool(format!("pip install failed: {err}")))?;
        if !install.status.success() {
            let stderr = String::from_utf8_lossy(&install.stderr).trim().to_string();
            return Err(TwlError::MissingTool(format!(
                "shefParser (pip install failed: {stderr})"
            )));
        }

        find_in_path("shefParser")
            .map(|exe| Self { exe })
            .ok_or_else(|| TwlError::MissingTool("shefParser still missing after install".to_string()))
    }

    /// Strict lookup: the parser must already be on PATH, no remediation is
    /// attempted.
    pub fn from_path() -> Result<Self, TwlError> {
        find_in_path("shefParser")
            .map(|exe| Self { exe })
            .ok_or_else(|| TwlError::MissingTool("shefParser".to_string()))
    }

    pub fn new_with_exe(exe: PathBuf) -> Self {
        Self { exe }
    }
}

impl ShefDecoder for SystemShefDecoder {
    fn decode(&self, input: &Path, output: &Path) -> Result<bool, TwlError> {
        let result = Command::new(&self.exe)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-f")
            .arg("1")
            .output()
            .map_err(|err| TwlError::DecodeFailed(err.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let excerpt: String = stderr.chars().take(STDERR_EXCERPT_LEN).collect();
            warn!(stderr = %excerpt.trim(), "shefParser exited with an error");
            return Ok(false);
        }

        let size = std::fs::metadata(output).map(|meta| meta.len()).unwrap_or(0);
        if size == 0 {
            warn!("shefParser produced empty output");
            return Ok(false);
        }

        Ok(true)
    }
}

/// Load decoded SHEF text into readings. The layout is a fixed 13-column
/// whitespace-delimited table: station id, valid date, valid time, creation
/// date, creation time, PE code, value, tz, duration, qualifier, revision,
/// product id, source. Rows with a different shape or a non-numeric value
/// are skipped; unparsable timestamps become `None` fields on the reading.
pub fn normalize_report(text: &str) -> Vec<Reading> {
    let mut readings = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 13 {
            debug!(columns = fields.len(), "skipping malformed shef row");
            continue;
        }
        let Ok(value) = fields[6].parse::<f64>() else {
            debug!(value = fields[6], "skipping shef row with non-numeric value");
            continue;
        };

        readings.push(Reading {
            station_id: fields[0].to_string(),
            valid_time: parse_utc(fields[1], fields[2]),
            creation_time: parse_utc(fields[3], fields[4]),
            value,
            pe_code: fields[5].to_string(),
        });
    }

    readings
}

/// Build an absolute UTC timestamp from split date/time columns.
fn parse_utc(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let stamp = format!("{date}T{time}Z");
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&stamp) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    find_in_dirs(name, &path_var)
}

fn find_in_dirs(name: &str, path_var: &std::ffi::OsStr) -> Option<PathBuf> {
    for path in std::env::split_paths(path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const ROW: &str =
        "ABCD 2024-01-01 06:00:00 2024-01-01 00:30:00 HM 1.2345 Z 0 Z 0 TWLDAT1 NWM";

    #[test]
    fn normalize_parses_full_row() {
        let readings = normalize_report(ROW);
        assert_eq!(readings.len(), 1);

        let reading = &readings[0];
        assert_eq!(reading.station_id, "ABCD");
        assert_eq!(reading.pe_code, "HM");
        assert_eq!(reading.value, 1.2345);
        assert_eq!(
            reading.valid_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap())
        );
        assert_eq!(
            reading.creation_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap())
        );
        assert!(reading.is_complete());
    }

    #[test]
    fn normalize_keeps_row_with_bad_timestamp_as_incomplete() {
        let row = "ABCD 2024-13-99 06:00:00 2024-01-01 00:30:00 HM 1.0 Z 0 Z 0 TWLDAT1 NWM";
        let readings = normalize_report(row);
        assert_eq!(readings.len(), 1);
        assert!(readings[0].valid_time.is_none());
        assert!(readings[0].creation_time.is_some());
        assert!(!readings[0].is_complete());
    }

    #[test]
    fn normalize_skips_ragged_rows() {
        let text = format!("ABCD 2024-01-01\n{ROW}\n\n");
        let readings = normalize_report(&text);
        assert_eq!(readings.len(), 1);
    }

    #[test]
    fn normalize_skips_non_numeric_value() {
        let row = "ABCD 2024-01-01 06:00:00 2024-01-01 00:30:00 HM n/a Z 0 Z 0 TWLDAT1 NWM";
        assert!(normalize_report(row).is_empty());
    }

    #[test]
    fn find_in_dirs_locates_the_parser() {
        let temp = tempfile::tempdir().unwrap();
        let exe = temp.path().join("shefParser");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();

        let path_var = std::env::join_paths([temp.path()]).unwrap();
        assert_eq!(find_in_dirs("shefParser", &path_var), Some(exe));
    }

    #[test]
    fn find_in_dirs_reports_missing_parser() {
        let temp = tempfile::tempdir().unwrap();
        let path_var = std::env::join_paths([temp.path()]).unwrap();
        assert_eq!(find_in_dirs("shefParser", &path_var), None);
    }

    #[test]
    fn parse_utc_accepts_minute_precision() {
        let parsed = parse_utc("2024-01-01", "06:00");
        assert_eq!(
            parsed,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap())
        );
    }
}
