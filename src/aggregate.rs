use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};

use crate::domain::{
    DownloadRecord, Reading, Region, RegionResult, RunSummary, StationRecord, TimeSeriesPoint,
    round_to,
};

/// Group readings by station and sort each station's series ascending by
/// valid time. Readings with missing timestamps are dropped here, and a
/// station whose readings are all incomplete is omitted entirely.
pub fn build_time_series(readings: &[Reading]) -> BTreeMap<String, Vec<TimeSeriesPoint>> {
    let mut groups: BTreeMap<String, Vec<&Reading>> = BTreeMap::new();
    for reading in readings.iter().filter(|reading| reading.is_complete()) {
        groups
            .entry(reading.station_id.clone())
            .or_default()
            .push(reading);
    }

    let mut series = BTreeMap::new();
    for (station_id, mut group) in groups {
        // sort_by is stable, so ties keep their input order.
        group.sort_by_key(|reading| reading.valid_time);
        let points = group
            .into_iter()
            .map(|reading| TimeSeriesPoint {
                valid_time: format_utc(reading.valid_time),
                creation_time: format_utc(reading.creation_time),
                value: round_to(reading.value, 4),
                pe_code: reading.pe_code.clone(),
            })
            .collect();
        series.insert(station_id, points);
    }
    series
}

pub fn build_summary(
    results: &[RegionResult],
    stations: &[StationRecord],
    series: &BTreeMap<String, Vec<TimeSeriesPoint>>,
    regions: &[Region],
) -> RunSummary {
    RunSummary {
        last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        stations_count: stations.len(),
        stations_with_data: series.len(),
        total_readings: results.iter().map(|result| result.records).sum(),
        downloads: results.iter().map(DownloadRecord::from).collect(),
        regions: regions.iter().map(|region| region.to_string()).collect(),
    }
}

fn format_utc(time: Option<chrono::DateTime<Utc>>) -> String {
    time.map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn reading(station: &str, hour: u32, value: f64) -> Reading {
        Reading {
            station_id: station.to_string(),
            valid_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()),
            creation_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            value,
            pe_code: "HM".to_string(),
        }
    }

    #[test]
    fn series_sorted_ascending_by_valid_time() {
        let readings = vec![
            reading("ABCD", 6, 1.0),
            reading("ABCD", 3, 2.0),
            reading("ABCD", 12, 3.0),
        ];

        let series = build_time_series(&readings);
        let points = &series["ABCD"];
        let times: Vec<&str> = points.iter().map(|point| point.valid_time.as_str()).collect();
        assert_eq!(
            times,
            [
                "2024-01-01T03:00:00Z",
                "2024-01-01T06:00:00Z",
                "2024-01-01T12:00:00Z",
            ]
        );
    }

    #[test]
    fn sort_is_stable_on_tied_valid_times() {
        let readings = vec![reading("ABCD", 6, 1.0), reading("ABCD", 6, 2.0)];

        let series = build_time_series(&readings);
        let values: Vec<f64> = series["ABCD"].iter().map(|point| point.value).collect();
        assert_eq!(values, [1.0, 2.0]);
    }

    #[test]
    fn incomplete_readings_never_reach_the_series() {
        let mut incomplete = reading("ABCD", 6, 1.0);
        incomplete.valid_time = None;
        let readings = vec![incomplete, reading("EFGH", 3, 2.5)];

        let series = build_time_series(&readings);
        assert!(!series.contains_key("ABCD"));
        assert_eq!(series["EFGH"].len(), 1);
    }

    #[test]
    fn values_rounded_to_four_decimals() {
        let readings = vec![reading("ABCD", 6, 1.23456789)];
        let series = build_time_series(&readings);
        assert_eq!(series["ABCD"][0].value, 1.2346);
    }

    #[test]
    fn summary_counts() {
        let region: Region = "atlgulf".parse().unwrap();
        let results = vec![RegionResult {
            region: region.clone(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            cycle: "06".parse().unwrap(),
            readings: vec![reading("ABCD", 6, 1.0)],
            records: 3,
            stations: 1,
        }];
        let series = build_time_series(&results[0].readings);

        let summary = build_summary(&results, &[], &series, &[region]);
        assert_eq!(summary.total_readings, 3);
        assert_eq!(summary.stations_count, 0);
        assert_eq!(summary.stations_with_data, 1);
        assert_eq!(summary.downloads.len(), 1);
        assert_eq!(summary.downloads[0].cycle, "06");
        assert_eq!(summary.regions, ["atlgulf"]);
    }
}
