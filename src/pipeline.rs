use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::aggregate::{build_summary, build_time_series};
use crate::config::PipelineConfig;
use crate::domain::{Reading, Region, RegionResult, RunSummary};
use crate::error::TwlError;
use crate::iem::{MetadataFeed, load_station_metadata, match_stations};
use crate::nwm::{BulletinStore, locate_bulletin};
use crate::schedule::candidates_for;
use crate::shef::{ShefDecoder, normalize_report};
use crate::store::OutputStore;

/// The run pipeline, generic over its three external collaborators so the
/// fallback logic can be exercised against fakes.
pub struct Pipeline<S: BulletinStore, D: ShefDecoder, F: MetadataFeed> {
    config: PipelineConfig,
    output: OutputStore,
    bulletins: S,
    decoder: D,
    feed: F,
}

impl<S: BulletinStore, D: ShefDecoder, F: MetadataFeed> Pipeline<S, D, F> {
    pub fn new(config: PipelineConfig, bulletins: S, decoder: D, feed: F) -> Self {
        let output = OutputStore::new(config.data_dir.clone());
        Self {
            config,
            output,
            bulletins,
            decoder,
            feed,
        }
    }

    /// Execute one full run: fallback retrieval per region, metadata match,
    /// aggregation, and artifact writing. Nothing is written unless at least
    /// one region produced a bulletin.
    pub fn run(&self) -> Result<RunSummary, TwlError> {
        info!(
            run_time = %Utc::now().format("%Y-%m-%d %H:%M:%S"),
            regions = self.config.regions.len(),
            "starting coastal TWL forecast run"
        );

        let work_dir = tempfile::Builder::new()
            .prefix("twl-pipeline")
            .tempdir()
            .map_err(|err| TwlError::Filesystem(err.to_string()))?;

        let today = Utc::now().date_naive();
        let mut results = Vec::new();
        for region in &self.config.regions {
            match self.fetch_region(region, today, work_dir.path())? {
                Some(result) => results.push(result),
                None => warn!(region = %region, "all candidates exhausted for region"),
            }
        }

        if results.is_empty() {
            return Err(TwlError::NoData);
        }

        let station_ids: HashSet<String> = results
            .iter()
            .flat_map(|result| result.readings.iter())
            .map(|reading| reading.station_id.clone())
            .collect();

        let meta = load_station_metadata(
            &self.feed,
            self.output.metadata_cache_path().as_std_path(),
        );
        let stations = match_stations(&meta, &station_ids);

        let all_readings: Vec<Reading> = results
            .iter()
            .flat_map(|result| result.readings.iter().cloned())
            .collect();
        let series = build_time_series(&all_readings);
        let summary = build_summary(&results, &stations, &series, &self.config.regions);

        self.output.ensure_data_dir()?;
        self.output.write_json(&self.output.stations_path(), &stations)?;
        self.output.write_json(&self.output.series_path(), &series)?;
        self.output.write_json(&self.output.summary_path(), &summary)?;

        info!(
            stations = summary.stations_count,
            stations_with_data = summary.stations_with_data,
            readings = summary.total_readings,
            data_dir = %self.output.data_dir(),
            "run completed"
        );
        Ok(summary)
    }

    /// Walk the region's candidate list in priority order and stop at the
    /// first candidate that yields a non-empty normalized table. An absent
    /// bulletin and a failed decode both just advance to the next candidate.
    fn fetch_region(
        &self,
        region: &Region,
        today: NaiveDate,
        work_dir: &Path,
    ) -> Result<Option<RegionResult>, TwlError> {
        for candidate in candidates_for(region, today, &self.config.cycles) {
            info!(
                region = %candidate.region,
                date = %candidate.date,
                cycle = %candidate.cycle,
                "trying candidate"
            );

            let Some(raw_path) = locate_bulletin(&self.bulletins, &candidate, work_dir)? else {
                info!("bulletin not published, trying next candidate");
                continue;
            };

            let decoded_path = raw_path.with_extension("txt");
            if !self.decoder.decode(&raw_path, &decoded_path)? {
                warn!("decode failed, trying next candidate");
                continue;
            }

            let text = fs::read_to_string(&decoded_path)
                .map_err(|err| TwlError::Filesystem(err.to_string()))?;
            let readings = normalize_report(&text);
            if readings.is_empty() {
                warn!("bulletin decoded to zero records, trying next candidate");
                continue;
            }

            let stations = readings
                .iter()
                .map(|reading| reading.station_id.as_str())
                .collect::<HashSet<_>>()
                .len();
            info!(records = readings.len(), stations, "bulletin accepted");

            return Ok(Some(RegionResult {
                region: candidate.region.clone(),
                date: candidate.date,
                cycle: candidate.cycle,
                records: readings.len(),
                stations,
                readings,
            }));
        }

        Ok(None)
    }
}
