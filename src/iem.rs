use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{StationRecord, round_to};
use crate::error::TwlError;

/// One row of the station directory, in the feed's own column names. The
/// cached snapshot on disk is a JSON array of the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationMeta {
    pub stid: String,
    #[serde(default)]
    pub station_name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub elev: Option<f64>,
    #[serde(default)]
    pub iem_network: Option<String>,
}

pub trait MetadataFeed: Send + Sync {
    fn fetch_stations(&self) -> Result<Vec<StationMeta>, TwlError>;
}

/// IEM network directory over HTTP, CSV format.
#[derive(Clone)]
pub struct IemHttpClient {
    client: Client,
    url: String,
}

impl IemHttpClient {
    pub fn new(url: &str) -> Result<Self, TwlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("twl-pipeline/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| TwlError::FeedHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| TwlError::FeedHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl MetadataFeed for IemHttpClient {
    fn fetch_stations(&self) -> Result<Vec<StationMeta>, TwlError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|err| TwlError::FeedHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "metadata feed request failed".to_string());
            return Err(TwlError::FeedStatus { status, message });
        }
        let text = response
            .text()
            .map_err(|err| TwlError::FeedHttp(err.to_string()))?;
        parse_station_csv(&text)
    }
}

/// Parse the feed's CSV body. Columns are located by header name; rows with
/// a missing id or unparsable coordinates are dropped.
pub fn parse_station_csv(text: &str) -> Result<Vec<StationMeta>, TwlError> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| TwlError::FeedParse("empty response".to_string()))?;
    let columns = split_csv_line(header);
    let index_of = |name: &str| columns.iter().position(|column| column == name);

    let stid_idx = index_of("stid")
        .ok_or_else(|| TwlError::FeedParse("missing stid column".to_string()))?;
    let lat_idx = index_of("lat")
        .ok_or_else(|| TwlError::FeedParse("missing lat column".to_string()))?;
    let lon_idx = index_of("lon")
        .ok_or_else(|| TwlError::FeedParse("missing lon column".to_string()))?;
    let name_idx = index_of("station_name");
    let elev_idx = index_of("elev");
    let network_idx = index_of("iem_network");

    let mut stations = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let Some(stid) = fields.get(stid_idx).filter(|value| !value.is_empty()) else {
            continue;
        };
        let (Some(Ok(lat)), Some(Ok(lon))) = (
            fields.get(lat_idx).map(|value| value.parse::<f64>()),
            fields.get(lon_idx).map(|value| value.parse::<f64>()),
        ) else {
            continue;
        };

        let optional = |idx: Option<usize>| {
            idx.and_then(|idx| fields.get(idx))
                .filter(|value| !value.is_empty())
                .cloned()
        };

        stations.push(StationMeta {
            stid: stid.clone(),
            station_name: optional(name_idx),
            lat,
            lon,
            elev: optional(elev_idx).and_then(|value| value.parse().ok()),
            iem_network: optional(network_idx),
        });
    }

    Ok(stations)
}

/// Fetch the live directory, falling back to the cached snapshot and then to
/// an empty set. Metadata problems never fail the run.
pub fn load_station_metadata(feed: &dyn MetadataFeed, cache_path: &Path) -> Vec<StationMeta> {
    match feed.fetch_stations() {
        Ok(stations) => {
            info!(stations = stations.len(), "loaded station metadata from feed");
            stations
        }
        Err(err) => {
            warn!(error = %err, "metadata feed unavailable");
            match load_cached_metadata(cache_path) {
                Some(stations) => {
                    info!(stations = stations.len(), "using cached station metadata");
                    stations
                }
                None => {
                    warn!("no cached station metadata, proceeding without");
                    Vec::new()
                }
            }
        }
    }
}

fn load_cached_metadata(cache_path: &Path) -> Option<Vec<StationMeta>> {
    let content = fs::read_to_string(cache_path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Join observed station ids against the directory. Stations without a
/// directory match are excluded here; their readings are unaffected.
pub fn match_stations(meta: &[StationMeta], station_ids: &HashSet<String>) -> Vec<StationRecord> {
    meta.iter()
        .filter(|station| station_ids.contains(&station.stid))
        .map(|station| StationRecord {
            id: station.stid.clone(),
            name: station
                .station_name
                .clone()
                .unwrap_or_else(|| station.stid.clone()),
            latitude: round_to(station.lat, 6),
            longitude: round_to(station.lon, 6),
            elevation: station.elev.map(|elev| round_to(elev, 2)),
            network: station.iem_network.clone(),
        })
        .collect()
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());
    fields
}
