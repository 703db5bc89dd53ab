use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::domain::BulletinCandidate;
use crate::error::TwlError;

/// Read-only view of the remote bulletin store: list object names under a
/// prefix, download one object to a local path.
pub trait BulletinStore: Send + Sync {
    fn list_objects(&self, prefix: &str) -> Result<Vec<String>, TwlError>;
    fn download_object(&self, name: &str, destination: &Path) -> Result<(), TwlError>;
}

/// Anonymous GCS JSON-API client for the NWM public bucket.
#[derive(Clone)]
pub struct GcsHttpClient {
    client: Client,
    bucket: String,
    base_url: String,
}

impl GcsHttpClient {
    pub fn new(bucket: &str) -> Result<Self, TwlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("twl-pipeline/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| TwlError::StoreHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| TwlError::StoreHttp(err.to_string()))?;
        Ok(Self {
            client,
            bucket: bucket.to_string(),
            base_url: "https://storage.googleapis.com".to_string(),
        })
    }

    pub fn new_with_base_url(bucket: &str, base_url: &str) -> Result<Self, TwlError> {
        let mut client = Self::new(bucket)?;
        client.base_url = base_url.trim_end_matches('/').to_string();
        Ok(client)
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

impl BulletinStore for GcsHttpClient {
    fn list_objects(&self, prefix: &str) -> Result<Vec<String>, TwlError> {
        let url = format!("{}/storage/v1/b/{}/o", self.base_url, self.bucket);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[
                ("prefix", prefix),
                ("fields", "items(name),nextPageToken"),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = request
                .send()
                .map_err(|err| TwlError::StoreHttp(err.to_string()))?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response
                    .text()
                    .unwrap_or_else(|_| "object listing failed".to_string());
                return Err(TwlError::StoreStatus { status, message });
            }
            let page: ListResponse = response
                .json()
                .map_err(|err| TwlError::StoreHttp(err.to_string()))?;
            names.extend(page.items.into_iter().map(|entry| entry.name));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(names)
    }

    fn download_object(&self, name: &str, destination: &Path) -> Result<(), TwlError> {
        let url = format!("{}/{}/{}", self.base_url, self.bucket, name);
        let mut response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| TwlError::StoreHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "object download failed".to_string());
            return Err(TwlError::StoreStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| TwlError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| TwlError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Resolve one candidate bulletin in the store and download it into
/// `dest_dir`. A missing bulletin is `Ok(None)`: the expected outcome for a
/// cycle that has not been published yet.
pub fn locate_bulletin(
    store: &dyn BulletinStore,
    candidate: &BulletinCandidate,
    dest_dir: &Path,
) -> Result<Option<PathBuf>, TwlError> {
    let prefix = candidate.prefix();
    let target = candidate.object_name();
    debug!(prefix = %prefix, target = %target, "searching bulletin store");

    let names = store.list_objects(&prefix)?;
    let matched = names
        .into_iter()
        .find(|name| name == &target || name.ends_with(&format!("/{target}")));

    let Some(name) = matched else {
        return Ok(None);
    };

    let local_path = dest_dir.join(&target);
    debug!(object = %name, "downloading bulletin");
    store.download_object(&name, &local_path)?;
    Ok(Some(local_path))
}
