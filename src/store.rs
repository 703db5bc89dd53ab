use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::TwlError;

/// Output directory layout. All artifacts are flat JSON files overwritten
/// once per run; the cache snapshot is read-only fallback input.
#[derive(Debug, Clone)]
pub struct OutputStore {
    data_dir: Utf8PathBuf,
}

impl OutputStore {
    pub fn new(data_dir: Utf8PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    pub fn stations_path(&self) -> Utf8PathBuf {
        self.data_dir.join("stations.json")
    }

    pub fn series_path(&self) -> Utf8PathBuf {
        self.data_dir.join("twl_data.json")
    }

    pub fn summary_path(&self) -> Utf8PathBuf {
        self.data_dir.join("metadata.json")
    }

    pub fn metadata_cache_path(&self) -> Utf8PathBuf {
        self.data_dir.join("stations_cache.json")
    }

    pub fn ensure_data_dir(&self) -> Result<(), TwlError> {
        fs::create_dir_all(self.data_dir.as_std_path())
            .map_err(|err| TwlError::Filesystem(err.to_string()))
    }

    /// Serialize pretty JSON and publish it with a write-then-rename so a
    /// reader never observes a partial file.
    pub fn write_json<T: Serialize>(&self, path: &Utf8Path, value: &T) -> Result<(), TwlError> {
        let content =
            serde_json::to_vec_pretty(value).map_err(|err| TwlError::Filesystem(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| TwlError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| TwlError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = OutputStore::new(Utf8PathBuf::from("data"));
        assert_eq!(store.stations_path(), "data/stations.json");
        assert_eq!(store.series_path(), "data/twl_data.json");
        assert_eq!(store.summary_path(), "data/metadata.json");
        assert_eq!(store.metadata_cache_path(), "data/stations_cache.json");
    }

    #[test]
    fn write_json_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let data_dir = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
        let store = OutputStore::new(data_dir);
        store.ensure_data_dir().unwrap();

        store.write_json(&store.stations_path(), &vec!["old"]).unwrap();
        store.write_json(&store.stations_path(), &vec!["new"]).unwrap();

        let content = fs::read_to_string(store.stations_path().as_std_path()).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, ["new"]);
        assert!(!store.stations_path().with_extension("json.tmp").as_std_path().exists());
    }
}
