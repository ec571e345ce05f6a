//! Schema retrieval from the miot-spec.org endpoint with an on-disk cache.
//! One JSON file per device model plus a shared release index; only the
//! release index is subject to time-based staleness.

use crate::error::{MiotError, Result};
use crate::schema::DeviceModel;
use crate::urn::URN;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const DEFAULT_BASE_URL: &str = "https://miot-spec.org/miot-spec-v2";
const RELEASE_INDEX_FILE: &str = "instances.json";
const DEFAULT_CACHE_HOURS: u64 = 6;
const CACHE_DIR_ENV: &str = "RUSTMIIO_CACHE_DIR";

/// Release status of schema files that are considered stable.
pub const STATUS_RELEASED: &str = "released";

/// Metadata for one published schema file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReleaseInfo {
    pub model: String,
    pub status: String,
    pub version: u32,
    #[serde(rename = "type")]
    pub urn: URN,
}

/// The downloadable release index (`instances?status=all`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseList {
    #[serde(default)]
    pub instances: Vec<ReleaseInfo>,
}

impl ReleaseList {
    /// Returns the highest-version release for `model` matching `status`.
    pub fn info_for_model(&self, model: &str, status: &str) -> Result<&ReleaseInfo> {
        self.instances
            .iter()
            .filter(|info| info.model == model && info.status == status)
            .max_by_key(|info| info.version)
            .ok_or_else(|| MiotError::NoRelease {
                model: model.to_string(),
                status: status.to_string(),
            })
    }

    /// Shorthand for [`info_for_model`](Self::info_for_model) with the
    /// released status.
    pub fn info_for_model_released(&self, model: &str) -> Result<&ReleaseInfo> {
        self.info_for_model(model, STATUS_RELEASED)
    }
}

/// Client for the MIoT schema endpoint with an on-disk cache.
///
/// Model schema files are reused indefinitely once written; the shared
/// release index is re-fetched when older than `cache_hours`.
pub struct MiotCloud {
    client: reqwest::Client,
    base_url: String,
    cache_dir: PathBuf,
    cache_hours: u64,
}

impl MiotCloud {
    /// Creates a client using the default endpoint and the user cache
    /// directory. `RUSTMIIO_CACHE_DIR` overrides the cache location.
    pub fn new() -> Result<Self> {
        let cache_dir = std::env::var(CACHE_DIR_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs_next::cache_dir().map(|dir| dir.join("rustmiio")))
            .ok_or(MiotError::NoCacheDir)?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir,
            cache_hours: DEFAULT_CACHE_HOURS,
        })
    }

    /// Overrides the schema endpoint. Tests point this at a local server.
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the cache directory.
    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Overrides how long the release index is considered fresh.
    pub fn with_cache_hours(mut self, cache_hours: u64) -> Self {
        self.cache_hours = cache_hours;
        self
    }

    /// Returns the parsed model schema, preferring the on-disk cache.
    ///
    /// A corrupt or unreadable cache file is discarded with a log line and
    /// the schema is fetched again.
    pub async fn get_device_model(&self, model: &str) -> Result<DeviceModel> {
        let path = self.cache_dir.join(format!("{model}.json"));
        if path.is_file() {
            debug!("Using cached schema for {} from {}", model, path.display());
            match fs::read_to_string(&path) {
                Ok(raw) => match DeviceModel::parse(&raw) {
                    Ok(parsed) => return Ok(parsed),
                    Err(e) => warn!("Discarding corrupt cache file {}: {}", path.display(), e),
                },
                Err(e) => warn!("Unable to read cache file {}: {}", path.display(), e),
            }
        }
        self.get_model_schema(model).await
    }

    /// Resolves the released schema version for `model`, downloads it and
    /// caches it under `{model}.json`.
    pub async fn get_model_schema(&self, model: &str) -> Result<DeviceModel> {
        let releases = self.get_release_list().await?;
        let release = releases.info_for_model_released(model)?;

        let url = format!("{}/instance?type={}", self.base_url, release.urn);
        info!("Fetching schema for {} (version {})", model, release.version);
        let raw = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let parsed = DeviceModel::parse(&raw)?;
        if let Err(e) = self.write_to_cache(&format!("{model}.json"), &raw) {
            warn!("Unable to cache schema for {}: {}", model, e);
        }
        Ok(parsed)
    }

    /// Returns the release index, fetching it when the cached copy is
    /// missing or older than `cache_hours`.
    pub async fn get_release_list(&self) -> Result<ReleaseList> {
        let path = self.cache_dir.join(RELEASE_INDEX_FILE);
        if file_is_fresh(&path, Duration::from_secs(self.cache_hours * 3600)) {
            match fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<ReleaseList>(&raw) {
                    Ok(list) => {
                        debug!("Using cached release index from {}", path.display());
                        return Ok(list);
                    }
                    Err(e) => warn!("Discarding corrupt release index: {}", e),
                },
                Err(e) => warn!("Unable to read release index {}: {}", path.display(), e),
            }
        }
        self.fetch_release_list().await
    }

    async fn fetch_release_list(&self) -> Result<ReleaseList> {
        let url = format!("{}/instances?status=all", self.base_url);
        info!("Fetching release index from {}", url);
        let raw = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let list: ReleaseList = serde_json::from_str(&raw)?;
        if let Err(e) = self.write_to_cache(RELEASE_INDEX_FILE, &raw) {
            warn!("Unable to cache release index: {}", e);
        }
        Ok(list)
    }

    fn write_to_cache(&self, name: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_dir.join(name);
        // Write-then-rename so concurrent readers never see a torn file.
        let tmp = self.cache_dir.join(format!("{name}.tmp"));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        debug!("Cached {}", path.display());
        Ok(())
    }
}

/// Whether a cache file exists and was modified within `max_age`.
pub fn file_is_fresh(path: &Path, max_age: Duration) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age <= max_age,
        // A modification time in the future still counts as fresh.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    const MODEL: &str = "dmaker.fan.p5";
    const URN_V1: &str = "urn:miot-spec-v2:device:fan:0000A005:dmaker-p5:1";
    const URN_V2: &str = "urn:miot-spec-v2:device:fan:0000A005:dmaker-p5:2";

    fn release_index() -> String {
        json!({
            "instances": [
                {"model": MODEL, "status": "released", "version": 1, "type": URN_V1},
                {"model": MODEL, "status": "released", "version": 2, "type": URN_V2},
                {"model": MODEL, "status": "debug", "version": 3, "type": URN_V2},
                {"model": "other.model.x", "status": "released", "version": 1, "type": URN_V1}
            ]
        })
        .to_string()
    }

    fn schema_body() -> String {
        json!({
            "type": URN_V2,
            "description": "Fan",
            "services": [{
                "iid": 2,
                "type": "urn:miot-spec-v2:service:fan:00007808:dmaker-p5:1",
                "properties": [{
                    "iid": 1,
                    "type": "urn:miot-spec-v2:property:on:00000006:dmaker-p5:1",
                    "format": "bool",
                    "access": ["read", "write"]
                }]
            }]
        })
        .to_string()
    }

    fn cloud(server: &mockito::Server, cache: &TempDir) -> MiotCloud {
        MiotCloud::new()
            .unwrap()
            .with_base_url(server.url())
            .with_cache_dir(cache.path())
    }

    fn age_file(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn info_for_model_picks_the_highest_version() {
        let list: ReleaseList = serde_json::from_str(&release_index()).unwrap();
        let info = list.info_for_model_released(MODEL).unwrap();
        assert_eq!(info.version, 2);
        assert_eq!(info.urn.urn_string(), URN_V2);
    }

    #[test]
    fn info_for_model_honors_the_status_filter() {
        let list: ReleaseList = serde_json::from_str(&release_index()).unwrap();
        let info = list.info_for_model(MODEL, "debug").unwrap();
        assert_eq!(info.version, 3);
    }

    #[test]
    fn info_for_model_without_match_is_an_error() {
        let list: ReleaseList = serde_json::from_str(&release_index()).unwrap();
        let err = list.info_for_model_released("missing.model.z").unwrap_err();
        assert_eq!(
            err.to_string(),
            "no release with status 'released' found for model 'missing.model.z'"
        );
    }

    #[test]
    fn fresh_file_is_detected_by_age() {
        let cache = TempDir::new().unwrap();
        let path = cache.path().join("instances.json");
        fs::write(&path, "{}").unwrap();

        // cache_hours - 1 → fresh, cache_hours + 1 → stale, for 6 hours.
        age_file(&path, Duration::from_secs(5 * 3600));
        assert!(file_is_fresh(&path, Duration::from_secs(6 * 3600)));

        age_file(&path, Duration::from_secs(7 * 3600));
        assert!(!file_is_fresh(&path, Duration::from_secs(6 * 3600)));

        assert!(!file_is_fresh(&cache.path().join("absent.json"), Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn get_model_schema_downloads_the_highest_released_version() {
        let mut server = mockito::Server::new_async().await;
        let cache = TempDir::new().unwrap();

        let index_mock = server
            .mock("GET", "/instances?status=all")
            .with_status(200)
            .with_body(release_index())
            .create_async()
            .await;
        // Only the v2 schema URL is mocked; a request for any other
        // version would fail the test.
        let schema_mock = server
            .mock("GET", format!("/instance?type={URN_V2}").as_str())
            .with_status(200)
            .with_body(schema_body())
            .create_async()
            .await;

        let model = cloud(&server, &cache).get_model_schema(MODEL).await.unwrap();
        assert_eq!(model.urn.version, 2);

        index_mock.assert_async().await;
        schema_mock.assert_async().await;
        assert!(cache.path().join(format!("{MODEL}.json")).is_file());
    }

    #[tokio::test]
    async fn get_device_model_serves_the_cache_without_network() {
        let mut server = mockito::Server::new_async().await;
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join(format!("{MODEL}.json")), schema_body()).unwrap();

        let unexpected = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let model = cloud(&server, &cache).get_device_model(MODEL).await.unwrap();
        assert_eq!(model.services.len(), 1);
        unexpected.assert_async().await;
    }

    #[tokio::test]
    async fn corrupt_model_cache_triggers_a_refetch() {
        let mut server = mockito::Server::new_async().await;
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join(format!("{MODEL}.json")), "not json").unwrap();

        let _index_mock = server
            .mock("GET", "/instances?status=all")
            .with_status(200)
            .with_body(release_index())
            .create_async()
            .await;
        let schema_mock = server
            .mock("GET", format!("/instance?type={URN_V2}").as_str())
            .with_status(200)
            .with_body(schema_body())
            .create_async()
            .await;

        let model = cloud(&server, &cache).get_device_model(MODEL).await.unwrap();
        assert_eq!(model.urn.version, 2);
        schema_mock.assert_async().await;
    }

    #[tokio::test]
    async fn release_index_is_reused_while_fresh_and_refetched_when_stale() {
        let mut server = mockito::Server::new_async().await;
        let cache = TempDir::new().unwrap();

        let index_mock = server
            .mock("GET", "/instances?status=all")
            .with_status(200)
            .with_body(release_index())
            .expect(2)
            .create_async()
            .await;

        let cloud = cloud(&server, &cache);

        // First call populates the cache, second is served from disk.
        cloud.get_release_list().await.unwrap();
        cloud.get_release_list().await.unwrap();

        // Aged past cache_hours the index is fetched again.
        age_file(
            &cache.path().join(RELEASE_INDEX_FILE),
            Duration::from_secs((DEFAULT_CACHE_HOURS + 1) * 3600),
        );
        cloud.get_release_list().await.unwrap();

        index_mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_errors_surface_to_the_caller() {
        let mut server = mockito::Server::new_async().await;
        let cache = TempDir::new().unwrap();

        let _index_mock = server
            .mock("GET", "/instances?status=all")
            .with_status(500)
            .create_async()
            .await;

        let err = cloud(&server, &cache).get_release_list().await.unwrap_err();
        assert!(matches!(err, MiotError::Http(_)));
    }
}
