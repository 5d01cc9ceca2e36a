//! Configuration loading and root folder resolution
//!
//! Every section has compiled defaults, so a missing TOML file (or a file that
//! only overrides a couple of keys) still yields a complete [`KioskConfig`].
//! The resolved value is immutable and shared by reference (`Arc<KioskConfig>`)
//! with every component that needs it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ATTN_CONFIG";

/// Environment variable naming the kiosk data folder
pub const ROOT_FOLDER_ENV_VAR: &str = "ATTN_ROOT_FOLDER";

/// Complete kiosk configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KioskConfig {
    pub api: ApiConfig,
    pub camera: CameraConfig,
    pub validation: ValidationConfig,
    pub geolocation: GeolocationConfig,
    pub offline: OfflineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote attendance API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Single action-dispatch endpoint; every action is POSTed here
    pub endpoint: String,
    pub timeout_ms: u64,
    /// Additional attempts after the first one
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub health_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://asistencia-api.wavilanuez.workers.dev/".to_string(),
            timeout_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            health_timeout_ms: 5_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Camera facing mode requested from the device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera
    #[default]
    User,
    /// Rear camera
    Environment,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

/// Capture and compression settings
///
/// Qualities are JPEG qualities in `(0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
    /// Size budget for the encoded photo, in bytes
    pub max_file_size: usize,
    /// Quality of the first snapshot encode
    pub quality: f32,
    /// Quality of the first re-encode inside the compression loop
    pub compress_quality: f32,
    pub quality_step: f32,
    /// Once quality reaches this floor the attempt is accepted regardless of size
    pub quality_floor: f32,
    /// Longer side cap applied before re-encoding
    pub max_dimension: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
            facing_mode: FacingMode::User,
            max_file_size: 500 * 1024,
            quality: 0.8,
            compress_quality: 0.7,
            quality_step: 0.1,
            quality_floor: 0.3,
            max_dimension: 1024,
        }
    }
}

/// Form validation limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_workers_operational: usize,
    pub max_workers_administrative: usize,
    pub max_observations_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_workers_operational: 50,
            max_workers_administrative: 1,
            max_observations_length: 500,
        }
    }
}

/// Best-effort geolocation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 10_000,
        }
    }
}

impl GeolocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Offline cache controller settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OfflineConfig {
    /// Version tag of the current cache generation
    pub cache_version: String,
    pub cache_prefix: String,
    pub runtime_cache: String,
    /// Runtime bucket size; the oldest entries are evicted past it
    pub runtime_max_entries: usize,
    /// Hosts (substring match) whose requests bypass the cache entirely
    pub api_hosts: Vec<String>,
    pub precache: Vec<String>,
    /// Document served when both cache and network miss
    pub fallback_document: String,
    /// Origin the kiosk assets are fetched from
    pub upstream: String,
    /// Listen address of the offline server
    pub bind: String,
    pub fetch_timeout_ms: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_version: "1.0.0".to_string(),
            cache_prefix: "asistencia".to_string(),
            runtime_cache: "asistencia-runtime".to_string(),
            runtime_max_entries: 200,
            api_hosts: vec!["workers.dev".to_string(), "script.google.com".to_string()],
            precache: [
                "/",
                "/index.html",
                "/css/styles.css",
                "/js/config.js",
                "/js/api.js",
                "/js/camera.js",
                "/js/ui.js",
                "/js/app.js",
                "/js/pwa.js",
                "/manifest.json",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            fallback_document: "/index.html".to_string(),
            upstream: "http://127.0.0.1:8080".to_string(),
            bind: "127.0.0.1:8090".to_string(),
            fetch_timeout_ms: 15_000,
        }
    }
}

impl OfflineConfig {
    /// Name of the current generation bucket, e.g. `asistencia-v1.0.0`
    pub fn generation_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.cache_version)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Local preference storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub preferences_file: String,
    pub last_site_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            preferences_file: "preferences.toml".to_string(),
            last_site_key: "asistencia_last_sede".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl KioskConfig {
    /// Parse a TOML document; absent keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: KioskConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject values the components cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.trim().is_empty() {
            return Err(Error::Config("api.endpoint must not be empty".to_string()));
        }
        if self.api.timeout_ms == 0 {
            return Err(Error::Config("api.timeout_ms must be positive".to_string()));
        }

        let cam = &self.camera;
        for (name, q) in [
            ("camera.quality", cam.quality),
            ("camera.compress_quality", cam.compress_quality),
            ("camera.quality_floor", cam.quality_floor),
        ] {
            if !(q > 0.0 && q <= 1.0) {
                return Err(Error::Config(format!("{} must be in (0, 1], got {}", name, q)));
            }
        }
        if !(cam.quality_step > 0.0) {
            return Err(Error::Config("camera.quality_step must be positive".to_string()));
        }
        if cam.quality_floor > cam.compress_quality {
            return Err(Error::Config(
                "camera.quality_floor must not exceed camera.compress_quality".to_string(),
            ));
        }
        if cam.max_dimension == 0 || cam.max_file_size == 0 {
            return Err(Error::Config(
                "camera.max_dimension and camera.max_file_size must be positive".to_string(),
            ));
        }

        if self.validation.max_workers_administrative == 0
            || self.validation.max_workers_operational == 0
        {
            return Err(Error::Config("worker limits must be positive".to_string()));
        }

        if self.offline.cache_version.trim().is_empty() {
            return Err(Error::Config("offline.cache_version must not be empty".to_string()));
        }
        if self.offline.runtime_cache == self.offline.generation_name() {
            return Err(Error::Config(
                "offline.runtime_cache must differ from the generation name".to_string(),
            ));
        }
        if self.offline.runtime_max_entries == 0 {
            return Err(Error::Config(
                "offline.runtime_max_entries must be positive".to_string(),
            ));
        }
        if self.offline.fetch_timeout_ms == 0 {
            return Err(Error::Config("offline.fetch_timeout_ms must be positive".to_string()));
        }

        Ok(())
    }
}

/// Resolves which config file to load
///
/// Priority order:
/// 1. Command-line argument (highest priority)
/// 2. `ATTN_CONFIG` environment variable
/// 3. `<platform config dir>/attn/config.toml`
/// 4. Compiled defaults (fallback)
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Path that would be loaded, if any
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        dirs::config_dir()
            .map(|d| d.join("attn").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Load the resolved config
    ///
    /// A missing file is not fatal: a warning is logged and defaults are used.
    /// A file that exists but fails to parse or validate is an error.
    pub fn resolve(&self) -> Result<KioskConfig> {
        match self.config_path() {
            Some(path) if path.exists() => {
                let config = KioskConfig::load(&path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                Ok(KioskConfig::default())
            }
            None => {
                info!("No config file found, using compiled defaults");
                Ok(KioskConfig::default())
            }
        }
    }
}

/// Root (data) folder resolution:
/// 1. Command-line argument
/// 2. `ATTN_ROOT_FOLDER` environment variable
/// 3. OS-dependent default under the platform data dir
pub fn resolve_root_folder(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("attn"))
        .unwrap_or_else(|| PathBuf::from("./attn_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KioskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.api.retry_attempts, 3);
        assert_eq!(config.api.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.camera.max_file_size, 512_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = KioskConfig::from_toml_str(
            r#"
            [api]
            endpoint = "http://localhost:9000/"
            retry_attempts = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.api.endpoint, "http://localhost:9000/");
        assert_eq!(config.api.retry_attempts, 1);
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_rejects_floor_above_compress_quality() {
        let result = KioskConfig::from_toml_str(
            r#"
            [camera]
            compress_quality = 0.5
            quality_floor = 0.6
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_unbounded_runtime_cache() {
        let result = KioskConfig::from_toml_str(
            r#"
            [offline]
            runtime_max_entries = 0
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_generation_name() {
        let offline = OfflineConfig::default();
        assert_eq!(offline.generation_name(), "asistencia-v1.0.0");
    }

    #[test]
    fn test_facing_mode_toggle() {
        assert_eq!(FacingMode::User.toggled(), FacingMode::Environment);
        assert_eq!(FacingMode::Environment.toggled(), FacingMode::User);
    }
}
