//! API Configuration Module
//!
//! Configuration for CORS, the listener, call ingestion and the analysis
//! service. Loaded once from environment variables with defaults suited to
//! local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use callsight_core::ConfigError;

/// Default cap on uploaded audio size (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

// ============================================================================
// STORE BACKEND
// ============================================================================

/// Which `InsightStore` implementation the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "CALLSIGHT_STORE".to_string(),
                value: other.to_string(),
                reason: "expected 'postgres' or 'memory'".to_string(),
            }),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Listener
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    // ========================================================================
    // Ingestion
    // ========================================================================
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,

    /// Directory uploaded recordings are written to.
    pub audio_dir: PathBuf,

    /// Base URL recordings are served from. Stored audio URLs are
    /// `{public_base_url}/calls/{file}`.
    pub public_base_url: String,

    /// Country prefix applied to customer phone numbers that lack one.
    pub phone_prefix: String,

    // ========================================================================
    // Analysis service
    // ========================================================================
    pub analysis_url: String,
    pub analysis_timeout: Duration,

    pub store_backend: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,

            bind_host: "0.0.0.0".to_string(),
            port: 3000,

            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            audio_dir: PathBuf::from("audio"),
            public_base_url: "http://localhost:3000/audio".to_string(),
            phone_prefix: "+91".to_string(),

            analysis_url: "http://localhost:8000/analyze".to_string(),
            analysis_timeout: Duration::from_secs(300),

            store_backend: StoreBackend::Postgres,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CALLSIGHT_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `CALLSIGHT_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `CALLSIGHT_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `CALLSIGHT_API_BIND`: Listen host (default: 0.0.0.0)
    /// - `PORT` / `CALLSIGHT_API_PORT`: Listen port (default: 3000)
    /// - `CALLSIGHT_MAX_UPLOAD_BYTES`: Upload cap (default: 50 MiB)
    /// - `CALLSIGHT_AUDIO_DIR`: Recording directory (default: ./audio)
    /// - `CALLSIGHT_PUBLIC_BASE_URL`: Base URL for stored recordings
    /// - `CALLSIGHT_PHONE_PREFIX`: Country prefix (default: +91)
    /// - `CALLSIGHT_ANALYSIS_URL`: Analysis service endpoint
    /// - `CALLSIGHT_ANALYSIS_TIMEOUT_SECS`: Analysis timeout (default: 300)
    /// - `CALLSIGHT_STORE`: "postgres" or "memory" (default: postgres)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cors_origins = std::env::var("CALLSIGHT_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("CALLSIGHT_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("CALLSIGHT_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let bind_host = std::env::var("CALLSIGHT_API_BIND").unwrap_or(defaults.bind_host);

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("CALLSIGHT_API_PORT").ok())
        {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                field: "PORT".to_string(),
                value: raw.clone(),
                reason: "not a valid port".to_string(),
            })?,
            None => defaults.port,
        };

        let max_upload_bytes = std::env::var("CALLSIGHT_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_upload_bytes);

        let audio_dir = std::env::var("CALLSIGHT_AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.audio_dir);

        let public_base_url = std::env::var("CALLSIGHT_PUBLIC_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.public_base_url);

        let phone_prefix =
            std::env::var("CALLSIGHT_PHONE_PREFIX").unwrap_or(defaults.phone_prefix);

        let analysis_url =
            std::env::var("CALLSIGHT_ANALYSIS_URL").unwrap_or(defaults.analysis_url);

        let analysis_timeout = std::env::var("CALLSIGHT_ANALYSIS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.analysis_timeout);

        let store_backend = match std::env::var("CALLSIGHT_STORE") {
            Ok(raw) => StoreBackend::parse(&raw)?,
            Err(_) => defaults.store_backend,
        };

        Ok(Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            bind_host,
            port,
            max_upload_bytes,
            audio_dir,
            public_base_url,
            phone_prefix,
            analysis_url,
            analysis_timeout,
            store_backend,
        })
    }

    /// Socket address the server listens on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "CALLSIGHT_API_BIND".to_string(),
                value: addr,
                reason: e.to_string(),
            })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}
