use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sessions {
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Goals {
    pub daily_minutes: i64,
}

/// Where uploaded images are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    Database,
    Disk,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Uploads {
    pub backend: UploadBackend,
    pub dir: String,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3 {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub sessions: Sessions,
    pub goals: Goals,
    pub uploads: Uploads,
    #[serde(default)]
    pub s3: S3,
}

/// Environment variables and the setting each one overrides
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("DATABASE_PATH", "database.path"),
    ("SESSION_TTL_DAYS", "sessions.ttl_days"),
    ("DAILY_GOAL_MINUTES", "goals.daily_minutes"),
    ("UPLOAD_BACKEND", "uploads.backend"),
    ("UPLOAD_DIR", "uploads.dir"),
    ("UPLOAD_MAX_BYTES", "uploads.max_bytes"),
    ("S3_BUCKET", "s3.bucket"),
    ("S3_REGION", "s3.region"),
    ("S3_ENDPOINT", "s3.endpoint"),
    ("S3_ACCESS_KEY_ID", "s3.access_key_id"),
    ("S3_SECRET_ACCESS_KEY", "s3.secret_access_key"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Optional settings.toml
        let config_file_name = "settings.toml";

        // Check in current directory
        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in fitlog-server directory (for development)
        let dev_path = PathBuf::from("fitlog-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = Self::with_defaults(builder)?;

        // 2. Environment variables have the highest priority
        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(*key, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Defaults only, ignoring files and the environment
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::with_defaults(Config::builder())?.build()?.try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "fitlog.db")?
            .set_default("sessions.ttl_days", 30)?
            .set_default("goals.daily_minutes", 30)?
            .set_default("uploads.backend", "database")?
            .set_default("uploads.dir", "uploads")?
            .set_default("uploads.max_bytes", 5 * 1024 * 1024)
    }
}
