//! Process settings for the pgsched API and worker.
//!
//! All settings come from environment variables and are read in a single
//! pass into an immutable [`Settings`] snapshot. The snapshot owns the lazily
//! built database engine, so every caller holding the same `Settings` shares
//! one connection pool.
//!
//! Environment variables:
//! - `PG_DSN_APP` — database connection string (default: empty, unusable)
//! - `CORS_ALLOWED_ORIGINS` — comma-separated origins (default: `*`)
//! - `DEFAULT_QUERY_INTERVAL` — polling interval in seconds (default: `21600`)
//! - `TRUST_PROXY` — trust forwarded client address headers (default: `1`)
//! - `MAX_LOG_BYTES` — cap on a single log record (default: `4096`)
//! - `REDACT_KEYS` — case-insensitive field names to redact from logs
//! - `LOG_DIR` — log file directory (default: `./logs`)
//! - `APP_NAME` — application identifier (default: `pgsched-api`)
//! - `RFC_ENTERPRISE_ID` — enterprise ID for structured logs (default: `32473`)
//! - `LOG_ROTATE_UTC` — rotate on UTC day boundaries (default: `1`)
//! - `GZIP_AFTER_DAYS` — compress rotated logs after N days (default: `7`)
//! - `KEEP_DAYS` — delete rotated logs after N days (default: `200`)
//! - `PUBLIC_KEY_B64_PATH` — base64 public key file (default: `./public_key.base64`)
//! - `APP_PRIVATE_KEY_B64_PATH` — base64 private key file (optional)
//!
//! Boolean flags are on only for the exact value `"1"`. A variable set to the
//! empty string counts as set and does not fall back to its default.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;

use crate::database;
use crate::env::{expand_home, parse_flag, parse_integer, parse_key_set, parse_list};
use crate::error::ConfigError;

pub const ENV_PG_DSN_APP: &str = "PG_DSN_APP";
pub const ENV_CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";
pub const ENV_DEFAULT_QUERY_INTERVAL: &str = "DEFAULT_QUERY_INTERVAL";
pub const ENV_TRUST_PROXY: &str = "TRUST_PROXY";
pub const ENV_MAX_LOG_BYTES: &str = "MAX_LOG_BYTES";
pub const ENV_REDACT_KEYS: &str = "REDACT_KEYS";
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_APP_NAME: &str = "APP_NAME";
pub const ENV_RFC_ENTERPRISE_ID: &str = "RFC_ENTERPRISE_ID";
pub const ENV_LOG_ROTATE_UTC: &str = "LOG_ROTATE_UTC";
pub const ENV_GZIP_AFTER_DAYS: &str = "GZIP_AFTER_DAYS";
pub const ENV_KEEP_DAYS: &str = "KEEP_DAYS";
pub const ENV_PUBLIC_KEY_B64_PATH: &str = "PUBLIC_KEY_B64_PATH";
pub const ENV_PRIVATE_KEY_B64_PATH: &str = "APP_PRIVATE_KEY_B64_PATH";

const DEFAULT_CORS_ALLOWED_ORIGINS: &str = "*";
const DEFAULT_QUERY_INTERVAL: &str = "21600";
const DEFAULT_TRUST_PROXY: &str = "1";
const DEFAULT_MAX_LOG_BYTES: &str = "4096";
const DEFAULT_REDACT_KEYS: &str =
    "password,new_password,current_password,token,authorization,secret";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_APP_NAME: &str = "pgsched-api";
const DEFAULT_RFC_ENTERPRISE_ID: &str = "32473";
const DEFAULT_LOG_ROTATE_UTC: &str = "1";
const DEFAULT_GZIP_AFTER_DAYS: &str = "7";
const DEFAULT_KEEP_DAYS: &str = "200";
const DEFAULT_PUBLIC_KEY_B64_PATH: &str = "./public_key.base64";

/// Settings consumed by the structured logging pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSettings {
    /// Cap on a single log record's size in bytes.
    pub max_log_bytes: usize,
    /// Lowercased field names whose values must never be logged.
    pub redact_keys: BTreeSet<String>,
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Application identifier stamped on every record.
    pub app_name: String,
    /// Private enterprise number for RFC 5424 structured data.
    pub rfc_enterprise_id: u32,
    /// Rotate on UTC rather than local day boundaries.
    pub rotate_utc: bool,
    /// Compress rotated files older than this many days.
    pub gzip_after_days: u32,
    /// Delete rotated files older than this many days.
    pub keep_days: u32,
}

impl LogSettings {
    /// Whether values under `field` must be redacted. Case-insensitive.
    pub fn is_redacted(&self, field: &str) -> bool {
        self.redact_keys.contains(&field.to_lowercase())
    }
}

/// Locations of the base64 sealed-box key files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPaths {
    /// Public key file, used as given (no home expansion).
    pub public_key_path: PathBuf,
    /// Private key file as configured, before home expansion.
    pub private_key_path: Option<PathBuf>,
}

/// Immutable settings snapshot for one process.
///
/// Built once by [`Settings::from_env`] (or [`Settings::from_lookup`] in
/// tests and embedders). The database engine is created on first use by
/// [`Settings::database_engine`] and cached for the life of the snapshot.
pub struct Settings {
    /// Database connection string, trimmed. Empty means no database.
    pub database_dsn: String,
    /// Allowed CORS origins in configured order.
    pub cors_allowed_origins: Vec<String>,
    /// Default polling interval for scheduled queries, in seconds.
    pub default_query_interval_secs: u64,
    /// Trust proxy-forwarded client address headers.
    pub trust_proxy: bool,
    /// Logging pipeline settings.
    pub logging: LogSettings,
    /// Sealed-box key file locations.
    pub keys: KeyPaths,
    pub(crate) engine: OnceCell<PgPool>,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// Variables that are not valid unicode are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInteger`] if any integer variable does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from an arbitrary variable source.
    ///
    /// `lookup` returns `None` for an unset variable. Each variable is looked
    /// up at most once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInteger`] if any integer variable does
    /// not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_owned());

        let database_dsn = var(ENV_PG_DSN_APP, "").trim().to_owned();
        let cors_allowed_origins =
            parse_list(&var(ENV_CORS_ALLOWED_ORIGINS, DEFAULT_CORS_ALLOWED_ORIGINS));
        let default_query_interval_secs = parse_integer(
            ENV_DEFAULT_QUERY_INTERVAL,
            &var(ENV_DEFAULT_QUERY_INTERVAL, DEFAULT_QUERY_INTERVAL),
        )?;
        let trust_proxy = parse_flag(&var(ENV_TRUST_PROXY, DEFAULT_TRUST_PROXY));

        let logging = LogSettings {
            max_log_bytes: parse_integer(
                ENV_MAX_LOG_BYTES,
                &var(ENV_MAX_LOG_BYTES, DEFAULT_MAX_LOG_BYTES),
            )?,
            redact_keys: parse_key_set(&var(ENV_REDACT_KEYS, DEFAULT_REDACT_KEYS)),
            log_dir: PathBuf::from(var(ENV_LOG_DIR, DEFAULT_LOG_DIR)),
            app_name: var(ENV_APP_NAME, DEFAULT_APP_NAME),
            rfc_enterprise_id: parse_integer(
                ENV_RFC_ENTERPRISE_ID,
                &var(ENV_RFC_ENTERPRISE_ID, DEFAULT_RFC_ENTERPRISE_ID),
            )?,
            rotate_utc: parse_flag(&var(ENV_LOG_ROTATE_UTC, DEFAULT_LOG_ROTATE_UTC)),
            gzip_after_days: parse_integer(
                ENV_GZIP_AFTER_DAYS,
                &var(ENV_GZIP_AFTER_DAYS, DEFAULT_GZIP_AFTER_DAYS),
            )?,
            keep_days: parse_integer(ENV_KEEP_DAYS, &var(ENV_KEEP_DAYS, DEFAULT_KEEP_DAYS))?,
        };

        let keys = KeyPaths {
            public_key_path: PathBuf::from(var(
                ENV_PUBLIC_KEY_B64_PATH,
                DEFAULT_PUBLIC_KEY_B64_PATH,
            )),
            private_key_path: lookup(ENV_PRIVATE_KEY_B64_PATH)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        };

        Ok(Self {
            database_dsn,
            cors_allowed_origins,
            default_query_interval_secs,
            trust_proxy,
            logging,
            keys,
            engine: OnceCell::new(),
        })
    }

    /// The default polling interval as a [`Duration`].
    pub fn default_query_interval(&self) -> Duration {
        Duration::from_secs(self.default_query_interval_secs)
    }

    /// The configured private key path with `~` expanded, if one is set.
    ///
    /// The file is not checked for existence.
    pub fn private_key_path(&self) -> Option<PathBuf> {
        let home = dirs::home_dir();
        self.keys
            .private_key_path
            .as_deref()
            .map(|path| expand_home(path, home.as_deref()))
    }

    /// The public key path exactly as configured.
    pub fn public_key_path(&self) -> &Path {
        &self.keys.public_key_path
    }

    /// The shared database engine, created on first call.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingDatabaseDsn`] if the DSN is empty,
    /// [`ConfigError::NoRuntime`] outside a Tokio runtime, or
    /// [`ConfigError::InvalidDsn`] if the pool rejects it.
    pub fn database_engine(&self) -> Result<&PgPool, ConfigError> {
        database::get_database_engine(self)
    }

    /// A serializable view for operator display, with the DSN redacted.
    pub fn view(&self) -> SettingsView<'_> {
        SettingsView {
            database_dsn: database::redact_dsn(&self.database_dsn),
            cors_allowed_origins: &self.cors_allowed_origins,
            default_query_interval_secs: self.default_query_interval_secs,
            trust_proxy: self.trust_proxy,
            logging: &self.logging,
            public_key_path: &self.keys.public_key_path,
            private_key_path: self.private_key_path(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("database_dsn", &database::redact_dsn(&self.database_dsn))
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("default_query_interval_secs", &self.default_query_interval_secs)
            .field("trust_proxy", &self.trust_proxy)
            .field("logging", &self.logging)
            .field("keys", &self.keys)
            .field("engine_initialized", &self.engine.get().is_some())
            .finish()
    }
}

/// Redacted, serializable projection of [`Settings`].
#[derive(Debug, Serialize)]
pub struct SettingsView<'a> {
    pub database_dsn: String,
    pub cors_allowed_origins: &'a [String],
    pub default_query_interval_secs: u64,
    pub trust_proxy: bool,
    pub logging: &'a LogSettings,
    pub public_key_path: &'a Path,
    pub private_key_path: Option<PathBuf>,
}

/// A settings slot that is filled at most once.
///
/// Concurrent first callers block until the single initializer finishes and
/// then all observe the same instance. A failed initializer leaves the slot
/// empty so a later call may retry.
#[derive(Debug, Default)]
pub struct SettingsCell {
    inner: OnceCell<Settings>,
}

impl SettingsCell {
    /// An empty slot.
    pub const fn new() -> Self {
        Self {
            inner: OnceCell::new(),
        }
    }

    /// Return the stored settings, running `init` only if the slot is empty.
    ///
    /// # Errors
    ///
    /// Propagates the error from `init`; nothing is stored in that case.
    pub fn get_or_load<F>(&self, init: F) -> Result<&Settings, ConfigError>
    where
        F: FnOnce() -> Result<Settings, ConfigError>,
    {
        self.inner.get_or_try_init(|| {
            let settings = init()?;
            debug!(
                app = %settings.logging.app_name,
                cors_origins = settings.cors_allowed_origins.len(),
                has_dsn = !settings.database_dsn.is_empty(),
                "settings loaded"
            );
            Ok(settings)
        })
    }

    /// The stored settings, if loaded.
    pub fn get(&self) -> Option<&Settings> {
        self.inner.get()
    }
}

static PROCESS_SETTINGS: SettingsCell = SettingsCell::new();

/// Load the process-wide settings from the environment.
///
/// Idempotent: after the first successful call the environment is not read
/// again and the stored settings are never replaced.
///
/// # Errors
///
/// Returns [`ConfigError`] if the environment holds an invalid integer.
pub fn load_config() -> Result<(), ConfigError> {
    PROCESS_SETTINGS.get_or_load(Settings::from_env).map(|_| ())
}

/// The process-wide settings, loading them on first use.
///
/// # Errors
///
/// Returns [`ConfigError`] if loading fails.
pub fn current_config() -> Result<&'static Settings, ConfigError> {
    PROCESS_SETTINGS.get_or_load(Settings::from_env)
}
