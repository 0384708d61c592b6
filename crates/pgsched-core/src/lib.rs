//! Core library for pgsched.
//!
//! Shared plumbing for the scheduler API and worker: the environment-driven
//! [`config::Settings`] snapshot with its lazily built Postgres engine, the
//! sealed-box helpers used to protect credentials at rest, and structured
//! logging setup. Nothing here knows about jobs or schedules.

pub mod config;
pub mod database;
mod env;
pub mod error;
pub mod logging;
pub mod sealbox;

pub use config::{Settings, SettingsCell, current_config, load_config};
pub use error::{ConfigError, CryptoError, KeyFormatError};
pub use sealbox::{
    PrivateKey, PublicKey, load_private_key, load_public_key, sealed_box_decrypt,
    sealed_box_encrypt,
};
