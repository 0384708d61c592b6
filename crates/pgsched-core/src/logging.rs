//! Structured logging setup and log-record hygiene.
//!
//! Records are emitted as JSON via `tracing-subscriber`. Before a payload
//! (request body, job parameters) is attached to a record, it goes through
//! [`redact_json`] and [`truncate_record`] so that configured secret fields
//! never reach the log and no single record exceeds the size cap.

use serde_json::Value;
use tracing_subscriber::util::{SubscriberInitExt as _, TryInitError};

use crate::config::LogSettings;

/// Placeholder written in place of redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Install the global JSON subscriber on stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`.
///
/// # Errors
///
/// Returns [`TryInitError`] if a global subscriber is already installed;
/// the existing subscriber stays in place.
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .finish()
        .try_init()
}

/// Replace the value of every redacted key, at any depth, with [`REDACTED`].
pub fn redact_json(value: &mut Value, settings: &LogSettings) {
    match value {
        Value::Object(map) => {
            for (key, field) in map {
                if settings.is_redacted(key) {
                    *field = Value::String(REDACTED.to_owned());
                } else {
                    redact_json(field, settings);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_json(item, settings);
            }
        }
        _ => {}
    }
}

/// Cut `text` to at most `max_bytes` without splitting a UTF-8 character.
pub fn truncate_record(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
