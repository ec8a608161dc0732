//! Environment-driven configuration.
//!
//! DESIGN
//! ======
//! Every knob has a typed default so a bare `cargo run` starts a working
//! server backed by the in-memory store. Unparseable values fall back to the
//! default rather than aborting startup; only values that change semantics
//! (an unknown marker policy) are rejected.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::time::Duration;

use crate::autosave::MarkerPolicy;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 800;
pub const DEFAULT_WHITEBOARD_ID: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown marker policy `{0}` (expected `optimistic` or `acknowledged`)")]
    UnknownMarkerPolicy(String),
}

/// Parse an environment variable into `T`, falling back to `default` when the
/// variable is missing or malformed.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// SERVER
// =============================================================================

/// Where whiteboard records are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { url: String, max_connections: u32 },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub store: StoreBackend,
}

impl ServerConfig {
    /// Build the server configuration from `PORT`, `DATABASE_URL`, and
    /// `DB_MAX_CONNECTIONS`.
    #[must_use]
    pub fn from_env() -> Self {
        let store = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => StoreBackend::Postgres {
                url,
                max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            },
            _ => StoreBackend::Memory,
        };
        Self { port: env_parse("PORT", DEFAULT_PORT), store }
    }
}

// =============================================================================
// EDITOR / AUTOSAVE
// =============================================================================

/// Client-side settings for an editor session and its autosave pipeline.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub whiteboard_id: String,
    pub debounce: Duration,
    pub marker_policy: MarkerPolicy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            whiteboard_id: DEFAULT_WHITEBOARD_ID.to_owned(),
            debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            marker_policy: MarkerPolicy::Optimistic,
        }
    }
}

impl EditorConfig {
    /// Build from `WHITEBOARD_ID`, `SAVE_DEBOUNCE_MS`, and
    /// `WHITEBOARD_MARKER_POLICY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker policy names an unknown variant.
    pub fn from_env() -> Result<Self, ConfigError> {
        let whiteboard_id = std::env::var("WHITEBOARD_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WHITEBOARD_ID.to_owned());
        let marker_policy = match std::env::var("WHITEBOARD_MARKER_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => MarkerPolicy::Optimistic,
        };
        Ok(Self {
            whiteboard_id,
            debounce: Duration::from_millis(env_parse("SAVE_DEBOUNCE_MS", DEFAULT_SAVE_DEBOUNCE_MS)),
            marker_policy,
        })
    }
}
