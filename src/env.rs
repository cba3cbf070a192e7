//! Environment variable names used by this crate for convenient
//! configuration of the console formatter from services.
//!
//! These are purely helpers; the formatter types remain decoupled from
//! environment access.

/// Formatter selection, e.g. `allow-list`, `mapped`, `snake-case`, or a full
/// format spec such as `allow-list:RequestId,TraceId`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Comma-separated property names kept by the allow-list formatter.
pub const LOG_ALLOWED_FIELDS_ENV: &str = "LOG_ALLOWED_FIELDS";

/// Comma-separated `Source=target` pairs used by the rename-mapping formatter.
pub const LOG_FIELD_MAPPINGS_ENV: &str = "LOG_FIELD_MAPPINGS";

/// Minimum level written, e.g. `Information` or `warn`.
pub const LOG_MIN_LEVEL_ENV: &str = "LOG_MIN_LEVEL";

/// Optional logical service name attached to every event as `ServiceName`.
pub const LOG_SERVICE_NAME_ENV: &str = "LOG_SERVICE_NAME";

/// Read an environment variable, treating unset, non-unicode and blank
/// values alike as absent. Surrounding whitespace is trimmed.
pub fn env_var(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
