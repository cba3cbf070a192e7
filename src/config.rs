use std::sync::Arc;

use crate::env::{env_var, LOG_ALLOWED_FIELDS_ENV, LOG_FIELD_MAPPINGS_ENV, LOG_FORMAT_ENV};
use crate::event::Level;
use crate::format::{JsonLineFormatter, LogFormatter};

/// Properties kept by the allow-list formatter when nothing else is
/// configured.
pub const DEFAULT_ALLOWED_FIELDS: [&str; 3] = ["RequestId", "TraceId", "SpanId"];

/// Supported formatter kinds that can be selected via a format spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterKind {
    AllowList,
    RenameMap,
    SnakeCase,
}

impl FormatterKind {
    fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "allow-list" | "allowlist" | "controlled" => Ok(FormatterKind::AllowList),
            "mapped" | "rename" | "rename-map" => Ok(FormatterKind::RenameMap),
            "snake-case" | "snake_case" | "snake" => Ok(FormatterKind::SnakeCase),
            _ => Err(ConfigError::UnknownFormat(name.trim().to_string())),
        }
    }
}

/// Construction-time configuration of one formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatterConfig {
    AllowList(Vec<String>),
    RenameMap(Vec<(String, String)>),
    SnakeCase,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        FormatterConfig::AllowList(DEFAULT_ALLOWED_FIELDS.iter().map(|f| f.to_string()).collect())
    }
}

impl FormatterConfig {
    pub fn kind(&self) -> FormatterKind {
        match self {
            FormatterConfig::AllowList(_) => FormatterKind::AllowList,
            FormatterConfig::RenameMap(_) => FormatterKind::RenameMap,
            FormatterConfig::SnakeCase => FormatterKind::SnakeCase,
        }
    }

    /// Create the formatter described by this configuration.
    pub fn build(&self) -> Arc<dyn LogFormatter> {
        match self {
            FormatterConfig::AllowList(fields) => Arc::new(JsonLineFormatter::allow_list(fields)),
            FormatterConfig::RenameMap(table) => Arc::new(JsonLineFormatter::rename_map(table.iter().cloned())),
            FormatterConfig::SnakeCase => Arc::new(JsonLineFormatter::snake_case()),
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// See [`FormatterConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    /// Build the configuration from `LOG_FORMAT`, falling back to
    /// `LOG_ALLOWED_FIELDS` / `LOG_FIELD_MAPPINGS` when the format spec has
    /// no inline argument.
    ///
    /// Without any variables set this is the allow-list formatter keeping
    /// [`DEFAULT_ALLOWED_FIELDS`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let spec = match lookup(LOG_FORMAT_ENV) {
            Some(spec) => spec,
            None => return Self::from_lookup_kind(&lookup, FormatterKind::AllowList),
        };
        match spec.split_once(':') {
            Some(_) => parse_format_spec(&spec),
            None => Self::from_lookup_kind(&lookup, FormatterKind::parse(&spec)?),
        }
    }

    fn from_lookup_kind<F>(lookup: &F, kind: FormatterKind) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match kind {
            FormatterKind::AllowList => match lookup(LOG_ALLOWED_FIELDS_ENV) {
                Some(list) => Ok(FormatterConfig::AllowList(parse_field_list(&list))),
                None => Ok(FormatterConfig::default()),
            },
            FormatterKind::RenameMap => match lookup(LOG_FIELD_MAPPINGS_ENV) {
                Some(table) => Ok(FormatterConfig::RenameMap(parse_mappings(&table)?)),
                None => Err(ConfigError::MissingMappings),
            },
            FormatterKind::SnakeCase => Ok(FormatterConfig::SnakeCase),
        }
    }
}

/// Parse a format spec string into a [`FormatterConfig`].
///
/// Examples:
/// - "allow-list" (keeps [`DEFAULT_ALLOWED_FIELDS`])
/// - "allow-list:RequestId,TraceId"
/// - "allow-list:" (empty allow-list, every property overflows)
/// - "mapped:RequestId=request_id,TraceId=trace_id"
/// - "snake-case"
pub fn parse_format_spec(spec: &str) -> Result<FormatterConfig, ConfigError> {
    let (name, args) = match spec.split_once(':') {
        Some((name, args)) => (name, Some(args)),
        None => (spec, None),
    };

    match (FormatterKind::parse(name)?, args) {
        (FormatterKind::AllowList, None) => Ok(FormatterConfig::default()),
        (FormatterKind::AllowList, Some(list)) => Ok(FormatterConfig::AllowList(parse_field_list(list))),
        (FormatterKind::RenameMap, None) => Err(ConfigError::MissingMappings),
        (FormatterKind::RenameMap, Some(table)) => Ok(FormatterConfig::RenameMap(parse_mappings(table)?)),
        (FormatterKind::SnakeCase, None) => Ok(FormatterConfig::SnakeCase),
        (FormatterKind::SnakeCase, Some(args)) => Err(ConfigError::UnexpectedArguments(args.to_string())),
    }
}

/// Split a comma-separated list, trimming entries and skipping empty ones.
pub fn parse_field_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `Source=target` pairs separated by commas. Source names must be
/// unique.
pub fn parse_mappings(table: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let mut mappings: Vec<(String, String)> = Vec::new();
    for entry in parse_field_list(table) {
        let (source, target) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidMapping(entry.clone()))?;
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return Err(ConfigError::InvalidMapping(entry.clone()));
        }
        if mappings.iter().any(|(existing, _)| existing == source) {
            return Err(ConfigError::DuplicateMapping(source.to_string()));
        }
        mappings.push((source.to_string(), target.to_string()));
    }
    Ok(mappings)
}

/// Parse a level name, case-insensitively. `tracing` spellings are
/// accepted too (`trace`, `info`, `warn`).
pub fn parse_level(name: &str) -> Result<Level, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "verbose" | "trace" => Ok(Level::Verbose),
        "debug" => Ok(Level::Debug),
        "information" | "info" => Ok(Level::Information),
        "warning" | "warn" => Ok(Level::Warning),
        "error" => Ok(Level::Error),
        "fatal" => Ok(Level::Fatal),
        _ => Err(ConfigError::UnknownLevel(name.trim().to_string())),
    }
}

/// Error type returned when parsing formatter configuration.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown log format: {0:?}")]
    UnknownFormat(String),

    #[error("invalid field mapping {0:?}, expected Source=target")]
    InvalidMapping(String),

    #[error("field {0:?} is mapped more than once")]
    DuplicateMapping(String),

    #[error("the mapped formatter needs a field mapping table")]
    MissingMappings,

    #[error("the snake-case formatter takes no arguments, got {0:?}")]
    UnexpectedArguments(String),

    #[error("unknown log level: {0:?}")]
    UnknownLevel(String),
}
