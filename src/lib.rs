//! Structured log events rendered as one JSON object per line.
//!
//! Three formatters share one pipeline and differ only in their
//! [`policy::FieldPolicy`]:
//! - [`AllowListFormatter`]: keeps listed properties, folds the rest into the
//!   message after `" | ExtraFields: "`.
//! - [`RenameMapFormatter`]: keeps and renames properties from a table, folds
//!   the rest into the message.
//! - [`SnakeCaseFormatter`]: keeps everything under snake_case names.
//!
//! [`layer::JsonLineLayer`] plugs a formatter into `tracing`.

pub mod event;
pub mod simplify;
pub mod policy;
pub mod record;
pub mod format;

pub mod enrich;
pub mod sink;
pub mod layer;
pub mod config;
pub mod env;
pub mod init;
pub mod memory_sink;
pub mod noop_sink;
pub mod stdout_sink;

pub use event::{Level, LogEvent, PropertyValue, Scalar};
pub use format::{
    AllowListFormatter, ErrorPolicy, FormatError, JsonLayout, JsonLineFormatter, LogFormatter,
    RenameMapFormatter, SnakeCaseFormatter,
};
