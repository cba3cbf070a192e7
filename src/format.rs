use crate::event::LogEvent;
use crate::policy::{AllowList, FieldPolicy, RenameMap, Route, SnakeCase};
use crate::record::{FallbackRecord, LogRecord, AT_TIMESTAMP_KEY, TIMESTAMP_KEY};
use crate::simplify::{simplify_with, Object, SimplifiedValue};
use std::borrow::Cow;
use std::io::Write;

/// Marker placed between the rendered message and the overflow fields.
pub const EXTRA_FIELDS_MARKER: &str = " | ExtraFields: ";

/// Error type returned by [`LogFormatter::format`].
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("property `{0}` could not be rendered as text")]
    Render(String),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write log line: {0}")]
    Io(#[from] std::io::Error),
}

/// What a formatter does when an event cannot be turned into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Write a single `{"error": ...}` line in place of the event.
    Fallback,
    /// Return the error to the caller and write nothing.
    Propagate,
}

/// Output shape shared by all formatters.
///
/// Owned by each formatter instance and never changed after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonLayout {
    pub timestamp_key: Cow<'static, str>,
    pub error_policy: ErrorPolicy,
}

impl JsonLayout {
    /// `@timestamp`, used by the allow-list and rename-mapping formatters.
    pub fn at_timestamp() -> Self {
        Self {
            timestamp_key: Cow::Borrowed(AT_TIMESTAMP_KEY),
            error_policy: ErrorPolicy::Fallback,
        }
    }

    /// `timestamp`, used by the snake_case formatter.
    pub fn plain_timestamp() -> Self {
        Self {
            timestamp_key: Cow::Borrowed(TIMESTAMP_KEY),
            error_policy: ErrorPolicy::Fallback,
        }
    }

    pub fn with_timestamp_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.timestamp_key = key.into();
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

impl Default for JsonLayout {
    fn default() -> Self {
        Self::at_timestamp()
    }
}

/// Turns a [`LogEvent`] into one JSON line written to `output`.
///
/// Implementations hold only immutable configuration, so one instance can
/// format events from any number of threads. Line atomicity on a shared
/// sink relies on the sink's own per-write atomicity: every line goes out in
/// exactly one `write_all`.
pub trait LogFormatter: Send + Sync {
    /// The complete line for `event`, terminator included, with the error
    /// policy already applied.
    fn format_to_string(&self, event: &LogEvent) -> Result<String, FormatError>;

    fn format(&self, event: &LogEvent, output: &mut dyn Write) -> Result<(), FormatError> {
        let line = self.format_to_string(event)?;
        output.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// The formatting pipeline: simplify each property, route it through the
/// field policy, fold overflow into the message and emit the record.
#[derive(Debug, Clone)]
pub struct JsonLineFormatter<P> {
    policy: P,
    layout: JsonLayout,
}

/// Keeps an allow-list of property names; everything else goes to the message.
pub type AllowListFormatter = JsonLineFormatter<AllowList>;

/// Keeps and renames the properties listed in a rename table.
pub type RenameMapFormatter = JsonLineFormatter<RenameMap>;

/// Keeps every property under a snake_case name.
pub type SnakeCaseFormatter = JsonLineFormatter<SnakeCase>;

impl JsonLineFormatter<AllowList> {
    pub fn allow_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(AllowList::new(names), JsonLayout::at_timestamp())
    }
}

impl JsonLineFormatter<RenameMap> {
    pub fn rename_map<I, K, V>(table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(RenameMap::new(table), JsonLayout::at_timestamp())
    }
}

impl JsonLineFormatter<SnakeCase> {
    pub fn snake_case() -> Self {
        Self::new(SnakeCase, JsonLayout::plain_timestamp())
    }
}

impl<P: FieldPolicy> JsonLineFormatter<P> {
    pub fn new(policy: P, layout: JsonLayout) -> Self {
        Self { policy, layout }
    }

    /// Replace the layout, keeping the policy.
    pub fn with_layout(mut self, layout: JsonLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Build the JSON text for `event` without the line terminator and
    /// without applying the error policy.
    pub fn render(&self, event: &LogEvent) -> Result<String, FormatError> {
        let nested_key = |name: &str| self.policy.nested_key(name);

        let mut fields = Object::new();
        let mut overflow = Vec::new();
        for (name, value) in event.properties() {
            let simplified = simplify_with(value, &nested_key);
            match self.policy.route(name) {
                Route::Field(key) => fields.insert(key.into_owned(), simplified),
                Route::Overflow => overflow.push((name, simplified)),
            }
        }

        let record = LogRecord {
            timestamp_key: &self.layout.timestamp_key,
            timestamp: event.timestamp,
            level: event.level,
            message: append_overflow(&event.message, &overflow)?,
            fields,
            exception: event.exception.as_deref(),
        };
        Ok(serde_json::to_string(&record)?)
    }
}

impl<P: FieldPolicy> LogFormatter for JsonLineFormatter<P> {
    fn format_to_string(&self, event: &LogEvent) -> Result<String, FormatError> {
        let mut line = match self.render(event) {
            Ok(line) => line,
            Err(err) if self.layout.error_policy == ErrorPolicy::Fallback => {
                serde_json::to_string(&FallbackRecord::new(&err))?
            }
            Err(err) => return Err(err),
        };
        line.push('\n');
        Ok(line)
    }
}

/// `"<message> | ExtraFields: k1=v1, k2=v2"`, or the message unchanged when
/// there is no overflow.
pub fn append_overflow(message: &str, overflow: &[(&str, SimplifiedValue)]) -> Result<String, FormatError> {
    if overflow.is_empty() {
        return Ok(message.to_string());
    }

    let mut out = String::with_capacity(message.len() + EXTRA_FIELDS_MARKER.len() + 16 * overflow.len());
    out.push_str(message);
    out.push_str(EXTRA_FIELDS_MARKER);
    for (i, (name, value)) in overflow.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(name);
        out.push('=');
        value
            .write_text(&mut out)
            .map_err(|_| FormatError::Render(name.to_string()))?;
    }
    Ok(out)
}
