use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Severity of a [`LogEvent`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Verbose => "Verbose",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Verbose,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Information,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// A primitive property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    DateTime(DateTime<Utc>),
}

impl fmt::Display for Scalar {
    /// Plain text form: strings are written without quotes and `Null` is
    /// written as nothing at all.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::I64(n) => write!(f, "{}", n),
            Scalar::U64(n) => write!(f, "{}", n),
            Scalar::F64(n) => write!(f, "{}", n),
            Scalar::Str(s) => f.write_str(s),
            Scalar::DateTime(ts) => f.write_str(&crate::record::iso8601(ts)),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => |$v:ident| $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }

            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_from! {
    &str => |value| Scalar::Str(value.to_string()),
    String => |value| Scalar::Str(value),
    bool => |value| Scalar::Bool(value),
    i32 => |value| Scalar::I64(value.into()),
    i64 => |value| Scalar::I64(value),
    u32 => |value| Scalar::U64(value.into()),
    u64 => |value| Scalar::U64(value),
    usize => |value| Scalar::U64(value as u64),
    f64 => |value| Scalar::F64(value),
    DateTime<Utc> => |value| Scalar::DateTime(value),
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// A value whose text is produced on demand through its [`fmt::Display`]
/// implementation.
///
/// This is the catch-all for property kinds the formatters do not know how
/// to destructure. Rendering happens at serialization time and is allowed to
/// fail (the `Display` impl may return [`fmt::Error`]).
#[derive(Clone)]
pub struct OpaqueValue(Arc<dyn fmt::Display + Send + Sync>);

impl OpaqueValue {
    pub fn new<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        OpaqueValue(Arc::new(value))
    }

    /// Render the value into `out`, surfacing a failing `Display` impl.
    pub fn render(&self, out: &mut String) -> fmt::Result {
        use fmt::Write;
        write!(out, "{}", self.0)
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueValue(..)")
    }
}

/// Typed, possibly nested value attached to a [`LogEvent`] under a name.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Scalar(Scalar),
    Sequence(Vec<PropertyValue>),
    /// A record-like value. `type_tag` names the captured type, when known;
    /// it is carried for producers but does not appear in JSON output.
    Structure {
        type_tag: Option<String>,
        fields: Vec<(String, PropertyValue)>,
    },
    Map(Vec<(PropertyValue, PropertyValue)>),
    Opaque(OpaqueValue),
}

impl PropertyValue {
    pub fn structure<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PropertyValue)>,
    {
        PropertyValue::Structure {
            type_tag: None,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn sequence<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = PropertyValue>,
    {
        PropertyValue::Sequence(elements.into_iter().collect())
    }

    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PropertyValue, PropertyValue)>,
    {
        PropertyValue::Map(entries.into_iter().collect())
    }

    pub fn opaque<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        PropertyValue::Opaque(OpaqueValue::new(value))
    }
}

impl From<Scalar> for PropertyValue {
    fn from(value: Scalar) -> Self {
        PropertyValue::Scalar(value)
    }
}

/// One structured logging call: when, how severe, what was said, and the
/// named properties captured alongside it.
///
/// Events are assembled by the producer (see [`crate::layer`]) and handed to
/// exactly one formatter, which only ever reads them.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    properties: Vec<(String, PropertyValue)>,
    pub exception: Option<String>,
}

impl LogEvent {
    /// Create an event stamped with the current time and no properties.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            properties: Vec::new(),
            exception: None,
        }
    }

    /// Override the event timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a property. A property with the same name is replaced in place,
    /// keeping its original position.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(name.into(), value.into());
        self
    }

    /// Attach a pre-rendered exception description.
    pub fn with_exception(mut self, description: impl Into<String>) -> Self {
        self.exception = Some(description.into());
        self
    }

    /// Attach an error, describing it together with its `source()` chain.
    pub fn with_error(mut self, error: &(dyn Error + 'static)) -> Self {
        self.exception = Some(describe_error(error));
        self
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Used by enrichers: adds the property only when no property with that
    /// name exists yet. Returns whether the property was added.
    pub fn add_property_if_absent(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> bool {
        let name = name.into();
        if self.property(&name).is_some() {
            return false;
        }
        self.properties.push((name, value.into()));
        true
    }

    pub(crate) fn set_property(&mut self, name: String, value: PropertyValue) {
        match self.properties.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
    }
}

/// `"outer: caused by: inner: caused by: root"`
pub fn describe_error(error: &(dyn Error + 'static)) -> String {
    let mut description = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        description.push_str(": caused by: ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}
