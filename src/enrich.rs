use crate::event::{LogEvent, PropertyValue};

/// Property name carrying the id of the outermost span.
pub const TRACE_ID: &str = "TraceId";

/// Property name carrying the id of the innermost span.
pub const SPAN_ID: &str = "SpanId";

/// Span position of an event at the time it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    pub root_id: u64,
    pub current_id: u64,
}

/// Adds properties to an event before it reaches the formatter.
///
/// Enrichers never overwrite properties the call site already set.
pub trait Enricher: Send + Sync {
    fn enrich(&self, event: &mut LogEvent, span: Option<&SpanContext>);
}

/// Adds `TraceId` and `SpanId` (16 lower-case hex digits each) when the
/// event was recorded inside a span. Events outside any span are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceContextEnricher;

impl Enricher for TraceContextEnricher {
    fn enrich(&self, event: &mut LogEvent, span: Option<&SpanContext>) {
        let Some(span) = span else {
            return;
        };
        event.add_property_if_absent(TRACE_ID, format!("{:016x}", span.root_id));
        event.add_property_if_absent(SPAN_ID, format!("{:016x}", span.current_id));
    }
}

/// Adds a fixed set of properties to every event, e.g. a service name.
#[derive(Debug, Clone, Default)]
pub struct StaticPropertiesEnricher {
    properties: Vec<(String, PropertyValue)>,
}

impl StaticPropertiesEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }
}

impl Enricher for StaticPropertiesEnricher {
    fn enrich(&self, event: &mut LogEvent, _span: Option<&SpanContext>) {
        for (name, value) in &self.properties {
            event.add_property_if_absent(name.clone(), value.clone());
        }
    }
}
