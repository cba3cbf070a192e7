use crate::config::{parse_level, ConfigError, FormatterConfig};
use crate::enrich::{StaticPropertiesEnricher, TraceContextEnricher};
use crate::env::{env_var, LOG_MIN_LEVEL_ENV, LOG_SERVICE_NAME_ENV};
use crate::event::Level;
use crate::format::LogFormatter;
use crate::layer::JsonLineLayer;
use crate::sink::LogSink;
use crate::stdout_sink::StdoutSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the [`JsonLineLayer`].
///
/// **Fields**
/// - `channel_buffer`: maximum number of formatted lines queued before new
///   lines are dropped.
/// - `batch_size`: number of lines written to the sink per batch.
/// - `flush_interval`: maximum time between writes even with a partial
///   batch.
/// - `min_level`: events below this level are ignored.
/// - `max_retries`: how often a failing sink write is retried before the
///   rest of the batch is dropped.
/// - `trace_context`: attach `TraceId` / `SpanId` to events emitted inside
///   spans.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub min_level: Level,
    pub max_retries: u32,
    pub trace_context: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            min_level: Level::Information,
            max_retries: 3,
            trace_context: true,
        }
    }
}

/// Error type returned by the `init_*` functions.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid logging configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Build a [`JsonLineLayer`] from a formatter, a sink and a
/// [`LayerConfig`], without installing it.
///
/// Use this to combine the layer with other layers on your own
/// [`Registry`].
pub fn build_layer(
    formatter: Arc<dyn LogFormatter>,
    sink: Arc<dyn LogSink>,
    config: &LayerConfig,
) -> (JsonLineLayer, JoinHandle<()>) {
    let (layer, handle) = JsonLineLayer::new(formatter, sink, config);
    if config.trace_context {
        (layer.with_enricher(Arc::new(TraceContextEnricher)), handle)
    } else {
        (layer, handle)
    }
}

/// Initialize the global `tracing` subscriber with the given formatter,
/// sink and [`LayerConfig`].
///
/// **Parameters**
/// - `formatter`: turns each event into a JSON line.
/// - `sink`: receives the formatted lines.
/// - `config`: buffering, batching and filtering behavior of the layer.
///
/// **Returns**
/// - the handle of the background task writing to the sink.
/// - `Err(InitError::AlreadyInstalled)` if a global subscriber exists.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    formatter: Arc<dyn LogFormatter>,
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let (layer, handle) = build_layer(formatter, sink, &config);
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(handle)
}

/// Initialize tracing with sensible defaults: the given formatter writing
/// to stdout with [`LayerConfig::default`].
pub fn init_tracing(formatter: Arc<dyn LogFormatter>) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(formatter, Arc::new(StdoutSink::new()), LayerConfig::default())
}

/// Initialize tracing from environment variables, writing to stdout.
///
/// The formatter comes from [`FormatterConfig::from_env`]; `LOG_MIN_LEVEL`
/// overrides the minimum level and `LOG_SERVICE_NAME`, when set, is
/// attached to every event as `ServiceName`.
pub fn init_from_env() -> Result<JoinHandle<()>, InitError> {
    let formatter = FormatterConfig::from_env()?.build();

    let mut config = LayerConfig::default();
    if let Some(level) = env_var(LOG_MIN_LEVEL_ENV) {
        config.min_level = parse_level(&level)?;
    }

    let (mut layer, handle) = build_layer(formatter, Arc::new(StdoutSink::new()), &config);
    if let Some(service_name) = env_var(LOG_SERVICE_NAME_ENV) {
        let enricher = StaticPropertiesEnricher::new().with_property("ServiceName", service_name);
        layer = layer.with_enricher(Arc::new(enricher));
    }

    tracing::subscriber::set_global_default(Registry::default().with(layer))?;
    Ok(handle)
}
