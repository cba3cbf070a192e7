use crate::enrich::{Enricher, SpanContext};
use crate::event::{describe_error, Level, LogEvent};
use crate::format::LogFormatter;
use crate::init::LayerConfig;
use crate::sink::LogSink;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// `tracing_subscriber` layer that turns events into JSON lines.
///
/// Each event is converted into a [`LogEvent`], enriched, and formatted on
/// the thread that emitted it. The finished line is handed to a bounded
/// channel; a background task batches lines and writes them to a
/// [`LogSink`], so sink I/O never runs on application threads and lines
/// never interleave.
pub struct JsonLineLayer {
    formatter: Arc<dyn LogFormatter>,
    enrichers: Vec<Arc<dyn Enricher>>,
    min_level: Level,
    sender: mpsc::Sender<String>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Formatted lines successfully enqueued into the channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Events dropped because the channel was full or formatting failed.
    pub dropped_events: Arc<AtomicU64>,
    /// Lines accepted by the sink.
    pub written_lines: Arc<AtomicU64>,
    /// Lines abandoned after the sink kept failing.
    pub failed_lines: Arc<AtomicU64>,
}

impl JsonLineLayer {
    /// Create a new layer and spawn the background task that drains the
    /// channel into `sink`.
    ///
    /// Minimal thresholds are enforced for the buffer, batch size and
    /// flush interval. The task exits once the layer (and with it the
    /// channel sender) is dropped and the remaining lines are written.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        formatter: Arc<dyn LogFormatter>,
        sink: Arc<dyn LogSink>,
        config: &LayerConfig,
    ) -> (Self, JoinHandle<()>) {
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));
        let max_retries = config.max_retries;

        let (tx, mut rx) = mpsc::channel::<String>(buffer);

        let written_lines = Arc::new(AtomicU64::new(0));
        let failed_lines = Arc::new(AtomicU64::new(0));
        let written_bg = Arc::clone(&written_lines);
        let failed_bg = Arc::clone(&failed_lines);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(line) => {
                            batch.push(line);
                            if batch.len() >= batch_size {
                                write_batch(&*sink, &mut batch, max_retries, &written_bg, &failed_bg).await;
                            }
                        }
                        None => {
                            write_batch(&*sink, &mut batch, max_retries, &written_bg, &failed_bg).await;
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            write_batch(&*sink, &mut batch, max_retries, &written_bg, &failed_bg).await;
                        }
                    }
                }
            }
        });

        (
            Self {
                formatter,
                enrichers: Vec::new(),
                min_level: config.min_level,
                sender: tx,
                total_events: Arc::new(AtomicU64::new(0)),
                enqueued_events: Arc::new(AtomicU64::new(0)),
                dropped_events: Arc::new(AtomicU64::new(0)),
                written_lines,
                failed_lines,
            },
            handle,
        )
    }

    /// Run `enricher` on every event, after any enrichers added before it.
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enrichers.push(enricher);
        self
    }

    fn capture<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>, level: Level) -> LogEvent
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let mut log_event = LogEvent::new(level, String::new());
        event.record(&mut FieldVisitor { event: &mut log_event });

        let span = ctx.event_span(event).map(|span| {
            let current_id = span.id().into_u64();
            let root_id = span.scope().last().map(|root| root.id().into_u64()).unwrap_or(current_id);
            SpanContext { root_id, current_id }
        });
        for enricher in &self.enrichers {
            enricher.enrich(&mut log_event, span.as_ref());
        }
        log_event
    }
}

/// Write the whole batch, retrying failed lines with exponential backoff.
/// Lines already accepted are never resent.
async fn write_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<String>,
    max_retries: u32,
    written: &AtomicU64,
    failed: &AtomicU64,
) {
    let mut next = 0;
    let mut attempts = 0;
    let mut backoff = INITIAL_BACKOFF;

    while next < batch.len() {
        match sink.send(&batch[next]).await {
            Ok(()) => {
                written.fetch_add(1, Ordering::Relaxed);
                next += 1;
            }
            Err(e) if attempts < max_retries => {
                attempts += 1;
                eprintln!("log sink send failed, retrying in {:?}: {}", backoff, e);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
            }
            Err(e) => {
                let remaining = (batch.len() - next) as u64;
                failed.fetch_add(remaining, Ordering::Relaxed);
                eprintln!("dropping {} log lines after {} retries: {}", remaining, attempts, e);
                break;
            }
        }
    }

    if let Err(e) = sink.flush().await {
        eprintln!("error flushing log sink: {}", e);
    }
    batch.clear();
}

impl<S> Layer<S> for JsonLineLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let level = Level::from(*event.metadata().level());
        if level < self.min_level {
            return;
        }

        let log_event = self.capture(event, &ctx, level);
        let line = match self.formatter.format_to_string(&log_event) {
            Ok(line) => line,
            Err(e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("failed to format log event: {}", e);
                return;
            }
        };

        match self.sender.try_send(line) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping log line");
            }
        }
    }
}

use tracing::field::{Field, Visit};

/// Copies `tracing` fields onto a [`LogEvent`]: `message` becomes the
/// message text, error values become the exception, everything else a
/// scalar property.
pub struct FieldVisitor<'a> {
    pub event: &'a mut LogEvent,
}

impl FieldVisitor<'_> {
    fn record_text(&mut self, field: &Field, text: String) {
        if field.name() == "message" {
            self.event.message = text;
        } else {
            self.event.set_property(field.name().to_string(), text.into());
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.event.set_property(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.event.set_property(field.name().to_string(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.event.set_property(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.event.set_property(field.name().to_string(), value.into());
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.event.exception = Some(describe_error(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}
