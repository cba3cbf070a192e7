use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{info, info_span};

use json_line_log::init::{build_layer, LayerConfig};
use json_line_log::noop_sink::NoopSink;
use json_line_log::JsonLineFormatter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[tokio::main]
async fn main() {
    let formatter = Arc::new(JsonLineFormatter::allow_list(["RequestId", "TraceId", "SpanId"]));
    let (layer, _handle) = build_layer(formatter, Arc::new(NoopSink), &LayerConfig::default());
    let dropped = Arc::clone(&layer.dropped_events);
    tracing::subscriber::set_global_default(Registry::default().with(layer)).expect("set global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    {
        let span = info_span!("load");
        let _entered = span.enter();
        for i in 0..n {
            info!(RequestId = i, Path = "/products", "default load test event");
        }
    }

    let elapsed = start.elapsed();
    println!("default config: formatted {} events in {:?} (~{:.0} ev/s), dropped {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        dropped.load(Ordering::Relaxed),
    );

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
}
