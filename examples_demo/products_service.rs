use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, info_span, Instrument};

use json_line_log::config::FormatterConfig;
use json_line_log::init::{init_tracing_with_config, LayerConfig};
use json_line_log::stdout_sink::StdoutSink;

#[derive(Debug)]
struct Product {
    id: u32,
    name: &'static str,
    price: f64,
}

const PRODUCT_NAMES: [&str; 6] = ["Laptop", "Mouse", "Keyboard", "Monitor", "Printer", "Headset"];

fn products(seed: usize) -> Vec<Product> {
    (1..=3)
        .map(|id| Product {
            id,
            name: PRODUCT_NAMES[(seed + id as usize) % PRODUCT_NAMES.len()],
            price: ((seed * 37 + id as usize * 113) % 100_000) as f64 / 100.0,
        })
        .collect()
}

/// Pretend request handler. Run with e.g.
/// `LOG_FORMAT=snake-case cargo run --example products_service`.
#[tokio::main]
async fn main() {
    let formatter = FormatterConfig::from_env().expect("valid LOG_FORMAT").build();
    let config = LayerConfig {
        flush_interval: Duration::from_millis(50),
        ..LayerConfig::default()
    };
    let handle = init_tracing_with_config(formatter, Arc::new(StdoutSink::new()), config)
        .expect("install subscriber");

    for request in 0..3usize {
        let span = info_span!("GET /products", request);
        async {
            let products = products(request);
            info!(
                RequestId = format!("req-{:04}", request).as_str(),
                ProductCount = products.len(),
                Cheapest = ?products.iter().map(|p| p.price).fold(f64::INFINITY, f64::min),
                "Retrieved {} products",
                products.len()
            );
            if products.iter().any(|p| p.name == "Printer") {
                let err = std::io::Error::new(std::io::ErrorKind::Other, "printer driver missing");
                error!(
                    RequestId = format!("req-{:04}", request).as_str(),
                    ProductId = products[0].id,
                    error = &err as &(dyn std::error::Error + 'static),
                    "Failed to render product sheet"
                );
            }
        }
        .instrument(span)
        .await;
    }

    sleep(Duration::from_millis(200)).await;
    drop(handle);
}
