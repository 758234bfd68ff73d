use std::sync::Arc;

use hermes_common::{InMemoryMetrics, QueueRegistry, Settings};
use hermes_connect::{HttpSinkConnector, HttpSinkTask, HttpSourceTask, SinkRecord};
use log::info;
use serde_json::json;

/// 两套配置：httpbin 的 /status 走快速重试，其余走默认配置
fn settings() -> Settings {
    Settings::new()
        .with("success.topic", "http-success")
        .with("error.topic", "http-error")
        .with("queue.name", "demo")
        .with("publish.to.in.memory.queue", "true")
        .with("generate.missing.request.id", "true")
        .with("generate.missing.correlation.id", "true")
        .with("static.request.header.names", "X-Client")
        .with("X-Client", "hermes-demo")
        .with("config.ids", "status")
        .with("config.status.url.regex", "/status/")
        .with("config.status.retry.policy.retries", "3")
        .with("config.status.retry.policy.retry.delay.in.ms", "100")
        .with("config.status.retry.policy.retry.jitter.in.ms", "50")
        .with("config.status.httpclient.implementation", "ureq")
        .with("config.default.http.response.body.limit", "200")
}

fn record(url: &str, method: &str) -> SinkRecord {
    let value = json!({
        "url": url,
        "method": method,
        "bodyAsString": "",
        "bodyType": "STRING"
    });
    SinkRecord::new("http-requests", value.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("=== Hermes HTTP bridge demo ===\n");

    let settings = settings();
    let mut connector = HttpSinkConnector::new();
    connector.start(settings.clone())?;

    let queues = Arc::new(QueueRegistry::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let mut sink = HttpSinkTask::new(queues.clone(), metrics.clone());
    sink.start(&settings)?;
    let mut source = HttpSourceTask::new(queues.clone());
    source.start(&settings)?;

    let records = vec![
        record("https://httpbin.org/get", "GET"),
        record("https://httpbin.org/status/503", "GET"),
        record("https://httpbin.org/status/404", "GET"),
    ];
    let exchanges = sink.put(records).await?;
    for exchange in &exchanges {
        println!(
            "{} -> {} (attempts: {}, success: {}, {}ms)",
            exchange.request().url(),
            exchange.response().status_code(),
            exchange.attempts(),
            exchange.is_success(),
            exchange.duration_in_millis()
        );
    }

    println!("\n📤 Published records:");
    for record in source.poll()? {
        println!("  [{}] {}", record.topic, record.value);
    }

    println!("\n📊 Metrics:");
    for (id, stats) in metrics.snapshot() {
        info!("configuration '{}': {:?}", id, stats);
        println!(
            "  {}: {} call(s), {} success, {} failure",
            id, stats.calls, stats.successes, stats.failures
        );
    }

    sink.stop();
    source.stop();
    connector.stop();
    queues.shutdown();
    Ok(())
}
