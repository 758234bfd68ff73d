use std::sync::Arc;
use std::time::Instant;

use hermes_common::client::ClientSettings;
use hermes_common::{Configuration, ReqwestHttpClient, Request, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("=== Retry policies ===\n");

    let client = Arc::new(ReqwestHttpClient::new("demo", ClientSettings::default())?);
    let policies = [
        ("none", RetryPolicy::none()),
        ("fixed(2, 200ms)", RetryPolicy::fixed(2, 200)),
        ("exponential(3, 100ms)", RetryPolicy::exponential(3, 100)),
    ];

    for (name, policy) in policies {
        for retry in 1..=policy.max_retries {
            println!("  {} delay before retry {}: {:?}", name, retry, policy.calculate_delay(retry));
        }

        let configuration = Configuration::new(name, client.clone()).with_retry_policy(policy);
        let started = Instant::now();
        let exchange = configuration
            .call(&Request::get("https://httpbin.org/status/500"))
            .await?;
        println!(
            "🔄 {}: status {} after {} attempt(s) in {:?}\n",
            name,
            exchange.response().status_code(),
            exchange.attempts(),
            started.elapsed()
        );
    }

    Ok(())
}
