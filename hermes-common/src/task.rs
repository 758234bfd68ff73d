use std::sync::Arc;
use std::time::Instant;

use crate::config::ConfigurationRegistry;
use crate::error::{ConfigError, ExchangeError};
use crate::metrics::{MetricsRecorder, NoopMetrics};
use crate::model::{Exchange, Request};
use crate::settings::Settings;

/// 请求分发器
///
/// 为每个请求选出配置、计数、执行带重试的调用，并按配置 id 记录结果。
/// 只需要 `&self`，可以放在 `Arc` 后面被多个任务并发使用。
#[derive(Clone)]
pub struct HttpTask {
    registry: Arc<ConfigurationRegistry>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl HttpTask {
    pub fn new(registry: ConfigurationRegistry, metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            registry: Arc::new(registry),
            metrics,
        }
    }

    /// 不记录指标
    pub fn without_metrics(registry: ConfigurationRegistry) -> Self {
        Self::new(registry, Arc::new(NoopMetrics))
    }

    pub fn from_settings(
        settings: &Settings,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigurationRegistry::from_settings(settings)?, metrics))
    }

    pub fn registry(&self) -> &ConfigurationRegistry {
        &self.registry
    }

    /// 执行一个请求，返回最终的 `Exchange`
    ///
    /// 调用失败（包括重试耗尽）体现在 `Exchange::is_success` 上，不是 `Err`。
    pub async fn submit(&self, request: Request) -> Result<Exchange, ExchangeError> {
        let configuration = self.registry.select(&request);
        let id = configuration.id();
        log::debug!(
            "Dispatching {} {} with configuration '{}'",
            request.method().as_str(),
            request.url(),
            id
        );
        self.metrics.record_call(id);

        let started = Instant::now();
        let exchange = configuration.call(&request).await?;
        self.metrics
            .record_exchange(id, exchange.is_success(), started.elapsed());
        Ok(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, DEFAULT_CONFIGURATION_ID, RequestPredicate};
    use crate::client::{ClientSettings, HttpClient, ReqwestHttpClient};
    use crate::metrics::InMemoryMetrics;
    use crate::retry::RetryPolicy;

    fn unreachable_client() -> Arc<dyn HttpClient> {
        Arc::new(ReqwestHttpClient::new("test", ClientSettings::default()).unwrap())
    }

    #[tokio::test]
    async fn test_submit_records_metrics_per_configuration() {
        let registry = ConfigurationRegistry::builder()
            .register(
                Configuration::new("health", unreachable_client())
                    .with_matcher(RequestPredicate::any().url_regex("/health$").unwrap())
                    .with_retry_policy(RetryPolicy::none()),
            )
            .register(
                Configuration::new(DEFAULT_CONFIGURATION_ID, unreachable_client())
                    .with_retry_policy(RetryPolicy::fixed(1, 0)),
            )
            .build()
            .unwrap();
        let metrics = Arc::new(InMemoryMetrics::new());
        let task = HttpTask::new(registry, metrics.clone());

        let health = task
            .submit(Request::get("http://127.0.0.1:1/health"))
            .await
            .unwrap();
        assert!(!health.is_success());
        assert_eq!(health.attempts(), 1);

        let other = task
            .submit(Request::get("http://127.0.0.1:1/orders"))
            .await
            .unwrap();
        assert_eq!(other.attempts(), 2);

        let stats = metrics.stats("health");
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(metrics.stats(DEFAULT_CONFIGURATION_ID).calls, 1);
    }
}
