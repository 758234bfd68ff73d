use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;

use super::body::encode_body;
use super::{ClientSettings, HttpClient, collect_headers};
use crate::error::{ConfigError, ExchangeError};
use crate::model::{Exchange, Request, Response};
use crate::retry::AttemptCounter;

/// 基于 ureq 的同步客户端
///
/// 阻塞调用放在 tokio 的阻塞线程池上执行，完成后恢复调用方的 future，
/// 对外契约与 [`ReqwestHttpClient`](super::ReqwestHttpClient) 完全一致。
pub struct UreqHttpClient {
    agent: ureq::Agent,
    settings: ClientSettings,
}

impl UreqHttpClient {
    pub fn new(_id: &str, settings: ClientSettings) -> Result<Self, ConfigError> {
        // 4xx/5xx 作为普通响应返回，由成功判定和重试策略处理
        let mut config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(settings.timeout));
        if let Some(tls) = settings.tls.ureq_tls_config()? {
            config = config.tls_config(tls);
        }

        Ok(Self {
            agent: config.build().new_agent(),
            settings,
        })
    }
}

#[async_trait]
impl HttpClient for UreqHttpClient {
    fn name(&self) -> &'static str {
        "ureq"
    }

    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn call(
        &self,
        request: &Request,
        attempts: &AttemptCounter,
    ) -> Result<Exchange, ExchangeError> {
        let moment = Utc::now();
        let started = Instant::now();
        log::debug!(
            "Calling {} {} (attempt {})",
            request.method().as_str(),
            request.url(),
            attempts.get()
        );

        let agent = self.agent.clone();
        let owned = request.clone();
        let response = match tokio::task::spawn_blocking(move || execute_blocking(&agent, &owned)).await {
            Ok(response) => response,
            Err(e) => Response::transport_failure(e),
        };

        self.build_exchange(request, response, started, moment, attempts)
    }
}

fn execute_blocking(agent: &ureq::Agent, request: &Request) -> Response {
    let mut builder = ureq::http::Request::builder()
        .method(request.method().as_str())
        .uri(request.url());
    for (name, values) in request.headers() {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    let body = encode_body(request);
    if let Some(content_type) = &body.content_type {
        if !request.has_header("Content-Type") {
            builder = builder.header("Content-Type", content_type.as_str());
        }
    }

    let outcome = if body.is_empty() {
        builder.body(()).map(|http_request| agent.run(http_request))
    } else {
        builder.body(body.bytes).map(|http_request| agent.run(http_request))
    };

    let mut response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            log::warn!("Transport error calling {}: {}", request.url(), e);
            return Response::transport_failure(e);
        }
        Err(e) => {
            log::warn!("Invalid request for {}: {}", request.url(), e);
            return Response::transport_failure(e);
        }
    };

    let status = response.status();
    let headers = collect_headers(
        response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes())),
    );
    // ureq 不保留原因短语，只能使用标准短语
    match response.body_mut().with_config().limit(u64::MAX).read_to_vec() {
        Ok(body) => Response::new(
            i32::from(status.as_u16()),
            status.canonical_reason().unwrap_or_default(),
        )
        .with_headers(headers)
        .with_body(String::from_utf8_lossy(&body)),
        Err(e) => {
            log::warn!("Cannot read response body from {}: {}", request.url(), e);
            Response::transport_failure(e)
        }
    }
}
