use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;

use super::body::encode_body;
use super::{ClientSettings, HttpClient, collect_headers};
use crate::error::{ConfigError, ExchangeError};
use crate::model::{Exchange, Method, Request, Response};
use crate::retry::AttemptCounter;

/// 基于 reqwest 的异步客户端
///
/// 请求在 tokio 运行时上以 future 方式执行，等待网络时不阻塞线程。
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    settings: ClientSettings,
}

impl ReqwestHttpClient {
    pub fn new(id: &str, settings: ClientSettings) -> Result<Self, ConfigError> {
        let builder = reqwest::Client::builder().timeout(settings.timeout);
        let client = settings
            .tls
            .configure_reqwest(builder)?
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client, settings })
    }

    /// 使用外部构建好的 `reqwest::Client`
    pub fn with_client(client: reqwest::Client, settings: ClientSettings) -> Self {
        Self { client, settings }
    }

    pub fn build_request(&self, request: &Request) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(to_reqwest_method(request.method()), request.url());
        for (name, values) in request.headers() {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let body = encode_body(request);
        if let Some(content_type) = &body.content_type {
            if !request.has_header("Content-Type") {
                builder = builder.header(reqwest::header::CONTENT_TYPE, content_type.as_str());
            }
        }
        if !body.is_empty() {
            builder = builder.body(body.bytes);
        }
        builder
    }

    async fn execute(&self, request: &Request) -> Response {
        let response = match self.build_request(request).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Transport error calling {}: {}", request.url(), e);
                return Response::transport_failure(e);
            }
        };

        let status = response.status();
        // hyper 只在服务端返回非标准原因短语时才放入扩展
        let status_message = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
        let headers = collect_headers(
            response
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_bytes())),
        );
        match response.bytes().await {
            Ok(body) => Response::new(i32::from(status.as_u16()), status_message)
                .with_headers(headers)
                .with_body(String::from_utf8_lossy(&body)),
            Err(e) => {
                log::warn!("Cannot read response body from {}: {}", request.url(), e);
                Response::transport_failure(e)
            }
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    fn name(&self) -> &'static str {
        "reqwest"
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

        let response = self.execute(request).await;
        self.build_exchange(request, response, started, moment, attempts)
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Connect => reqwest::Method::CONNECT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Patch => reqwest::Method::PATCH,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Trace => reqwest::Method::TRACE,
    }
}
