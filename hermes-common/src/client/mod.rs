pub mod body;
pub mod reqwest_client;
pub mod tls;
pub mod ureq_client;

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{ConfigError, ExchangeError, UnknownVariant};
use crate::model::{Exchange, Headers, Request, Response};
use crate::retry::AttemptCounter;
use crate::settings::Settings;

pub use reqwest_client::ReqwestHttpClient;
pub use tls::{TlsSettings, TrustStoreType};
pub use ureq_client::UreqHttpClient;

pub const IMPLEMENTATION: &str = "httpclient.implementation";
pub const CALL_TIMEOUT_MS: &str = "httpclient.call.timeout.ms";
pub const SUCCESS_RESPONSE_CODE_REGEX: &str = "success.response.code.regex";
pub const STATUS_MESSAGE_LIMIT: &str = "http.response.message.status.limit";
pub const BODY_LIMIT: &str = "http.response.body.limit";

/// 默认成功状态码：200-399
pub const DEFAULT_SUCCESS_RESPONSE_CODE_REGEX: &str = "^[2-3][0-9][0-9]$";
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

static DEFAULT_SUCCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_SUCCESS_RESPONSE_CODE_REGEX).expect("default success regex is valid")
});

/// 成功判定：对十进制状态码做正则匹配
#[derive(Debug, Clone)]
pub struct SuccessMatcher {
    pattern: Regex,
}

impl SuccessMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, response: &Response) -> bool {
        !response.is_transport_failure()
            && self.pattern.is_match(&response.status_code().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for SuccessMatcher {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_SUCCESS.clone(),
        }
    }
}

/// 响应截断限制，`None` 表示不限制
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Truncation {
    pub status_message_limit: Option<usize>,
    pub body_limit: Option<usize>,
}

impl Truncation {
    pub fn apply(&self, response: Response) -> Response {
        response.truncate(self.status_message_limit, self.body_limit)
    }
}

/// 单个客户端的运行参数
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// 单次尝试超时
    pub timeout: Duration,
    pub truncation: Truncation,
    pub success: SuccessMatcher,
    pub tls: TlsSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            truncation: Truncation::default(),
            success: SuccessMatcher::default(),
            tls: TlsSettings::default(),
        }
    }
}

impl ClientSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let success = match settings.get_string(SUCCESS_RESPONSE_CODE_REGEX) {
            Some(pattern) => {
                SuccessMatcher::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                    key: SUCCESS_RESPONSE_CODE_REGEX.to_string(),
                    source,
                })?
            }
            None => SuccessMatcher::default(),
        };

        Ok(Self {
            timeout: Duration::from_millis(settings.get_or(CALL_TIMEOUT_MS, DEFAULT_CALL_TIMEOUT_MS)?),
            truncation: Truncation {
                status_message_limit: settings.get_parsed(STATUS_MESSAGE_LIMIT)?,
                body_limit: settings.get_parsed(BODY_LIMIT)?,
            },
            success,
            tls: TlsSettings::from_settings(settings)?,
        })
    }
}

/// 可选的传输实现
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientImplementation {
    /// 异步 future 风格
    #[default]
    Reqwest,
    /// 同步阻塞风格，在阻塞线程池上执行
    Ureq,
}

impl std::str::FromStr for ClientImplementation {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reqwest" => Ok(ClientImplementation::Reqwest),
            "ureq" => Ok(ClientImplementation::Ureq),
            _ => Err(UnknownVariant::new("http client implementation", s)),
        }
    }
}

impl ClientImplementation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientImplementation::Reqwest => "reqwest",
            ClientImplementation::Ureq => "ureq",
        }
    }
}

/// 按配置构建客户端
pub fn build_client(id: &str, settings: &Settings) -> Result<Arc<dyn HttpClient>, ConfigError> {
    let implementation = match settings.get_string(IMPLEMENTATION) {
        None => ClientImplementation::default(),
        Some(value) => value.parse::<ClientImplementation>().map_err(|_| {
            ConfigError::UnknownClientImplementation {
                id: id.to_string(),
                value: value.to_string(),
            }
        })?,
    };
    let client_settings = ClientSettings::from_settings(settings)?;
    log::debug!(
        "Building {} client for configuration '{}'",
        implementation.as_str(),
        id
    );

    let client: Arc<dyn HttpClient> = match implementation {
        ClientImplementation::Reqwest => Arc::new(ReqwestHttpClient::new(id, client_settings)?),
        ClientImplementation::Ureq => Arc::new(UreqHttpClient::new(id, client_settings)?),
    };
    Ok(client)
}

/// HTTP 客户端抽象
///
/// 每次 `call` 只做一次网络尝试，不负责重试。传输层失败不会返回 `Err`，
/// 而是产出一个状态码为 0、`success = false` 的 `Exchange`。
#[async_trait]
pub trait HttpClient: Send + Sync {
    fn name(&self) -> &'static str;

    fn settings(&self) -> &ClientSettings;

    async fn call(
        &self,
        request: &Request,
        attempts: &AttemptCounter,
    ) -> Result<Exchange, ExchangeError>;

    fn build_exchange(
        &self,
        request: &Request,
        response: Response,
        started: Instant,
        moment: DateTime<Utc>,
        attempts: &AttemptCounter,
    ) -> Result<Exchange, ExchangeError> {
        build_exchange(self.settings(), request, response, started, moment, attempts)
    }
}

/// 组装 `Exchange`：判定成功、应用截断、记录耗时与开始时间
pub fn build_exchange(
    settings: &ClientSettings,
    request: &Request,
    response: Response,
    started: Instant,
    moment: DateTime<Utc>,
    attempts: &AttemptCounter,
) -> Result<Exchange, ExchangeError> {
    let success = settings.success.matches(&response);
    Exchange::builder()
        .request(request.clone())
        .response(settings.truncation.apply(response))
        .duration(started.elapsed())
        .moment(moment)
        .attempts(attempts.get())
        .success(success)
        .build()
}

/// 把传输层的响应头转成 `Headers`
pub(crate) fn collect_headers<'a>(headers: impl Iterator<Item = (&'a str, &'a [u8])>) -> Headers {
    let mut collected = Headers::new();
    for (name, value) in headers {
        collected
            .entry(name.to_string())
            .or_default()
            .push(String::from_utf8_lossy(value).into_owned());
    }
    collected
}
