use std::time::Duration;

use regex::Regex;

use crate::client::HttpClient;
use crate::error::{ConfigError, ExchangeError};
use crate::model::{Exchange, Request, Response};
use crate::settings::Settings;

pub const RETRIES: &str = "retry.policy.retries";
pub const RETRY_RESPONSE_CODE_REGEX: &str = "retry.policy.response.code.regex";
pub const RETRY_DELAY_IN_MS: &str = "retry.policy.retry.delay.in.ms";
pub const MAX_RETRY_DELAY_IN_MS: &str = "retry.policy.max.retry.delay.in.ms";
pub const RETRY_DELAY_FACTOR: &str = "retry.policy.retry.delay.factor";
pub const RETRY_JITTER_IN_MS: &str = "retry.policy.retry.jitter.in.ms";

/// 默认可重试状态码：5xx 服务器错误
pub const DEFAULT_RETRY_RESPONSE_CODE_REGEX: &str = "^5[0-9][0-9]$";

/// 单次逻辑调用的尝试计数
///
/// 由一个重试序列独占，从 1 开始，每次重试前递增，
/// 最终值写入 `Exchange`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCounter(u32);

impl AttemptCounter {
    pub fn first() -> Self {
        Self(1)
    }

    pub fn starting_at(attempts: u32) -> Self {
        Self(attempts)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// 已经发生的重试次数
    pub fn retries(&self) -> u32 {
        self.0.saturating_sub(1)
    }

    fn increment(&mut self) {
        self.0 += 1;
    }
}

impl Default for AttemptCounter {
    fn default() -> Self {
        Self::first()
    }
}

/// 一次尝试结束后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    TerminalFailure,
}

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 基础延迟时间（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟时间（毫秒）
    pub max_delay_ms: u64,
    /// 指数底数
    pub delay_factor: f64,
    /// 随机抖动上限（毫秒）
    pub jitter_ms: u64,
    retry_response_code: Regex,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 2000,
            max_delay_ms: 20000,
            delay_factor: 1.5,
            jitter_ms: 500,
            retry_response_code: default_retry_regex(),
        }
    }
}

fn default_retry_regex() -> Regex {
    static DEFAULT: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        Regex::new(DEFAULT_RETRY_RESPONSE_CODE_REGEX).expect("default retry regex is valid")
    });
    DEFAULT.clone()
}

impl RetryPolicy {
    /// 不重试
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// 创建指数重试策略
    pub fn exponential(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            delay_factor: 2.0,
            ..Default::default()
        }
    }

    /// 创建固定延迟重试策略
    pub fn fixed(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            delay_factor: 1.0,
            jitter_ms: 0,
            retry_response_code: default_retry_regex(),
        }
    }

    pub fn with_retry_response_code_regex(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.retry_response_code = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn retry_response_code_regex(&self) -> &str {
        self.retry_response_code.as_str()
    }

    /// 从 `config.<id>.` 前缀下的配置读取重试策略
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let defaults = RetryPolicy::default();
        let mut policy = RetryPolicy {
            max_retries: settings.get_or(RETRIES, defaults.max_retries)?,
            base_delay_ms: settings.get_or(RETRY_DELAY_IN_MS, defaults.base_delay_ms)?,
            max_delay_ms: settings.get_or(MAX_RETRY_DELAY_IN_MS, defaults.max_delay_ms)?,
            delay_factor: settings.get_or(RETRY_DELAY_FACTOR, defaults.delay_factor)?,
            jitter_ms: settings.get_or(RETRY_JITTER_IN_MS, defaults.jitter_ms)?,
            retry_response_code: defaults.retry_response_code,
        };
        if policy.delay_factor < 1.0 {
            return Err(ConfigError::invalid_value(
                RETRY_DELAY_FACTOR,
                &policy.delay_factor.to_string(),
                "delay factor must be >= 1.0",
            ));
        }
        if let Some(pattern) = settings.get_string(RETRY_RESPONSE_CODE_REGEX) {
            policy = policy
                .with_retry_response_code_regex(pattern)
                .map_err(|source| ConfigError::InvalidRegex {
                    key: RETRY_RESPONSE_CODE_REGEX.to_string(),
                    source,
                })?;
        }
        Ok(policy)
    }

    /// 计算第 `retry` 次重试前的延迟
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::from_millis(0);
        }

        // 指数退避: base_delay * delay_factor^(retry-1)
        let exponential_delay =
            self.base_delay_ms as f64 * self.delay_factor.powi((retry - 1) as i32);

        // 应用最大延迟限制
        let capped_delay = exponential_delay.min(self.max_delay_ms as f64);

        // 添加随机抖动
        let jitter = if self.jitter_ms > 0 {
            fastrand::u64(0..=self.jitter_ms)
        } else {
            0
        };

        Duration::from_millis(capped_delay as u64 + jitter)
    }

    /// 判断HTTP状态码是否应该重试
    pub fn should_retry_status(&self, status: i32) -> bool {
        self.retry_response_code.is_match(&status.to_string())
    }

    /// 传输层失败总是可重试；其余按状态码正则判断
    pub fn should_retry(&self, response: &Response) -> bool {
        response.is_transport_failure() || self.should_retry_status(response.status_code())
    }

    /// 一次尝试结束后决定下一步
    pub fn classify(&self, exchange: &Exchange, attempts: &AttemptCounter) -> AttemptOutcome {
        if self.should_retry(exchange.response()) && attempts.retries() < self.max_retries {
            AttemptOutcome::RetryableFailure
        } else if exchange.is_success() {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::TerminalFailure
        }
    }
}

/// 重试执行器
///
/// 在一个客户端调用外面包上有界重试。尝试严格串行：
/// 第 N+1 次只会在第 N 次的结果确定之后发起，等待期间不占用线程。
pub struct RetryExecutor;

impl RetryExecutor {
    /// 执行请求（包含重试逻辑）
    ///
    /// 重试耗尽时返回最后一次的 `Exchange`，调用方应检查成功标志。
    pub async fn execute(
        client: &dyn HttpClient,
        policy: &RetryPolicy,
        request: &Request,
    ) -> Result<Exchange, ExchangeError> {
        let mut attempts = AttemptCounter::first();

        loop {
            let exchange = client.call(request, &attempts).await?;

            match policy.classify(&exchange, &attempts) {
                AttemptOutcome::RetryableFailure => {
                    let delay = policy.calculate_delay(attempts.get());
                    log::warn!(
                        "Request to {} failed with status {}, retrying attempt {}/{} in {}ms",
                        request.url(),
                        exchange.response().status_code(),
                        attempts.get() + 1,
                        policy.max_retries + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempts.increment();
                }
                AttemptOutcome::Success => {
                    log::debug!(
                        "Request to {} succeeded after {} attempt(s)",
                        request.url(),
                        attempts.get()
                    );
                    return Ok(exchange);
                }
                AttemptOutcome::TerminalFailure => {
                    log::debug!(
                        "Request to {} failed with status {} after {} attempt(s)",
                        request.url(),
                        exchange.response().status_code(),
                        attempts.get()
                    );
                    return Ok(exchange);
                }
            }
        }
    }
}


// 引入详细测试模块
#[path = "retry_test.rs"]
mod comprehensive_retry_tests;
