use serde::{Deserialize, Serialize};

use super::Headers;

/// 传输层失败时使用的状态码（连接失败、超时、读取响应体失败）
pub const TRANSPORT_FAILURE_STATUS: i32 = 0;

/// HTTP 响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    status_code: i32,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    headers: Headers,
    #[serde(default)]
    body: String,
}

impl Response {
    pub fn new(status_code: i32, status_message: impl Into<String>) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
            headers: Headers::new(),
            body: String::new(),
        }
    }

    /// 传输层失败的占位响应，错误信息放在状态消息里
    pub fn transport_failure(error: impl std::fmt::Display) -> Self {
        Self::new(TRANSPORT_FAILURE_STATUS, error.to_string())
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status_code == TRANSPORT_FAILURE_STATUS
    }

    pub(crate) fn truncate(mut self, status_message_limit: Option<usize>, body_limit: Option<usize>) -> Self {
        if let Some(limit) = status_message_limit {
            truncate_chars(&mut self.status_message, limit);
        }
        if let Some(limit) = body_limit {
            truncate_chars(&mut self.body, limit);
        }
        self
    }
}

/// 保留前 `limit` 个字符，按字符边界截断
fn truncate_chars(value: &mut String, limit: usize) {
    if let Some((idx, _)) = value.char_indices().nth(limit) {
        value.truncate(idx);
    }
}
