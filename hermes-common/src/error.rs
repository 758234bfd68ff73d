use thiserror::Error;

/// 交换记录构造错误
///
/// 构造 `Exchange` 时立即失败，不做任何静默修正。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("an exchange requires a request")]
    MissingRequest,

    #[error("an exchange requires a response")]
    MissingResponse,

    #[error("response status code must be >= 0, got {0}")]
    NegativeStatusCode(i32),
}

/// 枚举值无法识别
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// 配置错误（启动阶段致命）
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting '{key}'")]
    MissingSetting { key: String },

    #[error("invalid value '{value}' for setting '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid regex for setting '{key}': {source}")]
    InvalidRegex {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown http client implementation '{value}' for configuration '{id}'")]
    UnknownClientImplementation { id: String, value: String },

    #[error("no default configuration registered")]
    MissingDefaultConfiguration,

    #[error("configuration '{id}' is registered more than once")]
    DuplicateConfiguration { id: String },

    #[error("cannot load trust store '{path}': {message}")]
    TrustStore { path: String, message: String },

    #[error("cannot build http client for configuration '{id}': {message}")]
    ClientBuild { id: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid_value(key: &str, value: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
