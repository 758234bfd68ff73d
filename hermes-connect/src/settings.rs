use hermes_common::queue::DEFAULT_QUEUE_NAME;
use hermes_common::{ConfigError, Settings};

pub const SUCCESS_TOPIC: &str = "success.topic";
pub const ERROR_TOPIC: &str = "error.topic";
pub const QUEUE_NAME: &str = "queue.name";
pub const POLL_BATCH_SIZE: &str = "poll.batch.size";
pub const PUBLISH_TO_IN_MEMORY_QUEUE: &str = "publish.to.in.memory.queue";
pub const GENERATE_MISSING_REQUEST_ID: &str = "generate.missing.request.id";
pub const GENERATE_MISSING_CORRELATION_ID: &str = "generate.missing.correlation.id";
/// 逗号分隔的头名称，每个名称本身也是一个配置键，值即为头的值
pub const STATIC_REQUEST_HEADER_NAMES: &str = "static.request.header.names";

pub const DEFAULT_POLL_BATCH_SIZE: usize = 100;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

fn queue_name(settings: &Settings) -> String {
    settings
        .get_string(QUEUE_NAME)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_QUEUE_NAME)
        .to_string()
}

/// 源端配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub success_topic: String,
    pub error_topic: String,
    pub queue_name: String,
    pub poll_batch_size: usize,
}

impl SourceSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let poll_batch_size = settings.get_or(POLL_BATCH_SIZE, DEFAULT_POLL_BATCH_SIZE)?;
        if poll_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: POLL_BATCH_SIZE.to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            success_topic: settings.require(SUCCESS_TOPIC)?.to_string(),
            error_topic: settings.require(ERROR_TOPIC)?.to_string(),
            queue_name: queue_name(settings),
            poll_batch_size,
        })
    }
}

/// 汇端配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkSettings {
    pub queue_name: String,
    pub publish_to_queue: bool,
    pub generate_missing_request_id: bool,
    pub generate_missing_correlation_id: bool,
    pub static_headers: Vec<(String, String)>,
}

impl SinkSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let static_headers = settings
            .get_list(STATIC_REQUEST_HEADER_NAMES)
            .into_iter()
            .map(|name| {
                let value = settings.require(&name)?.to_string();
                Ok((name, value))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            queue_name: queue_name(settings),
            publish_to_queue: settings.get_bool(PUBLISH_TO_IN_MEMORY_QUEUE, false)?,
            generate_missing_request_id: settings.get_bool(GENERATE_MISSING_REQUEST_ID, false)?,
            generate_missing_correlation_id: settings
                .get_bool(GENERATE_MISSING_CORRELATION_ID, false)?,
            static_headers,
        })
    }
}
