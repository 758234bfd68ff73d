use std::sync::Arc;

use futures::future::try_join_all;
use hermes_common::queue::{ExchangeQueue, QueueRecord};
use hermes_common::{
    ConfigError, ConfigurationRegistry, Exchange, HttpTask, MetricsRecorder, QueueRegistry,
    Request, Settings,
};

use crate::error::SinkError;
use crate::record::SinkRecord;
use crate::settings::{CORRELATION_ID_HEADER, REQUEST_ID_HEADER, SinkSettings};

/// 汇端连接器
///
/// 启动时就把配置注册表完整构建一遍，让配置错误尽早暴露。
#[derive(Debug, Default)]
pub struct HttpSinkConnector {
    settings: Option<Settings>,
}

impl HttpSinkConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, settings: Settings) -> Result<(), ConfigError> {
        let sink = SinkSettings::from_settings(&settings)?;
        let registry = ConfigurationRegistry::from_settings(&settings)?;
        log::info!(
            "Starting http sink connector with {} configuration(s), publishing to queue: {}",
            registry.len(),
            sink.publish_to_queue
        );
        self.settings = Some(settings);
        Ok(())
    }

    pub fn task_configs(&self, max_tasks: usize) -> Vec<Settings> {
        match &self.settings {
            Some(settings) => vec![settings.clone(); max_tasks],
            None => Vec::new(),
        }
    }

    pub fn stop(&mut self) {
        if self.settings.take().is_some() {
            log::info!("Http sink connector stopped");
        }
    }
}

struct SinkState {
    settings: SinkSettings,
    task: HttpTask,
    queue: Option<Arc<ExchangeQueue>>,
}

/// 汇端任务：记录 → 请求 → 带重试的调用 → （可选）入队
pub struct HttpSinkTask {
    queues: Arc<QueueRegistry>,
    metrics: Arc<dyn MetricsRecorder>,
    state: Option<SinkState>,
}

impl HttpSinkTask {
    pub fn new(queues: Arc<QueueRegistry>, metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            queues,
            metrics,
            state: None,
        }
    }

    pub fn start(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        let sink = SinkSettings::from_settings(settings)?;
        let task = HttpTask::from_settings(settings, self.metrics.clone())?;
        let queue = sink
            .publish_to_queue
            .then(|| self.queues.queue(&sink.queue_name));
        log::info!(
            "Http sink task started{}",
            queue
                .as_ref()
                .map(|q| format!(", publishing exchanges to queue '{}'", q.name()))
                .unwrap_or_default()
        );
        self.state = Some(SinkState {
            settings: sink,
            task,
            queue,
        });
        Ok(())
    }

    /// 并发执行一批记录中的请求，结果顺序与输入一致
    ///
    /// 任一记录无法解析为请求时整批失败，且不会发出任何调用。
    /// 队列已满时交换被丢弃（已记录 warn），不影响返回值。
    pub async fn put(&self, records: Vec<SinkRecord>) -> Result<Vec<Exchange>, SinkError> {
        let state = self.state.as_ref().ok_or(SinkError::NotStarted)?;

        let requests = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let request = parse_request(index, record)?;
                Ok(enrich(&state.settings, request))
            })
            .collect::<Result<Vec<_>, SinkError>>()?;

        let calls = records
            .into_iter()
            .zip(requests)
            .map(|(record, request)| async move {
                let exchange = state.task.submit(request).await?;
                if let Some(queue) = &state.queue {
                    let queued = QueueRecord {
                        headers: record.headers,
                        key: record.key,
                        value: None,
                        exchange: exchange.clone(),
                    };
                    // QueueFull 已在队列内部记录
                    let _ = queue.enqueue(queued);
                }
                Ok::<_, SinkError>(exchange)
            });
        try_join_all(calls).await
    }

    pub fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!("Http sink task stopped");
        }
    }
}

fn parse_request(index: usize, record: &SinkRecord) -> Result<Request, SinkError> {
    serde_json::from_str(&record.value).map_err(|source| {
        log::error!(
            "Record {} from topic '{}' is not a valid http request: {}",
            index,
            record.topic,
            source
        );
        SinkError::InvalidRequest {
            topic: record.topic.clone(),
            index,
            source,
        }
    })
}

/// 加上静态头，并按需补齐请求 id 和关联 id
fn enrich(settings: &SinkSettings, mut request: Request) -> Request {
    for (name, value) in &settings.static_headers {
        request
            .headers_mut()
            .insert(name.clone(), vec![value.clone()]);
    }
    if settings.generate_missing_request_id && !request.has_header(REQUEST_ID_HEADER) {
        request.add_header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());
    }
    if settings.generate_missing_correlation_id && !request.has_header(CORRELATION_ID_HEADER) {
        request.add_header(CORRELATION_ID_HEADER, uuid::Uuid::new_v4().to_string());
    }
    request
}
