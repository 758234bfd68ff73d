use std::sync::Arc;

use hermes_common::queue::{ExchangeQueue, QueueRecord};
use hermes_common::{ConfigError, QueueRegistry, Settings};

use crate::error::SourceError;
use crate::record::SourceRecord;
use crate::settings::SourceSettings;

/// 源端连接器：校验配置并为每个任务复制一份
#[derive(Debug, Default)]
pub struct HttpSourceConnector {
    settings: Option<Settings>,
}

impl HttpSourceConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 缺少 `success.topic` 或 `error.topic` 时失败
    pub fn start(&mut self, settings: Settings) -> Result<(), ConfigError> {
        let source = SourceSettings::from_settings(&settings)?;
        log::info!(
            "Starting http source connector on queue '{}' (success: '{}', error: '{}')",
            source.queue_name,
            source.success_topic,
            source.error_topic
        );
        self.settings = Some(settings);
        Ok(())
    }

    /// 启动前调用返回空列表
    pub fn task_configs(&self, max_tasks: usize) -> Vec<Settings> {
        match &self.settings {
            Some(settings) => vec![settings.clone(); max_tasks],
            None => Vec::new(),
        }
    }

    pub fn stop(&mut self) {
        if self.settings.take().is_some() {
            log::info!("Http source connector stopped");
        }
    }
}

struct SourceState {
    settings: SourceSettings,
    queue: Arc<ExchangeQueue>,
}

/// 源端任务：从队列取出完成的交换，按成功与否发到不同的 topic
pub struct HttpSourceTask {
    queues: Arc<QueueRegistry>,
    state: Option<SourceState>,
}

impl HttpSourceTask {
    pub fn new(queues: Arc<QueueRegistry>) -> Self {
        Self {
            queues,
            state: None,
        }
    }

    pub fn start(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        let settings = SourceSettings::from_settings(settings)?;
        let queue = self.queues.queue(&settings.queue_name);
        log::info!("Http source task polling queue '{}'", queue.name());
        self.state = Some(SourceState { settings, queue });
        Ok(())
    }

    /// 不阻塞；队列为空时返回空列表
    pub fn poll(&self) -> Result<Vec<SourceRecord>, SourceError> {
        let state = self.state.as_ref().ok_or(SourceError::NotStarted)?;
        let records = state
            .queue
            .poll(state.settings.poll_batch_size)
            .into_iter()
            .filter_map(|record| to_source_record(&state.settings, record))
            .collect::<Vec<_>>();
        if !records.is_empty() {
            log::debug!(
                "Polled {} record(s) from queue '{}'",
                records.len(),
                state.queue.name()
            );
        }
        Ok(records)
    }

    pub fn stop(&mut self) {
        if let Some(state) = self.state.take() {
            log::info!(
                "Http source task stopped, {} record(s) left in queue '{}'",
                state.queue.len(),
                state.queue.name()
            );
        }
    }
}

fn to_source_record(settings: &SourceSettings, record: QueueRecord) -> Option<SourceRecord> {
    let topic = if record.exchange.is_success() {
        &settings.success_topic
    } else {
        &settings.error_topic
    };
    match serde_json::to_string(&record.exchange) {
        Ok(value) => Some(SourceRecord {
            topic: topic.clone(),
            key: record.key,
            value,
            headers: record.headers,
        }),
        Err(e) => {
            log::error!(
                "Cannot serialize exchange for {}: {}",
                record.exchange.request().url(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ERROR_TOPIC, POLL_BATCH_SIZE, SUCCESS_TOPIC};
    use hermes_common::{Exchange, Request, Response};

    fn settings() -> Settings {
        Settings::new()
            .with(SUCCESS_TOPIC, "http-success")
            .with(ERROR_TOPIC, "http-error")
    }

    fn record(success: bool) -> QueueRecord {
        let status = if success { 200 } else { 500 };
        let exchange = Exchange::builder()
            .request(Request::get("http://www.example.com"))
            .response(Response::new(status, "").with_body("body"))
            .success(success)
            .build()
            .unwrap();
        QueueRecord::new(exchange).with_key("k")
    }

    #[test]
    fn test_poll_before_start_fails() {
        let task = HttpSourceTask::new(Arc::new(QueueRegistry::new()));
        assert!(matches!(task.poll(), Err(SourceError::NotStarted)));
    }

    #[test]
    fn test_poll_splits_success_and_error() {
        let queues = Arc::new(QueueRegistry::new());
        let mut task = HttpSourceTask::new(queues.clone());
        task.start(&settings()).unwrap();

        let queue = queues.default_queue();
        queue.enqueue(record(true)).unwrap();
        queue.enqueue(record(false)).unwrap();

        let polled = task.poll().unwrap();
        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0].topic, "http-success");
        assert_eq!(polled[1].topic, "http-error");
        assert_eq!(polled[0].key.as_deref(), Some("k"));

        let value: serde_json::Value = serde_json::from_str(&polled[1].value).unwrap();
        assert_eq!(value["response"]["statusCode"], 500);
        assert_eq!(value["success"], false);

        assert!(task.poll().unwrap().is_empty());
    }

    #[test]
    fn test_poll_batch_size() {
        let queues = Arc::new(QueueRegistry::new());
        let mut task = HttpSourceTask::new(queues.clone());
        task.start(&settings().with(POLL_BATCH_SIZE, "2")).unwrap();

        for _ in 0..5 {
            queues.default_queue().enqueue(record(true)).unwrap();
        }
        assert_eq!(task.poll().unwrap().len(), 2);
        assert_eq!(task.poll().unwrap().len(), 2);
        assert_eq!(task.poll().unwrap().len(), 1);
    }
}
