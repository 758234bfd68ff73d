use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::model::Exchange;

pub const DEFAULT_QUEUE_NAME: &str = "default";
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// 队列中的一条记录：来源记录的头、key、value 占位，以及完成的 `Exchange`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub headers: Vec<(String, String)>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub exchange: Exchange,
}

impl QueueRecord {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            headers: Vec::new(),
            key: None,
            value: None,
            exchange,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// 队列已满，被拒绝的记录原样交还给调用方
#[derive(Error, Debug)]
#[error("queue '{queue}' is full (capacity {capacity})")]
pub struct QueueFull {
    pub queue: String,
    pub capacity: usize,
    pub record: Box<QueueRecord>,
}

impl QueueFull {
    pub fn into_record(self) -> QueueRecord {
        *self.record
    }
}

/// 有界 FIFO 队列
///
/// 写满后拒绝新记录（保留已有记录），`enqueue` 和 `poll` 都不阻塞。
/// 多个生产者并发写入时不保证彼此之间的顺序。
pub struct ExchangeQueue {
    name: String,
    capacity: usize,
    records: Mutex<VecDeque<QueueRecord>>,
}

impl ExchangeQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn enqueue(&self, record: QueueRecord) -> Result<(), QueueFull> {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            drop(records);
            log::warn!(
                "Queue '{}' is full ({} records), rejecting exchange for {}",
                self.name,
                self.capacity,
                record.exchange.request().url()
            );
            return Err(QueueFull {
                queue: self.name.clone(),
                capacity: self.capacity,
                record: Box::new(record),
            });
        }
        records.push_back(record);
        Ok(())
    }

    /// 取出最多 `max_items` 条当前可用的记录，可能为空
    pub fn poll(&self, max_items: usize) -> Vec<QueueRecord> {
        let mut records = self.records.lock();
        let count = max_items.min(records.len());
        records.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl fmt::Debug for ExchangeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// 按名字共享的队列集合
///
/// 进程启动时创建一次，通过 `Arc` 同时交给生产端和消费端。
/// 队列在第一次按名字引用时创建。
#[derive(Debug)]
pub struct QueueRegistry {
    capacity: usize,
    queues: Mutex<HashMap<String, Arc<ExchangeQueue>>>,
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// 之后创建的每个队列都使用这个容量
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn queue(&self, name: &str) -> Arc<ExchangeQueue> {
        let mut queues = self.queues.lock();
        queues
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("Creating queue '{}' with capacity {}", name, self.capacity);
                Arc::new(ExchangeQueue::new(name, self.capacity))
            })
            .clone()
    }

    pub fn default_queue(&self) -> Arc<ExchangeQueue> {
        self.queue(DEFAULT_QUEUE_NAME)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues.lock().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.queues.lock().keys().cloned().collect()
    }

    /// 丢弃所有队列，未被取走的记录随之丢失
    pub fn shutdown(&self) {
        let mut queues = self.queues.lock();
        let pending: usize = queues.values().map(|q| q.len()).sum();
        if pending > 0 {
            log::warn!("Shutting down queues with {} unpolled record(s)", pending);
        }
        queues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Request, Response};

    fn record(status: i32) -> QueueRecord {
        let exchange = Exchange::builder()
            .request(Request::get("http://www.example.com"))
            .response(Response::new(status, "").with_body("body"))
            .success(status < 400)
            .build()
            .unwrap();
        QueueRecord::new(exchange)
    }

    #[test]
    fn test_enqueue_then_poll_once() {
        let registry = QueueRegistry::new();
        let queue = registry.queue("dummy");

        queue.enqueue(record(200)).unwrap();
        let polled = queue.poll(10);
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].exchange.response().status_code(), 200);
        assert!(queue.poll(10).is_empty());
    }

    #[test]
    fn test_poll_respects_max_items_and_fifo() {
        let queue = ExchangeQueue::new("fifo", 10);
        for status in [200, 201, 202] {
            queue.enqueue(record(status)).unwrap();
        }

        let first = queue.poll(2);
        assert_eq!(
            first
                .iter()
                .map(|r| r.exchange.response().status_code())
                .collect::<Vec<_>>(),
            vec![200, 201]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.poll(0).len(), 0);
        assert_eq!(queue.poll(5)[0].exchange.response().status_code(), 202);
    }

    #[test]
    fn test_full_queue_rejects_newest() {
        let queue = ExchangeQueue::new("small", 2);
        queue.enqueue(record(200)).unwrap();
        queue.enqueue(record(201)).unwrap();

        let rejected = queue.enqueue(record(500)).unwrap_err();
        assert_eq!(rejected.capacity, 2);
        assert_eq!(rejected.into_record().exchange.response().status_code(), 500);

        let kept = queue.poll(10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].exchange.response().status_code(), 201);
        assert!(queue.enqueue(record(202)).is_ok());
    }

    #[test]
    fn test_queues_are_shared_by_name() {
        let registry = QueueRegistry::with_capacity(5);
        registry.queue("a").enqueue(record(200)).unwrap();

        assert_eq!(registry.queue("a").len(), 1);
        assert!(registry.queue("b").is_empty());
        assert_eq!(registry.queue("a").capacity(), 5);
        assert!(Arc::ptr_eq(&registry.default_queue(), &registry.queue(DEFAULT_QUEUE_NAME)));
    }

    #[test]
    fn test_shutdown_drops_queues() {
        let registry = QueueRegistry::new();
        registry.default_queue().enqueue(record(200)).unwrap();
        assert!(registry.contains(DEFAULT_QUEUE_NAME));

        registry.shutdown();
        assert!(!registry.contains(DEFAULT_QUEUE_NAME));
        assert!(registry.default_queue().is_empty());
    }

    #[test]
    fn test_concurrent_producers_lose_nothing_below_capacity() {
        let registry = Arc::new(QueueRegistry::with_capacity(1_000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.default_queue().enqueue(record(200)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.default_queue().poll(1_000).len(), 400);
    }
}
