pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod retry;
pub mod settings;
pub mod task;

pub use client::{HttpClient, ReqwestHttpClient, UreqHttpClient, build_client};
pub use config::{Configuration, ConfigurationRegistry, RequestMatcher, RequestPredicate};
pub use error::{ConfigError, ExchangeError, UnknownVariant};
pub use metrics::{InMemoryMetrics, MetricsRecorder, NoopMetrics};
pub use model::{BodyType, Exchange, Headers, Method, Request, Response};
pub use queue::{ExchangeQueue, QueueFull, QueueRecord, QueueRegistry};
pub use retry::{AttemptCounter, RetryExecutor, RetryPolicy};
pub use settings::Settings;
pub use task::HttpTask;
