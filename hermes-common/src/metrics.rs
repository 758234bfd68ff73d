use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

/// 调用指标钩子
///
/// 按配置 id 打标签；具体的指标系统由宿主接入。
pub trait MetricsRecorder: Send + Sync {
    /// 请求已路由到某个配置，尚未发出
    fn record_call(&self, configuration_id: &str);

    /// 一次逻辑调用（含重试）结束
    fn record_exchange(&self, configuration_id: &str, success: bool, duration: Duration);
}

/// 丢弃所有指标
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record_call(&self, _configuration_id: &str) {}

    fn record_exchange(&self, _configuration_id: &str, _success: bool, _duration: Duration) {}
}

/// 单个配置的累计统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigurationStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl ConfigurationStats {
    pub fn completed(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn average_duration(&self) -> Option<Duration> {
        let completed = u32::try_from(self.completed()).ok().filter(|c| *c > 0)?;
        Some(self.total_duration / completed)
    }
}

/// 进程内计数器，测试和 demo 使用
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    stats: Mutex<HashMap<String, ConfigurationStats>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<String, ConfigurationStats> {
        self.stats.lock().clone()
    }

    pub fn stats(&self, configuration_id: &str) -> ConfigurationStats {
        self.stats
            .lock()
            .get(configuration_id)
            .copied()
            .unwrap_or_default()
    }
}

impl MetricsRecorder for InMemoryMetrics {
    fn record_call(&self, configuration_id: &str) {
        let mut stats = self.stats.lock();
        stats.entry(configuration_id.to_string()).or_default().calls += 1;
    }

    fn record_exchange(&self, configuration_id: &str, success: bool, duration: Duration) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(configuration_id.to_string()).or_default();
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.total_duration += duration;
        entry.max_duration = entry.max_duration.max(duration);
    }
}
