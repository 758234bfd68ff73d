pub mod predicate;

use std::fmt;
use std::sync::Arc;

use crate::client::{self, HttpClient};
use crate::error::{ConfigError, ExchangeError};
use crate::model::{Exchange, Request};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::settings::Settings;

pub use predicate::{RequestMatcher, RequestPredicate};

pub const DEFAULT_CONFIGURATION_ID: &str = "default";
/// 逗号分隔的配置 id 列表
pub const CONFIGURATION_IDS: &str = "config.ids";

/// `config.<id>.`
pub fn configuration_prefix(id: &str) -> String {
    format!("config.{}.", id)
}

/// 命名配置：请求谓词 + 客户端 + 重试策略
///
/// 截断限制和成功判定随客户端一起绑定，因此都按配置解析，而不是全局生效。
pub struct Configuration {
    id: String,
    matcher: Arc<dyn RequestMatcher>,
    client: Arc<dyn HttpClient>,
    retry_policy: RetryPolicy,
}

impl Configuration {
    /// 匹配所有请求、使用默认重试策略的配置
    pub fn new(id: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            id: id.into(),
            matcher: Arc::new(RequestPredicate::any()),
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_matcher(mut self, matcher: impl RequestMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// 从已去掉 `config.<id>.` 前缀的配置构建
    pub fn from_settings(id: &str, settings: &Settings) -> Result<Self, ConfigError> {
        let client = client::build_client(id, settings)?;
        let predicate = RequestPredicate::from_settings(settings)?;
        let retry_policy = RetryPolicy::from_settings(settings)?;
        Ok(Configuration::new(id, client)
            .with_matcher(predicate)
            .with_retry_policy(retry_policy))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.matcher.matches(request)
    }

    /// 按本配置的重试策略执行请求
    pub async fn call(&self, request: &Request) -> Result<Exchange, ExchangeError> {
        RetryExecutor::execute(self.client.as_ref(), &self.retry_policy, request).await
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("id", &self.id)
            .field("client", &self.client.name())
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

/// 配置注册表
///
/// 按注册顺序逐个检查谓词，第一个匹配的胜出；都不匹配时使用默认配置。
/// 构建后只读，并发读取无需加锁。
#[derive(Debug, Clone)]
pub struct ConfigurationRegistry {
    configurations: Vec<Arc<Configuration>>,
    default: Arc<Configuration>,
}

impl ConfigurationRegistry {
    pub fn builder() -> ConfigurationRegistryBuilder {
        ConfigurationRegistryBuilder::default()
    }

    /// 读取 `config.ids` 和每个 `config.<id>.*`；默认配置总是会被构建
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let mut builder = ConfigurationRegistry::builder();
        let mut ids = settings.get_list(CONFIGURATION_IDS);
        if !ids.iter().any(|id| id == DEFAULT_CONFIGURATION_ID) {
            ids.push(DEFAULT_CONFIGURATION_ID.to_string());
        }

        for id in ids {
            let scoped = settings.with_prefix(&configuration_prefix(&id));
            builder = builder.register(Configuration::from_settings(&id, &scoped)?);
        }
        builder.build()
    }

    pub fn select(&self, request: &Request) -> &Arc<Configuration> {
        self.configurations
            .iter()
            .find(|configuration| configuration.matches(request))
            .unwrap_or(&self.default)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Configuration>> {
        if id == self.default.id() {
            return Some(&self.default);
        }
        self.configurations.iter().find(|c| c.id() == id)
    }

    pub fn default_configuration(&self) -> &Arc<Configuration> {
        &self.default
    }

    /// 非默认配置的 id，按注册顺序
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.configurations.iter().map(|c| c.id())
    }

    /// 包含默认配置在内的数量
    pub fn len(&self) -> usize {
        self.configurations.len() + 1
    }
}

#[derive(Default)]
pub struct ConfigurationRegistryBuilder {
    configurations: Vec<Configuration>,
    default: Option<Configuration>,
}

impl ConfigurationRegistryBuilder {
    /// id 为 `default` 的配置自动成为默认配置
    pub fn register(mut self, configuration: Configuration) -> Self {
        if configuration.id() == DEFAULT_CONFIGURATION_ID {
            self.default = Some(configuration);
        } else {
            self.configurations.push(configuration);
        }
        self
    }

    pub fn default_configuration(mut self, configuration: Configuration) -> Self {
        self.default = Some(configuration);
        self
    }

    pub fn build(self) -> Result<ConfigurationRegistry, ConfigError> {
        let default = self.default.ok_or(ConfigError::MissingDefaultConfiguration)?;

        let mut seen = vec![default.id().to_string()];
        for configuration in &self.configurations {
            if seen.iter().any(|id| id == configuration.id()) {
                return Err(ConfigError::DuplicateConfiguration {
                    id: configuration.id().to_string(),
                });
            }
            seen.push(configuration.id().to_string());
        }

        Ok(ConfigurationRegistry {
            configurations: self.configurations.into_iter().map(Arc::new).collect(),
            default: Arc::new(default),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientSettings, ReqwestHttpClient};
    use crate::model::Method;

    fn client() -> Arc<dyn HttpClient> {
        Arc::new(ReqwestHttpClient::new("test", ClientSettings::default()).unwrap())
    }

    #[test]
    fn test_build_without_default_fails() {
        let result = ConfigurationRegistry::builder()
            .register(Configuration::new("api", client()))
            .build();
        assert!(matches!(result, Err(ConfigError::MissingDefaultConfiguration)));
    }

    #[test]
    fn test_duplicate_id_fails() {
        let result = ConfigurationRegistry::builder()
            .register(Configuration::new(DEFAULT_CONFIGURATION_ID, client()))
            .register(Configuration::new("api", client()))
            .register(Configuration::new("api", client()))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateConfiguration { .. })
        ));
    }

    #[test]
    fn test_first_match_wins_then_default() {
        let registry = ConfigurationRegistry::builder()
            .register(
                Configuration::new("posts", client())
                    .with_matcher(RequestPredicate::any().method(Method::Post)),
            )
            .register(
                Configuration::new("api", client())
                    .with_matcher(RequestPredicate::any().url_regex("/api/").unwrap()),
            )
            .register(Configuration::new(DEFAULT_CONFIGURATION_ID, client()))
            .build()
            .unwrap();

        let post_to_api = Request::new("http://host/api/users", Method::Post);
        let get_to_api = Request::new("http://host/api/users", Method::Get);
        let other = Request::get("http://host/health");

        assert_eq!(registry.select(&post_to_api).id(), "posts");
        assert_eq!(registry.select(&get_to_api).id(), "api");
        assert_eq!(registry.select(&other).id(), DEFAULT_CONFIGURATION_ID);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["posts", "api"]);
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::new()
            .with(CONFIGURATION_IDS, "slow")
            .with("config.slow.url.regex", "^http://slow")
            .with("config.slow.retry.policy.retries", "4")
            .with("config.slow.httpclient.implementation", "ureq")
            .with("config.default.retry.policy.retries", "0");
        let registry = ConfigurationRegistry::from_settings(&settings).unwrap();

        let slow = registry.get("slow").unwrap();
        assert_eq!(slow.retry_policy().max_retries, 4);
        assert_eq!(slow.client().name(), "ureq");
        assert_eq!(registry.default_configuration().retry_policy().max_retries, 0);
        assert_eq!(registry.select(&Request::get("http://slow/x")).id(), "slow");
        assert_eq!(
            registry.select(&Request::get("http://fast/x")).id(),
            DEFAULT_CONFIGURATION_ID
        );
    }

    #[test]
    fn test_from_empty_settings_has_default_only() {
        let registry = ConfigurationRegistry::from_settings(&Settings::new()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.default_configuration().id(), DEFAULT_CONFIGURATION_ID);
    }

    #[test]
    fn test_from_settings_propagates_errors() {
        let settings = Settings::new().with("config.default.retry.policy.response.code.regex", "[");
        assert!(matches!(
            ConfigurationRegistry::from_settings(&settings),
            Err(ConfigError::InvalidRegex { .. })
        ));
    }
}
