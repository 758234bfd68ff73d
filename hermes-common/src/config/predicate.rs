use regex::Regex;

use crate::error::ConfigError;
use crate::model::{BodyType, Method, Request};
use crate::settings::Settings;

pub const URL_REGEX: &str = "url.regex";
pub const METHOD: &str = "method";
pub const BODY_TYPE: &str = "bodytype";
pub const HEADER_KEY: &str = "header.key";
pub const HEADER_VALUE: &str = "header.value";

/// 请求匹配能力
pub trait RequestMatcher: Send + Sync {
    fn matches(&self, request: &Request) -> bool;
}

impl<F> RequestMatcher for F
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn matches(&self, request: &Request) -> bool {
        self(request)
    }
}

/// 由配置项组合出的请求谓词，所有已设置的条件都满足才算匹配
///
/// 没有任何条件时匹配所有请求。
#[derive(Debug, Clone, Default)]
pub struct RequestPredicate {
    url: Option<Regex>,
    method: Option<Method>,
    body_type: Option<BodyType>,
    header_key: Option<String>,
    header_value: Option<Regex>,
}

impl RequestPredicate {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn url_regex(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.url = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn body_type(mut self, body_type: BodyType) -> Self {
        self.body_type = Some(body_type);
        self
    }

    /// 要求存在某个请求头；给出 `value` 时至少一个值要匹配该正则
    pub fn header(mut self, key: &str, value: Option<&str>) -> Result<Self, regex::Error> {
        self.header_key = Some(key.to_string());
        self.header_value = value.map(Regex::new).transpose()?;
        Ok(self)
    }

    pub fn is_catch_all(&self) -> bool {
        self.url.is_none()
            && self.method.is_none()
            && self.body_type.is_none()
            && self.header_key.is_none()
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let mut predicate = RequestPredicate::any();

        if let Some(pattern) = settings.get_string(URL_REGEX) {
            predicate = predicate
                .url_regex(pattern)
                .map_err(|source| invalid_regex(URL_REGEX, source))?;
        }
        if let Some(method) = settings.get_parsed::<Method>(METHOD)? {
            predicate = predicate.method(method);
        }
        if let Some(body_type) = settings.get_parsed::<BodyType>(BODY_TYPE)? {
            predicate = predicate.body_type(body_type);
        }
        match (settings.get_string(HEADER_KEY), settings.get_string(HEADER_VALUE)) {
            (Some(key), value) => {
                predicate = predicate
                    .header(key, value)
                    .map_err(|source| invalid_regex(HEADER_VALUE, source))?;
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingSetting {
                    key: HEADER_KEY.to_string(),
                });
            }
            (None, None) => {}
        }
        Ok(predicate)
    }
}

fn invalid_regex(key: &str, source: regex::Error) -> ConfigError {
    ConfigError::InvalidRegex {
        key: key.to_string(),
        source,
    }
}

impl RequestMatcher for RequestPredicate {
    fn matches(&self, request: &Request) -> bool {
        if let Some(url) = &self.url {
            if !url.is_match(request.url()) {
                return false;
            }
        }
        if self.method.is_some_and(|m| m != request.method()) {
            return false;
        }
        if self.body_type.is_some_and(|b| b != request.body_type()) {
            return false;
        }
        if let Some(key) = &self.header_key {
            let Some(values) = request.header_values(key) else {
                return false;
            };
            if let Some(pattern) = &self.header_value {
                return values.iter().any(|v| pattern.is_match(v));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_predicate_matches_everything() {
        let predicate = RequestPredicate::any();
        assert!(predicate.is_catch_all());
        assert!(predicate.matches(&Request::get("http://anything")));
    }

    #[test]
    fn test_predicate_from_settings() {
        let settings = Settings::new()
            .with(URL_REGEX, "^http://api\\.example\\.com/.*")
            .with(METHOD, "post")
            .with(HEADER_KEY, "X-Tenant")
            .with(HEADER_VALUE, "^acme$");
        let predicate = RequestPredicate::from_settings(&settings).unwrap();

        let matching = Request::new("http://api.example.com/users", Method::Post)
            .with_header("x-tenant", "acme");
        assert!(predicate.matches(&matching));

        let wrong_method = Request::new("http://api.example.com/users", Method::Get)
            .with_header("X-Tenant", "acme");
        assert!(!predicate.matches(&wrong_method));

        let wrong_tenant = Request::new("http://api.example.com/users", Method::Post)
            .with_header("X-Tenant", "other");
        assert!(!predicate.matches(&wrong_tenant));

        let no_header = Request::new("http://api.example.com/users", Method::Post);
        assert!(!predicate.matches(&no_header));
    }

    #[test]
    fn test_body_type_predicate() {
        let predicate = RequestPredicate::any().body_type(BodyType::Form);
        let form = Request::new("http://a", Method::Post).with_body_as_form(Default::default());
        assert!(predicate.matches(&form));
        assert!(!predicate.matches(&Request::get("http://a")));
    }

    #[test]
    fn test_invalid_settings() {
        let bad_regex = Settings::new().with(URL_REGEX, "(");
        assert!(matches!(
            RequestPredicate::from_settings(&bad_regex),
            Err(ConfigError::InvalidRegex { .. })
        ));

        let bad_method = Settings::new().with(METHOD, "FETCH");
        assert!(matches!(
            RequestPredicate::from_settings(&bad_method),
            Err(ConfigError::InvalidValue { .. })
        ));

        let value_without_key = Settings::new().with(HEADER_VALUE, "x");
        assert!(matches!(
            RequestPredicate::from_settings(&value_without_key),
            Err(ConfigError::MissingSetting { .. })
        ));
    }

    #[test]
    fn test_closure_matcher() {
        let matcher = |request: &Request| request.url().ends_with("/ping");
        assert!(matcher.matches(&Request::get("http://localhost/ping")));
        assert!(!matcher.matches(&Request::get("http://localhost/pong")));
    }
}
