use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Request, Response};
use crate::error::ExchangeError;

/// 一次完整逻辑调用的记录
///
/// 包含最终请求与响应、最后一次尝试的耗时、开始时间（UTC）、
/// 重试序列累计的尝试次数以及成功标志。只能通过 [`ExchangeBuilder`] 构造。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ExchangeRecord")]
pub struct Exchange {
    request: Request,
    response: Response,
    duration_in_millis: u64,
    moment: DateTime<Utc>,
    attempts: u32,
    success: bool,
}

impl Exchange {
    pub fn builder() -> ExchangeBuilder {
        ExchangeBuilder::new()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_in_millis)
    }

    pub fn duration_in_millis(&self) -> u64 {
        self.duration_in_millis
    }

    pub fn moment(&self) -> DateTime<Utc> {
        self.moment
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// 反序列化的中间形态，经 [`ExchangeBuilder`] 校验后才成为 `Exchange`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRecord {
    request: Request,
    response: Response,
    duration_in_millis: u64,
    moment: DateTime<Utc>,
    attempts: u32,
    success: bool,
}

impl TryFrom<ExchangeRecord> for Exchange {
    type Error = ExchangeError;

    fn try_from(record: ExchangeRecord) -> Result<Self, Self::Error> {
        Exchange::builder()
            .request(record.request)
            .response(record.response)
            .duration(Duration::from_millis(record.duration_in_millis))
            .moment(record.moment)
            .attempts(record.attempts)
            .success(record.success)
            .build()
    }
}

/// `Exchange` 构造器
///
/// 请求和响应为必填项；状态码为负时构造失败。
#[derive(Debug, Clone, Default)]
pub struct ExchangeBuilder {
    request: Option<Request>,
    response: Option<Response>,
    duration: Duration,
    moment: Option<DateTime<Utc>>,
    attempts: u32,
    success: bool,
}

impl ExchangeBuilder {
    pub fn new() -> Self {
        Self {
            attempts: 1,
            ..Default::default()
        }
    }

    pub fn request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    pub fn response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn moment(mut self, moment: DateTime<Utc>) -> Self {
        self.moment = Some(moment);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn build(self) -> Result<Exchange, ExchangeError> {
        let request = self.request.ok_or(ExchangeError::MissingRequest)?;
        let response = self.response.ok_or(ExchangeError::MissingResponse)?;
        if response.status_code() < 0 {
            return Err(ExchangeError::NegativeStatusCode(response.status_code()));
        }

        Ok(Exchange {
            request,
            response,
            duration_in_millis: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            moment: self.moment.unwrap_or_else(Utc::now),
            attempts: self.attempts,
            success: self.success,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;

    fn dummy_request() -> Request {
        Request::new("http://localhost:8089", Method::Get)
            .with_header("Content-Type", "application/json")
            .with_body_as_string(r#"{"param":"name"}"#)
    }

    fn dummy_response(status_code: i32) -> Response {
        Response::new(status_code, "OK").with_body("my response")
    }

    #[test]
    fn test_build_fails_without_request_and_response() {
        let result = Exchange::builder().attempts(2).success(true).build();
        assert_eq!(result.unwrap_err(), ExchangeError::MissingRequest);
    }

    #[test]
    fn test_build_fails_without_request() {
        let result = Exchange::builder().response(dummy_response(200)).build();
        assert_eq!(result.unwrap_err(), ExchangeError::MissingRequest);
    }

    #[test]
    fn test_build_fails_without_response() {
        let result = Exchange::builder().request(dummy_request()).build();
        assert_eq!(result.unwrap_err(), ExchangeError::MissingResponse);
    }

    #[test]
    fn test_build_fails_with_negative_status_code() {
        let result = Exchange::builder()
            .request(dummy_request())
            .response(dummy_response(-12))
            .build();
        assert_eq!(result.unwrap_err(), ExchangeError::NegativeStatusCode(-12));
    }

    #[test]
    fn test_build_nominal_case() {
        let moment = Utc::now();
        let exchange = Exchange::builder()
            .request(dummy_request())
            .response(dummy_response(200))
            .duration(Duration::from_millis(469))
            .moment(moment)
            .attempts(2)
            .success(true)
            .build()
            .unwrap();

        assert_eq!(exchange.attempts(), 2);
        assert_eq!(exchange.duration_in_millis(), 469);
        assert_eq!(exchange.moment(), moment);
        assert!(exchange.is_success());
        assert_eq!(exchange.request().url(), "http://localhost:8089");
    }

    #[test]
    fn test_equality_is_structural() {
        let moment = Utc::now();
        let build = |success| {
            Exchange::builder()
                .request(dummy_request())
                .response(dummy_response(200))
                .moment(moment)
                .success(success)
                .build()
                .unwrap()
        };
        assert_eq!(build(true), build(true));
        assert_ne!(build(true), build(false));
    }

    #[test]
    fn test_serialized_shape() {
        let exchange = Exchange::builder()
            .request(dummy_request())
            .response(dummy_response(500))
            .attempts(3)
            .build()
            .unwrap();
        let json = serde_json::to_value(&exchange).unwrap();

        assert_eq!(json["request"]["method"], "GET");
        assert_eq!(json["response"]["statusCode"], 500);
        assert_eq!(json["attempts"], 3);
        assert_eq!(json["success"], false);
        assert!(json["moment"].is_string());

        let back: Exchange = serde_json::from_value(json).unwrap();
        assert_eq!(back, exchange);
    }

    #[test]
    fn test_deserialize_rejects_negative_status_code() {
        let exchange = Exchange::builder()
            .request(dummy_request())
            .response(dummy_response(200))
            .build()
            .unwrap();
        let mut json = serde_json::to_value(&exchange).unwrap();
        json["response"]["statusCode"] = serde_json::json!(-12);

        let error = serde_json::from_value::<Exchange>(json).unwrap_err();
        assert!(error.to_string().contains("-12"), "{}", error);
    }
}
