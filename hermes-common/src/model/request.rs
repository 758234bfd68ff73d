use std::collections::BTreeMap;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::Headers;
use crate::error::UnknownVariant;

static EMPTY_FORM: BTreeMap<String, String> = BTreeMap::new();

/// HTTP 方法枚举
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Connect,
    Delete,
    #[default]
    Get,
    Head,
    Patch,
    Post,
    Put,
    Options,
    Trace,
}

impl Method {
    /// 返回HTTP方法的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Connect => "CONNECT",
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
        }
    }
}

/// 大小写不敏感的解析
impl FromStr for Method {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CONNECT" => Ok(Method::Connect),
            "DELETE" => Ok(Method::Delete),
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "PATCH" => Ok(Method::Patch),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            _ => Err(UnknownVariant::new("http method", s)),
        }
    }
}

/// 请求体类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyType {
    #[default]
    String,
    Form,
    ByteArray,
    Multipart,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::String => "STRING",
            BodyType::Form => "FORM",
            BodyType::ByteArray => "BYTE_ARRAY",
            BodyType::Multipart => "MULTIPART",
        }
    }
}

impl FromStr for BodyType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STRING" => Ok(BodyType::String),
            "FORM" => Ok(BodyType::Form),
            "BYTE_ARRAY" => Ok(BodyType::ByteArray),
            "MULTIPART" => Ok(BodyType::Multipart),
            _ => Err(UnknownVariant::new("body type", s)),
        }
    }
}

/// 出站 HTTP 请求
///
/// `url` 和 `body_type` 在构造后不可变。设置请求体的方法消费 `self`
/// 并返回新值，同一时刻只有与 `body_type` 对应的那种表示有内容。
/// 字节数组和 multipart 的每一段都以 base64 形式保存，读取时解码。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RequestRecord")]
pub struct Request {
    url: String,
    #[serde(default)]
    headers: Headers,
    method: Method,
    #[serde(default)]
    body_as_string: String,
    #[serde(default)]
    body_as_form: BTreeMap<String, String>,
    #[serde(default)]
    body_as_byte_array: String,
    #[serde(default)]
    body_as_multipart: Vec<String>,
    body_type: BodyType,
}

/// 反序列化的中间形态；转换时只保留 `body_type` 对应的那种请求体
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestRecord {
    url: String,
    #[serde(default)]
    headers: Headers,
    method: Method,
    #[serde(default)]
    body_as_string: String,
    #[serde(default)]
    body_as_form: BTreeMap<String, String>,
    #[serde(default)]
    body_as_byte_array: String,
    #[serde(default)]
    body_as_multipart: Vec<String>,
    body_type: BodyType,
}

impl From<RequestRecord> for Request {
    fn from(record: RequestRecord) -> Self {
        let request = Request::new(record.url, record.method).with_headers(record.headers);
        match record.body_type {
            BodyType::String => request.with_body_as_string(record.body_as_string),
            BodyType::Form => request.with_body_as_form(record.body_as_form),
            BodyType::ByteArray => {
                let mut request = request.clear_body(BodyType::ByteArray);
                request.body_as_byte_array = record.body_as_byte_array;
                request
            }
            BodyType::Multipart => {
                let mut request = request.clear_body(BodyType::Multipart);
                request.body_as_multipart = record.body_as_multipart;
                request
            }
        }
    }
}

impl Request {
    /// 创建字符串请求体的请求
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
            method,
            body_as_string: String::new(),
            body_as_form: BTreeMap::new(),
            body_as_byte_array: String::new(),
            body_as_multipart: Vec::new(),
            body_type: BodyType::String,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, Method::Get)
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// 追加一个请求头的值
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn with_body_as_string(self, body: impl Into<String>) -> Self {
        let mut request = self.clear_body(BodyType::String);
        request.body_as_string = body.into();
        request
    }

    pub fn with_body_as_form(self, form: BTreeMap<String, String>) -> Self {
        let mut request = self.clear_body(BodyType::Form);
        request.body_as_form = form;
        request
    }

    pub fn with_body_as_byte_array(self, bytes: &[u8]) -> Self {
        let mut request = self.clear_body(BodyType::ByteArray);
        request.body_as_byte_array = STANDARD.encode(bytes);
        request
    }

    pub fn with_body_as_multipart<P: AsRef<[u8]>>(self, parts: &[P]) -> Self {
        let mut request = self.clear_body(BodyType::Multipart);
        request.body_as_multipart = parts.iter().map(|p| STANDARD.encode(p.as_ref())).collect();
        request
    }

    fn clear_body(mut self, body_type: BodyType) -> Self {
        self.body_as_string.clear();
        self.body_as_form.clear();
        self.body_as_byte_array.clear();
        self.body_as_multipart.clear();
        self.body_type = body_type;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.entry(name.into()).or_default().push(value.into());
    }

    /// 大小写不敏感地查找请求头
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header_values(name).is_some()
    }

    pub fn body_as_string(&self) -> &str {
        if self.body_type == BodyType::String {
            &self.body_as_string
        } else {
            ""
        }
    }

    pub fn body_as_form(&self) -> &BTreeMap<String, String> {
        if self.body_type == BodyType::Form {
            &self.body_as_form
        } else {
            &EMPTY_FORM
        }
    }

    pub fn body_as_byte_array(&self) -> Vec<u8> {
        if self.body_type != BodyType::ByteArray {
            return Vec::new();
        }
        decode_or_empty(&self.body_as_byte_array)
    }

    pub fn body_as_multipart(&self) -> Vec<Vec<u8>> {
        if self.body_type != BodyType::Multipart {
            return Vec::new();
        }
        self.body_as_multipart
            .iter()
            .map(|part| decode_or_empty(part))
            .collect()
    }
}

fn decode_or_empty(encoded: &str) -> Vec<u8> {
    match STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Ignoring body block that is not valid base64: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_as_str() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Post.as_str(), "POST");
        assert_eq!(Method::Options.as_str(), "OPTIONS");
        assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
        assert_eq!(
            "FETCH".parse::<Method>().unwrap_err().to_string(),
            "unknown http method 'FETCH'"
        );
        assert_eq!("byte_array".parse::<BodyType>(), Ok(BodyType::ByteArray));
    }

    #[test]
    fn test_inactive_body_accessors_return_empty() {
        let request = Request::new("http://localhost/ping", Method::Post).with_body_as_string("stuff");

        assert_eq!(request.body_type(), BodyType::String);
        assert_eq!(request.body_as_string(), "stuff");
        assert!(request.body_as_form().is_empty());
        assert!(request.body_as_byte_array().is_empty());
        assert!(request.body_as_multipart().is_empty());
    }

    #[test]
    fn test_switching_body_clears_previous_representation() {
        let request = Request::new("http://localhost/ping", Method::Post)
            .with_body_as_string("stuff")
            .with_body_as_byte_array(b"\x00\x01binary");

        assert_eq!(request.body_type(), BodyType::ByteArray);
        assert_eq!(request.body_as_string(), "");
        assert_eq!(request.body_as_byte_array(), b"\x00\x01binary".to_vec());
    }

    #[test]
    fn test_multipart_parts_are_base64_encoded() {
        let request = Request::new("http://localhost/upload", Method::Post)
            .with_body_as_multipart(&[b"first".as_slice(), b"second".as_slice()]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["bodyAsMultipart"][0], "Zmlyc3Q=");
        assert_eq!(json["bodyType"], "MULTIPART");
        assert_eq!(
            request.body_as_multipart(),
            vec![b"first".to_vec(), b"second".to_vec()]
        );
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = Request::get("http://localhost")
            .with_header("Content-Type", "application/json")
            .with_header("X-Stuff", "a")
            .with_header("X-Stuff", "b");

        assert_eq!(
            request.header_values("content-type"),
            Some(&["application/json".to_string()][..])
        );
        assert_eq!(request.header_values("x-stuff").map(|v| v.len()), Some(2));
        assert!(!request.has_header("X-Request-ID"));
    }

    #[test]
    fn test_deserialize_wire_record() {
        let json = r#"{
            "url": "http://www.example.com",
            "headers": {"X-Correlation-ID": ["222-qsdqd-446564"]},
            "method": "POST",
            "bodyAsString": "dummy body",
            "bodyType": "STRING"
        }"#;
        let request: Request = serde_json::from_str(json).unwrap();

        assert_eq!(request.url(), "http://www.example.com");
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.body_as_string(), "dummy body");
        assert!(request.has_header("x-correlation-id"));
    }

    #[test]
    fn test_deserialize_requires_url_method_and_body_type() {
        let missing_url = r#"{"method":"GET","bodyType":"STRING"}"#;
        let missing_body_type = r#"{"url":"http://a","method":"GET"}"#;
        assert!(serde_json::from_str::<Request>(missing_url).is_err());
        assert!(serde_json::from_str::<Request>(missing_body_type).is_err());
    }

    #[test]
    fn test_deserialize_keeps_only_active_body() {
        let json = r#"{
            "url": "http://a",
            "method": "POST",
            "bodyAsString": "ignored",
            "bodyAsForm": {"k": "v"},
            "bodyAsByteArray": "cmF3",
            "bodyType": "BYTE_ARRAY"
        }"#;
        let request: Request = serde_json::from_str(json).unwrap();

        assert_eq!(request.body_as_byte_array(), b"raw".to_vec());
        assert_eq!(
            request,
            Request::new("http://a", Method::Post).with_body_as_byte_array(b"raw")
        );
        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["bodyAsString"], "");
        assert!(back["bodyAsForm"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_base64_reads_as_empty() {
        let json = r#"{"url":"http://a","method":"PUT","bodyAsByteArray":"%%%","bodyType":"BYTE_ARRAY"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert!(request.body_as_byte_array().is_empty());
    }
}
