pub mod exchange;
pub mod request;
pub mod response;

use std::collections::BTreeMap;

/// 请求头/响应头：名称 -> 有序的值列表
pub type Headers = BTreeMap<String, Vec<String>>;

pub use exchange::{Exchange, ExchangeBuilder};
pub use request::{BodyType, Method, Request};
pub use response::{Response, TRANSPORT_FAILURE_STATUS};
