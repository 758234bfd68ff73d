use crate::model::{BodyType, Request};

/// 编码后的请求体，两种传输实现共用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    /// 请求本身没有 Content-Type 时使用的默认值
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl EncodedBody {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn encode_body(request: &Request) -> EncodedBody {
    match request.body_type() {
        BodyType::String => EncodedBody {
            content_type: None,
            bytes: request.body_as_string().as_bytes().to_vec(),
        },
        BodyType::Form => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(request.body_as_form())
                .finish();
            EncodedBody {
                content_type: Some("application/x-www-form-urlencoded".to_string()),
                bytes: encoded.into_bytes(),
            }
        }
        BodyType::ByteArray => EncodedBody {
            content_type: Some("application/octet-stream".to_string()),
            bytes: request.body_as_byte_array(),
        },
        BodyType::Multipart => encode_multipart(&request.body_as_multipart()),
    }
}

/// multipart/form-data，每一段命名为 `part<N>`
fn encode_multipart(parts: &[Vec<u8>]) -> EncodedBody {
    let boundary: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(24)
        .collect();

    let mut bytes = Vec::new();
    for (index, part) in parts.iter().enumerate() {
        bytes.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"part{index}\"; filename=\"part{index}\"\r\n"
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        bytes.extend_from_slice(part);
        bytes.extend_from_slice(b"\r\n");
    }
    bytes.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    EncodedBody {
        content_type: Some(format!("multipart/form-data; boundary={}", boundary)),
        bytes,
    }
}
