//! Status-preserving response decoding.
//!
//! # Data Flow
//! ```text
//! raw backend response (status, headers, body)
//!     → collect body, at most `max_size` bytes (stream fully consumed and dropped)
//!     → Content-Encoding: gzip? inflate, at most `max_size` bytes : read as-is
//!     → Decoder (json / safejson / string) into a map
//!     → ProxyResponse { is_complete: true, status_code: <backend status> }
//!     → EntityFormatter
//! ```
//!
//! # Design Decisions
//! - Unknown content encodings are read raw, never rejected
//! - Decoding never changes the status code
//! - No-op mode skips decoding and keeps the body bytes and headers
//! - The size limit bounds the decompressed bytes, not only the wire bytes

use axum::body::Body;
use axum::http::{header, Response};
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::io::Read;
use std::sync::Arc;

use crate::config::Encoding;
use crate::error::ProxyError;
use crate::proxy::formatter::EntityFormatter;
use crate::proxy::response::{header_lists, Metadata, ProxyResponse};

/// Structured decoder: fills `out` from a byte stream.
pub trait Decoder: Send + Sync {
    fn decode(&self, reader: &mut dyn Read, out: &mut Map<String, Value>) -> Result<(), ProxyError>;
}

/// JSON object decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, reader: &mut dyn Read, out: &mut Map<String, Value>) -> Result<(), ProxyError> {
        *out = serde_json::from_reader(reader).map_err(|e| ProxyError::Decode(e.to_string()))?;
        Ok(())
    }
}

/// JSON decoder that accepts any value; non-objects land under `collection`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeJsonDecoder;

impl Decoder for SafeJsonDecoder {
    fn decode(&self, reader: &mut dyn Read, out: &mut Map<String, Value>) -> Result<(), ProxyError> {
        let value: Value =
            serde_json::from_reader(reader).map_err(|e| ProxyError::Decode(e.to_string()))?;
        *out = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("collection".to_string(), other);
                map
            }
        };
        Ok(())
    }
}

/// Text decoder; the body lands under `content`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringDecoder;

impl Decoder for StringDecoder {
    fn decode(&self, reader: &mut dyn Read, out: &mut Map<String, Value>) -> Result<(), ProxyError> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| ProxyError::Decode(e.to_string()))?;
        out.insert("content".to_string(), Value::String(content));
        Ok(())
    }
}

/// Decoder for a configured encoding; `None` for no-op.
pub fn decoder_for(encoding: Encoding) -> Option<Arc<dyn Decoder>> {
    match encoding {
        Encoding::Json => Some(Arc::new(JsonDecoder)),
        Encoding::SafeJson => Some(Arc::new(SafeJsonDecoder)),
        Encoding::String => Some(Arc::new(StringDecoder)),
        Encoding::NoOp => None,
    }
}

/// Default cap on a backend response body, after decompression.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024; // 16MB

#[derive(Clone)]
enum ParseMode {
    Decoded {
        decoder: Arc<dyn Decoder>,
        formatter: Arc<dyn EntityFormatter>,
    },
    NoOp,
}

/// Turns a raw backend response into a [`ProxyResponse`].
#[derive(Clone)]
pub struct ResponseParser {
    mode: ParseMode,
    max_size: usize,
}

impl ResponseParser {
    pub fn decoded(decoder: Arc<dyn Decoder>, formatter: Arc<dyn EntityFormatter>) -> Self {
        Self {
            mode: ParseMode::Decoded { decoder, formatter },
            max_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Pass the body through unparsed.
    pub fn no_op() -> Self {
        Self {
            mode: ParseMode::NoOp,
            max_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Cap the body size, in bytes.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub async fn parse(&self, response: Response<Body>) -> Result<ProxyResponse, ProxyError> {
        match &self.mode {
            ParseMode::Decoded { decoder, formatter } => {
                let decoded = decode_response(response, decoder.as_ref(), self.max_size).await?;
                Ok(formatter.format(decoded))
            }
            ParseMode::NoOp => passthrough_response(response, self.max_size).await,
        }
    }
}

/// Decode a response body, keeping the backend status code.
pub async fn decode_response(
    response: Response<Body>,
    decoder: &dyn Decoder,
    max_size: usize,
) -> Result<ProxyResponse, ProxyError> {
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, max_size)
        .await
        .map_err(|e| ProxyError::Body(Box::new(e)))?;

    let gzipped = parts
        .headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));

    let mut data = Map::new();
    if gzipped {
        let inflated = inflate(&bytes, max_size)?;
        decoder.decode(&mut &inflated[..], &mut data)?;
    } else {
        decoder.decode(&mut &bytes[..], &mut data)?;
    }

    Ok(ProxyResponse::new(parts.status.as_u16(), data))
}

/// Gunzip `bytes`, failing once the output passes `max_size`.
fn inflate(bytes: &[u8], max_size: usize) -> Result<Vec<u8>, ProxyError> {
    let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);
    let mut inflated = Vec::new();
    GzDecoder::new(bytes)
        .take(limit)
        .read_to_end(&mut inflated)
        .map_err(|e| ProxyError::Decode(e.to_string()))?;
    if inflated.len() > max_size {
        return Err(ProxyError::Decode(format!(
            "decompressed body exceeds {} bytes",
            max_size
        )));
    }
    Ok(inflated)
}

/// Keep the body unparsed, with status and headers.
pub async fn passthrough_response(
    response: Response<Body>,
    max_size: usize,
) -> Result<ProxyResponse, ProxyError> {
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, max_size)
        .await
        .map_err(|e| ProxyError::Body(Box::new(e)))?;
    Ok(ProxyResponse {
        data: Map::new(),
        is_complete: true,
        metadata: Metadata {
            status_code: parts.status.as_u16(),
            headers: header_lists(&parts.headers),
        },
        io: Some(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::formatter::IdentityFormatter;
    use axum::http::StatusCode;
    use flate2::{write::GzEncoder, Compression};
    use serde_json::json;
    use std::io::Write;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn raw(status: StatusCode, encoding: Option<&str>, body: Vec<u8>) -> Response<Body> {
        let mut builder = Response::builder().status(status);
        if let Some(e) = encoding {
            builder = builder.header(header::CONTENT_ENCODING, e);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn json_parser() -> ResponseParser {
        ResponseParser::decoded(Arc::new(JsonDecoder), Arc::new(IdentityFormatter))
    }

    #[tokio::test]
    async fn test_gzip_and_plain_decode_equal() {
        let payload = json!({"id": 1, "tags": ["a", "b"], "nested": {"ok": true}});
        let bytes = serde_json::to_vec(&payload).unwrap();

        let plain = json_parser()
            .parse(raw(StatusCode::OK, None, bytes.clone()))
            .await
            .unwrap();
        let zipped = json_parser()
            .parse(raw(StatusCode::NOT_FOUND, Some("gzip"), gzip(&bytes)))
            .await
            .unwrap();

        assert_eq!(plain.data, zipped.data);
        assert_eq!(Value::Object(plain.data.clone()), payload);
        assert!(plain.is_complete && zipped.is_complete);
        assert_eq!(plain.metadata.status_code, 200);
        assert_eq!(zipped.metadata.status_code, 404);
    }

    #[tokio::test]
    async fn test_unknown_encoding_read_raw() {
        let resp = json_parser()
            .parse(raw(StatusCode::OK, Some("br"), br#"{"a":1}"#.to_vec()))
            .await
            .unwrap();
        assert_eq!(resp.data["a"], 1);
    }

    #[tokio::test]
    async fn test_decode_error_surfaces() {
        let err = json_parser()
            .parse(raw(StatusCode::OK, None, b"[1, 2".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Decode(_)));

        let err = json_parser()
            .parse(raw(StatusCode::OK, Some("gzip"), b"not gzip".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Decode(_)));
    }

    #[tokio::test]
    async fn test_safejson_wraps_arrays() {
        let parser = ResponseParser::decoded(Arc::new(SafeJsonDecoder), Arc::new(IdentityFormatter));
        let resp = parser
            .parse(raw(StatusCode::OK, None, b"[1,2,3]".to_vec()))
            .await
            .unwrap();
        assert_eq!(resp.data["collection"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_string_decoder() {
        let parser = ResponseParser::decoded(Arc::new(StringDecoder), Arc::new(IdentityFormatter));
        let resp = parser
            .parse(raw(StatusCode::ACCEPTED, None, b"hello".to_vec()))
            .await
            .unwrap();
        assert_eq!(resp.data["content"], "hello");
        assert_eq!(resp.metadata.status_code, 202);
    }

    #[tokio::test]
    async fn test_noop_keeps_body_and_headers() {
        let response = Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .header("x-backend", "b1")
            .body(Body::from("opaque"))
            .unwrap();
        let resp = ResponseParser::no_op().parse(response).await.unwrap();
        assert_eq!(resp.metadata.status_code, 503);
        assert_eq!(resp.metadata.headers["x-backend"], vec!["b1".to_string()]);
        assert_eq!(resp.io.as_deref(), Some(&b"opaque"[..]));
        assert!(resp.data.is_empty());
    }

    #[tokio::test]
    async fn test_gzip_bomb_is_rejected() {
        // 1MB of zeros compresses to about 1KB.
        let bomb = gzip(&vec![b'0'; 1024 * 1024]);
        assert!(bomb.len() < 16 * 1024);

        let err = json_parser()
            .with_max_size(64 * 1024)
            .parse(raw(StatusCode::OK, Some("gzip"), bomb))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Decode(msg) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let body = vec![b' '; 4096];
        let err = json_parser()
            .with_max_size(1024)
            .parse(raw(StatusCode::OK, None, body.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Body(_)));

        let err = ResponseParser::no_op()
            .with_max_size(1024)
            .parse(raw(StatusCode::OK, None, body))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Body(_)));
    }

    #[tokio::test]
    async fn test_body_at_limit_is_accepted() {
        let payload = serde_json::to_vec(&json!({"a": "x".repeat(1000)})).unwrap();
        let resp = json_parser()
            .with_max_size(payload.len())
            .parse(raw(StatusCode::OK, Some("gzip"), gzip(&payload)))
            .await
            .unwrap();
        assert_eq!(resp.data["a"].as_str().map(str::len), Some(1000));
    }
}
