//! Outward response projection.
//!
//! # Responsibilities
//! - Map pipeline errors to HTTP status codes
//! - Copy backend metadata headers onto the outward response
//! - Render the response body (JSON data or raw passthrough bytes)
//!
//! # Design Decisions
//! - Hop-by-hop headers are never relayed
//! - Framing headers (`content-length`, `content-encoding`, `content-type`)
//!   are dropped when the body is re-rendered as JSON

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Map;

use crate::error::ProxyError;
use crate::proxy::ProxyResponse;

/// Maps an error without a carried status to an outward status.
pub type ErrorMapper = fn(&ProxyError) -> StatusCode;

/// Default error mapping.
pub fn default_error_status(err: &ProxyError) -> StatusCode {
    match err {
        ProxyError::Status { status, .. } => *status,
        ProxyError::Transport(_) => StatusCode::BAD_GATEWAY,
        ProxyError::Cancelled | ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const FRAMING: &[&str] = &["content-length", "content-encoding", "content-type"];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Append the response's metadata headers to `target`.
pub fn copy_metadata_headers(target: &mut HeaderMap, response: &ProxyResponse) {
    let raw = response.io.is_some();
    for (name, values) in &response.metadata.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if !raw && FRAMING.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            continue;
        }
        if raw && name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(v) = HeaderValue::from_str(value) {
                target.append(header_name.clone(), v);
            }
        }
    }
}

/// Render the body with the given status.
pub fn render(status: StatusCode, response: Option<&ProxyResponse>) -> Response {
    let mut out = match response {
        Some(ProxyResponse { io: Some(bytes), .. }) => Response::new(Body::from(bytes.clone())),
        Some(resp) => Json(&resp.data).into_response(),
        None => Json(Map::new()).into_response(),
    };
    *out.status_mut() = status;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            default_error_status(&ProxyError::Transport("refused".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            default_error_status(&ProxyError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(default_error_status(&ProxyError::Cancelled), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            default_error_status(&ProxyError::Decode("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            default_error_status(&ProxyError::Status {
                status: StatusCode::FORBIDDEN,
                message: "no".into()
            }),
            StatusCode::FORBIDDEN
        );
    }

    fn with_headers(headers: &[(&str, &str)]) -> ProxyResponse {
        let mut resp = ProxyResponse::new(200, Map::new());
        resp.metadata.headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
            .collect::<HashMap<_, _>>();
        resp
    }

    #[test]
    fn test_skips_hop_by_hop_and_framing() {
        let resp = with_headers(&[
            ("X-Backend", "users"),
            ("Connection", "close"),
            ("Transfer-Encoding", "chunked"),
            ("Content-Encoding", "gzip"),
        ]);
        let mut headers = HeaderMap::new();
        copy_metadata_headers(&mut headers, &resp);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["x-backend"], "users");
    }

    #[test]
    fn test_raw_body_keeps_content_type() {
        let mut resp = with_headers(&[("Content-Type", "text/csv"), ("Content-Length", "3")]);
        resp.io = Some(Bytes::from_static(b"a,b"));
        let mut headers = HeaderMap::new();
        copy_metadata_headers(&mut headers, &resp);
        assert_eq!(headers["content-type"], "text/csv");
        assert!(headers.get("content-length").is_none());
    }

    #[tokio::test]
    async fn test_render_json_and_raw() {
        let mut data = Map::new();
        data.insert("a".into(), json!(1));
        let json_resp = render(StatusCode::NOT_FOUND, Some(&ProxyResponse::new(404, data)));
        assert_eq!(json_resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(json_resp.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, json!({"a": 1}));

        let mut raw = ProxyResponse::new(200, Map::new());
        raw.io = Some(Bytes::from_static(b"plain"));
        let raw_resp = render(StatusCode::OK, Some(&raw));
        let body = axum::body::to_bytes(raw_resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"plain");

        let empty = render(StatusCode::OK, None);
        let body = axum::body::to_bytes(empty.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{}");
    }
}
