//! The upstream HTTP client and the single forwarding call.

use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result};
use crate::core::header_policy::{caller_response_headers, upstream_request_headers};
use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use std::time::Duration;

/// Create the shared HTTP client with connection pooling.
///
/// `request_timeout_secs` bounds the whole call: connect, send and reading the
/// full response body.
pub fn create_http_client(config: &AppConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

/// A fully buffered upstream response.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Build the caller's response to a request made with `method`.
    ///
    /// A `HEAD` reply has no body, so it keeps the `Content-Length` the
    /// upstream advertised.
    pub fn into_response_for(self, method: &Method) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let body_len = (*method != Method::HEAD).then_some(self.body.len());
        let headers = caller_response_headers(&self.headers, body_len);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Send one request upstream and buffer the whole response.
///
/// There is exactly one attempt. Any transport failure, including the client
/// timeout firing while the body is still being read, comes back as
/// [`AppError::Upstream`].
pub async fn send_upstream(
    client: &reqwest::Client,
    method: &Method,
    url: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<UpstreamReply> {
    let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|e| AppError::BadRequest(format!("Unsupported method {}: {}", method, e)))?;

    let response = client
        .request(method, url)
        .headers(upstream_request_headers(headers))
        .body(body)
        .send()
        .await?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    Ok(UpstreamReply {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(timeout_secs: u64) -> reqwest::Client {
        let config = AppConfig {
            request_timeout_secs: timeout_secs,
            ..AppConfig::default()
        };
        create_http_client(&config).unwrap()
    }

    #[tokio::test]
    async fn test_send_upstream_relays_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(body_bytes(b"{\"model\":\"m\"}".to_vec()))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("request-id", "req_1")
                    .set_body_string("created"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("sk-test"));
        headers.insert("host", HeaderValue::from_static("proxy.local"));

        let reply = send_upstream(
            &test_client(5),
            &Method::POST,
            &format!("{}/v1/messages", server.uri()),
            &headers,
            Bytes::from_static(b"{\"model\":\"m\"}"),
        )
        .await
        .unwrap();

        assert_eq!(reply.status, 201);
        assert_eq!(reply.body, Bytes::from_static(b"created"));
        assert_eq!(reply.headers.get("request-id").unwrap(), "req_1");
    }

    #[tokio::test]
    async fn test_send_upstream_timeout_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let err = send_upstream(
            &test_client(1),
            &Method::GET,
            &format!("{}/v1/models", server.uri()),
            &HeaderMap::new(),
            Bytes::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Upstream(ref e) if e.is_timeout()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_reply_into_response_sets_content_length() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "content-type",
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "transfer-encoding",
            reqwest::header::HeaderValue::from_static("chunked"),
        );
        let reply = UpstreamReply {
            status: 429,
            headers,
            body: Bytes::from_static(b"{\"type\":\"error\"}"),
        };
        assert_eq!(reply.content_type(), Some("application/json"));

        let response = reply.into_response_for(&Method::POST);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("content-length").unwrap(), "16");
        assert!(response.headers().get("transfer-encoding").is_none());
    }

    #[tokio::test]
    async fn test_head_reply_keeps_upstream_content_length() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v1/files/file_1/content"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "1234"))
            .expect(1)
            .mount(&server)
            .await;

        let reply = send_upstream(
            &test_client(5),
            &Method::HEAD,
            &format!("{}/v1/files/file_1/content", server.uri()),
            &HeaderMap::new(),
            Bytes::new(),
        )
        .await
        .unwrap();
        assert!(reply.body.is_empty());

        let response = reply.into_response_for(&Method::HEAD);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-length").unwrap(), "1234");
    }
}
