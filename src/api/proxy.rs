//! The forwarding handler.
//!
//! Every request that reaches [`proxy_request`] is sent upstream once, relayed
//! back verbatim and recorded as exactly one [`LogEntry`], whichever way the
//! exchange ends. The exchange runs on its own task, so a caller that hangs up
//! early still gets its entry once the upstream call settles.

use crate::api::handlers::AppState;
use crate::api::upstream::send_upstream;
use crate::core::error::AppError;
use crate::core::jsonl_logger::LogEntry;
use crate::core::logging::generate_request_id;
use crate::core::summary::{RequestSummary, ResponseSummary};
use axum::{
    extract::{Request, State},
    http::Uri,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Path plus query string exactly as the caller sent it.
fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Forward a request to the upstream API and log the exchange.
#[tracing::instrument(
    skip_all,
    fields(
        request_id = %generate_request_id(),
        method = %request.method(),
        path = %request.uri(),
    )
)]
pub async fn proxy_request(State(state): State<Arc<AppState>>, request: Request) -> Response {
    // Dropping the JoinHandle detaches the task instead of cancelling it.
    let exchange = tokio::spawn(forward_and_record(state, request).in_current_span());
    match exchange.await {
        Ok(response) => response,
        Err(e) => {
            let error = AppError::from(e);
            tracing::error!(error = %error, "Forwarding task did not complete");
            error.into_response()
        }
    }
}

async fn forward_and_record(state: Arc<AppState>, request: Request) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let path = path_and_query(&parts.uri);
    let project = state.config.project.as_str();

    let body = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = AppError::BadRequest(format!("Failed to read request body: {}", e));
            let entry = LogEntry::new(project, &path, RequestSummary::default())
                .with_failure(error.status_code().as_u16())
                .with_duration(started.elapsed());
            tracing::warn!(error = %error, "Rejected request");
            state.record(&entry).await;
            return error.into_response();
        }
    };

    let request_summary = RequestSummary::from_body(&body);
    let target = state.config.upstream_target(&path);

    match send_upstream(
        &state.http_client,
        &parts.method,
        &target,
        &parts.headers,
        body,
    )
    .await
    {
        Ok(reply) => {
            let elapsed = started.elapsed();
            let response_summary = ResponseSummary::from_upstream(reply.content_type(), &reply.body);
            let entry = LogEntry::new(project, &path, request_summary)
                .with_response(reply.status, response_summary)
                .with_duration(elapsed);

            tracing::info!(
                model = %entry.model,
                status_code = entry.status_code,
                duration_ms = entry.duration_ms,
                input_tokens = entry.input_tokens,
                output_tokens = entry.output_tokens,
                "{} {} -> {} ({}ms, {}+{} tokens)",
                parts.method,
                entry.path,
                entry.status_code,
                entry.duration_ms,
                entry.input_tokens,
                entry.output_tokens
            );

            state.record(&entry).await;
            reply.into_response_for(&parts.method)
        }
        Err(error) => {
            let entry = LogEntry::new(project, &path, request_summary)
                .with_failure(error.status_code().as_u16())
                .with_duration(started.elapsed());

            tracing::error!(
                error = %error,
                status_code = entry.status_code,
                duration_ms = entry.duration_ms,
                "Proxy error: {} {}",
                parts.method,
                entry.path
            );

            state.record(&entry).await;
            error.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query_keeps_query() {
        let uri: Uri = "/v1/messages?beta=true&x=1".parse().unwrap();
        assert_eq!(path_and_query(&uri), "/v1/messages?beta=true&x=1");
    }

    #[test]
    fn test_path_and_query_plain_path() {
        let uri: Uri = "/v1/models".parse().unwrap();
        assert_eq!(path_and_query(&uri), "/v1/models");
    }
}
