//! # Canonical Log Line
//!
//! リクエスト完了時に method, path, status, latency を1行にまとめたアクセスログを出力する
//! axum ミドルウェア。`axum::middleware::from_fn` で組み込む。
//!
//! リクエストスパン（`TraceLayer` + [`make_request_span`]）の内側に置くこと。
//! そうすればログ行はスパンの `request_id` と紐づく。
//!
//! ```text
//! SetRequestIdLayer → TraceLayer → PropagateRequestIdLayer → canonical_log_line → handler
//! ```
//!
//! [`make_request_span`]: crate::observability::make_request_span

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// リクエストごとに Canonical Log Line を1行出力する
///
/// `log.type = "canonical"` マーカーで他のログと区別できる。
/// 5xx は ERROR、それ以外は INFO で出力する。
pub async fn canonical_log_line(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    if status.is_server_error() {
        tracing::error!(
            log.r#type = "canonical",
            http.method = %method,
            http.path = %path,
            http.status_code = status.as_u16(),
            http.latency_ms = latency_ms,
            "リクエスト失敗"
        );
    } else {
        tracing::info!(
            log.r#type = "canonical",
            http.method = %method,
            http.path = %path,
            http.status_code = status.as_u16(),
            http.latency_ms = latency_ms,
            "リクエスト完了"
        );
    }

    response
}
