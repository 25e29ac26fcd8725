//! # パニック回復ミドルウェア
//!
//! ハンドラ内で発生したパニックを捕捉し、500 レスポンスに変換する。
//! 1リクエストの失敗でプロセスが落ちることはない。
//!
//! [`tower_http::catch_panic::CatchPanicLayer`] にレスポンス生成関数を渡して構築する。
//! ルーター全体を包む最も外側のレイヤーとして配置すること。

use std::any::Any;

use http::{Response, StatusCode, header};
use tower_http::catch_panic::CatchPanicLayer;

use crate::ErrorResponse;

/// パニック時のレスポンス生成関数の型
pub type PanicResponder = fn(Box<dyn Any + Send + 'static>) -> Response<String>;

/// パニック回復レイヤーを生成する
pub fn layer() -> CatchPanicLayer<PanicResponder> {
    CatchPanicLayer::custom(handle_panic as PanicResponder)
}

/// パニックをログに記録し、RFC 9457 形式の 500 レスポンスを返す
///
/// クライアントにはパニックの内容を返さない。
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response<String> {
    let message = panic_message(payload.as_ref());
    tracing::error!(panic.message = %message, "ハンドラでパニックが発生しました");

    let body = serde_json::to_string(&ErrorResponse::internal_error("内部エラーが発生しました"))
        .unwrap_or_default();

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/problem+json"),
    );
    response
}

/// パニックペイロードから人間が読めるメッセージを取り出す
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
