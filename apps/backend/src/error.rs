//! # Backend エラー定義
//!
//! リクエスト処理中のエラーと、HTTP レスポンスへの変換を定義する。
//! 起動時の設定エラーは [`crate::config::ConfigError`] を参照。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use phasor_shared::ErrorResponse;
use thiserror::Error;

/// インスタンス情報の取得で発生するエラー
#[derive(Debug, Error)]
pub enum InstanceError {
    /// レスポンスのシリアライズに失敗
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for InstanceError {
    fn into_response(self) -> Response {
        let (status, error_type, detail) = match &self {
            InstanceError::Encode(e) => {
                tracing::error!("レスポンスのシリアライズに失敗しました: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "encode-failed",
                    "failed to encode response",
                )
            }
        };

        (
            status,
            Json(ErrorResponse::new(
                error_type,
                "Internal Server Error",
                status.as_u16(),
                detail,
            )),
        )
            .into_response()
    }
}
