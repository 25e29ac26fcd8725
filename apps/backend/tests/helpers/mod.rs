//! # 統合テスト用ヘルパー
//!
//! 本番と同じミドルウェア構成のルーターを、固定ホスト名 `"test-host"` で構築する。

#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body};
use http::{Request, Response};
use http_body_util::BodyExt;
use phasor_backend::{
    app_builder::build_router_with_hostname,
    config::{Config, LogConfig},
    handler::HostnameResolver,
};
use tower::ServiceExt;

/// テスト用の固定ホスト名
pub const TEST_HOSTNAME: &str = "test-host";

/// テスト用の設定を作成する
pub fn test_config(version: &str) -> Config {
    Config {
        version:     version.to_string(),
        environment: "test".to_string(),
        log_config:  LogConfig::default(),
    }
}

/// 固定ホスト名のルーターを構築する
pub fn test_app(version: &str) -> Router {
    test_app_with_hostname(version, Arc::new(|| TEST_HOSTNAME.to_string()))
}

/// ホスト名の取得関数を指定してルーターを構築する
pub fn test_app_with_hostname(version: &str, hostname: HostnameResolver) -> Router {
    build_router_with_hostname(&test_config(version), hostname)
}

/// GET リクエストを送る
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// レスポンスボディを JSON として読み出す
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
