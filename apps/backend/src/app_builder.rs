//! # Backend アプリケーション構築
//!
//! ルーターとミドルウェアの組み立てを担当する。
//! `main.rs` は設定読み込み、ロガー初期化、サーバー起動に集中する。
//!
//! ## レイヤー構成（外側 → 内側）
//!
//! ```text
//! recovery（パニック → 500）
//! ├── /health/live, /health/ready          … トレース・ログなし
//! └── SetRequestId → Trace → PropagateRequestId → canonical_log_line
//!     └── /instance/info
//! ```
//!
//! ヘルスチェックはトレース・ログのレイヤーの外に置く。
//! プローブでトレースやログを汚さず、ロギングが劣化していても応答できるようにする。

use std::sync::Arc;

use axum::{Router, middleware::from_fn, routing::get};
use phasor_shared::{
    HealthDescriptor,
    canonical_log::canonical_log_line,
    health,
    observability::{MakeRequestUuidV7, make_request_span},
    recovery,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handler::{HostnameResolver, InstanceRegistry, get_instance_info, system_hostname},
};

/// サービス名（ログの `service` フィールドに出力）
pub const SERVICE_NAME: &str = "phasor-backend";

/// OS のホスト名を使うルーターを構築する
pub fn build_router(config: &Config) -> Router {
    build_router_with_hostname(config, Arc::new(system_hostname))
}

/// ホスト名の取得関数を指定してルーターを構築する
///
/// テストで固定のホスト名を使うためのもの。
/// 同じ入力からは同じ構成のルーターができる。
pub fn build_router_with_hostname(config: &Config, hostname: HostnameResolver) -> Router {
    let registry = Arc::new(InstanceRegistry::new(config.version.clone(), hostname));

    let health_routes = health::router(HealthDescriptor::new(
        config.version.clone(),
        config.environment.clone(),
    ));

    let instance_routes = Router::new()
        .route("/instance/info", get(get_instance_info))
        .with_state(registry)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(from_fn(canonical_log_line)),
        );

    Router::new()
        .nest("/health", health_routes)
        .merge(instance_routes)
        .layer(recovery::layer())
}
