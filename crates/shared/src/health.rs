//! # ヘルスチェック
//!
//! オーケストレーター（Kubernetes 等）向けの Liveness / Readiness エンドポイントを提供する。
//!
//! | Probe | Path | 意味 |
//! |---|---|---|
//! | Liveness | `/live` | プロセスが生きているか。失敗 → 再起動 |
//! | Readiness | `/ready` | トラフィックを受けられるか。失敗 → LB から外す |
//!
//! [`router`] が返すルーターを呼び出し側で `/health` 配下にマウントする想定。
//! ハンドラはトレーシングやログの仕組みに依存しない。
//!
//! Readiness は登録された [`ReadinessCheck`] をすべて実行し、1つでも失敗すれば 503 を返す。
//! チェックが1つも登録されていなければ常に ready。

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::{Deserialize, Serialize};

/// 個別チェックのタイムアウト
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// ヘルスチェックが返すサービス識別情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthDescriptor {
    /// アプリケーションバージョン
    pub version:     String,
    /// 実行環境名（production, development 等）
    pub environment: String,
}

impl HealthDescriptor {
    pub fn new(version: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            version:     version.into(),
            environment: environment.into(),
        }
    }
}

/// Liveness レスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 稼働状態（常に `"ok"`）
    pub status:      String,
    /// アプリケーションバージョン
    pub version:     String,
    /// 実行環境名
    pub environment: String,
}

/// 個別チェックの結果ステータス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// チェック成功
    Ok,
    /// チェック失敗
    Error,
}

/// Readiness 全体のステータス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// 全チェックが成功
    Ready,
    /// 一部のチェックが失敗
    NotReady,
}

/// Readiness レスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// 全体のステータス
    pub status: ReadinessStatus,
    /// 個別チェック結果（キー: チェック名、値: ステータス）
    pub checks: HashMap<String, CheckStatus>,
}

/// Readiness を判定する依存先チェック
///
/// 実装は速やかに返すこと。[`CHECK_TIMEOUT`] を超えたチェックは失敗扱いになる。
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    /// レスポンスの `checks` に使うキー
    fn name(&self) -> &str;

    /// チェックを実行する
    async fn check(&self) -> CheckStatus;
}

/// ヘルスチェックハンドラの State
struct HealthState {
    descriptor: HealthDescriptor,
    checks:     Vec<Arc<dyn ReadinessCheck>>,
}

/// `/live` と `/ready` を持つルーターを構築する（Readiness チェックなし）
pub fn router(descriptor: HealthDescriptor) -> Router {
    router_with_checks(descriptor, Vec::new())
}

/// `/live` と `/ready` を持つルーターを構築する
pub fn router_with_checks(
    descriptor: HealthDescriptor,
    checks: Vec<Arc<dyn ReadinessCheck>>,
) -> Router {
    let state = Arc::new(HealthState { descriptor, checks });

    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

/// Liveness エンドポイント
///
/// HTTP に応答できる時点で生きているので、依存先は確認しない。
async fn liveness(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status:      "ok".to_string(),
        version:     state.descriptor.version.clone(),
        environment: state.descriptor.environment.clone(),
    })
}

/// Readiness エンドポイント
///
/// 全チェック OK → 200、1 つでも失敗 → 503。
async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let mut checks = HashMap::new();
    for check in &state.checks {
        let status = run_check(check.as_ref()).await;
        checks.insert(check.name().to_string(), status);
    }

    let all_ok = checks.values().all(|s| matches!(s, CheckStatus::Ok));
    let (http_status, status) = if all_ok {
        (StatusCode::OK, ReadinessStatus::Ready)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, ReadinessStatus::NotReady)
    };

    (http_status, Json(ReadinessResponse { status, checks }))
}

/// チェックをタイムアウト付きで実行する
async fn run_check(check: &dyn ReadinessCheck) -> CheckStatus {
    match tokio::time::timeout(CHECK_TIMEOUT, check.check()).await {
        Ok(status) => {
            if status == CheckStatus::Error {
                tracing::warn!(check = check.name(), "readiness check failed");
            }
            status
        }
        Err(_) => {
            tracing::warn!(check = check.name(), "readiness check timed out");
            CheckStatus::Error
        }
    }
}
