//! # インスタンス情報ハンドラ
//!
//! 稼働中のインスタンスを識別する情報を返す。
//!
//! ## エンドポイント
//!
//! ```text
//! GET /instance/info
//! ```
//!
//! ## レスポンス例
//!
//! ```json
//! {
//!   "version": "1.2.3",
//!   "hostname": "backend-7d9f8c-abcde",
//!   "uptime": "1h2m3.5s",
//!   "runtime_version": "rustc 1.85.0 (4d91de4e4 2025-02-17)",
//!   "timestamp": "2026-01-01T00:00:00.123456789Z"
//! }
//! ```
//!
//! `version` と `start_time` は [`InstanceRegistry`] の構築時に確定し、以後変わらない。
//! `uptime` と `timestamp` はリクエストごとに計算する。

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::InstanceError;

/// ビルドに使った rustc のバージョン（build.rs で埋め込む）
pub const RUNTIME_VERSION: &str = env!("PHASOR_RUSTC_VERSION");

/// ホスト名の取得関数
///
/// 失敗しない。取得できない場合のフォールバックは実装側に含める。
pub type HostnameResolver = Arc<dyn Fn() -> String + Send + Sync>;

/// OS からホスト名を取得する
///
/// 取得できない場合は `"unknown"` を返す。
pub fn system_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// インスタンス情報レスポンス
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceInfoResponse {
    /// アプリケーションバージョン
    pub version:         String,
    /// ホスト名
    pub hostname:        String,
    /// 起動からの経過時間（`1h2m3.5s` 形式で出力）
    #[serde(serialize_with = "serialize_uptime")]
    pub uptime:          Duration,
    /// ビルドに使った rustc のバージョン
    pub runtime_version: String,
    /// レスポンス生成時刻
    pub timestamp:       DateTime<Utc>,
}

/// プロセス内で1つだけ構築されるインスタンス情報の保持者
///
/// 構築後は変更されないため、ロックなしで並行リクエストから参照できる。
pub struct InstanceRegistry {
    version:    String,
    hostname:   HostnameResolver,
    start_time: Instant,
}

impl InstanceRegistry {
    /// 現在時刻を起動時刻として記録する
    pub fn new(version: impl Into<String>, hostname: HostnameResolver) -> Self {
        Self {
            version: version.into(),
            hostname,
            start_time: Instant::now(),
        }
    }

    /// 構築時に渡されたバージョン
    pub fn version(&self) -> &str {
        &self.version
    }

    /// 起動からの経過時間
    ///
    /// 単調時計で計測するため、呼ぶたびに減ることはない。
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 現時点のインスタンス情報を生成する
    pub fn info(&self) -> InstanceInfoResponse {
        InstanceInfoResponse {
            version:         self.version.clone(),
            hostname:        (self.hostname)(),
            uptime:          self.uptime(),
            runtime_version: RUNTIME_VERSION.to_string(),
            timestamp:       Utc::now(),
        }
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("version", &self.version)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

/// インスタンス情報エンドポイント
///
/// シリアライズに失敗した場合は 500 を返す。
#[tracing::instrument(skip_all)]
pub async fn get_instance_info(
    State(registry): State<Arc<InstanceRegistry>>,
) -> Result<Response, InstanceError> {
    let body = serde_json::to_vec(&registry.info())?;

    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response())
}

fn serialize_uptime<S: Serializer>(uptime: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*uptime))
}

/// 経過時間を `1h2m3.5s` 形式の文字列にする
///
/// 1秒未満は `ms` / `µs` / `ns` 単位で表す。小数部の末尾の 0 は省く。
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fractional(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", fractional(nanos, 1_000_000));
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs_nanos =
        u128::from(total_secs % 60) * 1_000_000_000 + u128::from(duration.subsec_nanos());
    let seconds = fractional(secs_nanos, 1_000_000_000);

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// `value / unit` を末尾の 0 を省いた小数表記にする
fn fractional(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }

    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
