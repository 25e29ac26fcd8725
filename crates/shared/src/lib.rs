//! # Phasor 共有ユーティリティ
//!
//! このクレートは、Phasor の各サービスで使用される共通ユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - ビジネスロジックを含まない純粋なユーティリティのみを配置
//! - 外部クレートへの依存は feature で必要な分だけ有効にする
//!   - `health`: ヘルスチェックのルーター（axum に依存）
//!   - `observability`: トレーシング初期化、Request ID、ログ、パニック回復
//!   - `test-support`: テスト用のログキャプチャ

#[cfg(feature = "observability")]
pub mod canonical_log;
pub mod error_response;
#[cfg(feature = "health")]
pub mod health;
#[cfg(feature = "observability")]
pub mod observability;
#[cfg(feature = "observability")]
pub mod recovery;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error_response::ErrorResponse;
#[cfg(feature = "health")]
pub use health::{
    CheckStatus,
    HealthDescriptor,
    HealthResponse,
    ReadinessCheck,
    ReadinessResponse,
    ReadinessStatus,
};
