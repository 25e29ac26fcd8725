//! # Observability 基盤
//!
//! トレーシング初期化、ログ出力形式の設定、Request ID の採番とスパン生成を提供する。
//!
//! ログ設定は設定ファイルの `log_config` ブロック（level / format / add_source）から
//! 組み立てる。値が不正な場合は起動を中止できるよう、パースはエラーを返す。
//!
//! ## Request ID の流れ
//!
//! ```text
//! SetRequestIdLayer(MakeRequestUuidV7) → TraceLayer(make_request_span) → PropagateRequestIdLayer
//! ```
//!
//! クライアントが `x-request-id` を送ってきた場合はその値を引き継ぎ、
//! なければ UUID v7 を採番する。

use http::{HeaderValue, Request};
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing_subscriber::filter::LevelFilter;

/// Request ID を運ぶ HTTP ヘッダー名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ログ初期化のエラー
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// 未知のログレベル
    #[error("unknown log level: {0:?}")]
    UnknownLevel(String),

    /// 未知のログ形式
    #[error("unknown log format: {0:?}")]
    UnknownFormat(String),

    /// グローバル subscriber の設定に失敗（二重初期化など）
    #[error("failed to initialize tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// ログレベル
///
/// 空文字は [`Info`](LogLevel::Info) として扱う。大文字小文字は区別しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// 文字列からログレベルをパースする
    pub fn parse(s: &str) -> Result<Self, ObservabilityError> {
        match s.to_ascii_lowercase().as_str() {
            "" => Ok(Self::default()),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ObservabilityError::UnknownLevel(s.to_string())),
        }
    }

    /// `tracing` のレベルフィルタに変換する
    pub fn as_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

/// ログ出力形式
///
/// 空文字は [`Text`](LogFormat::Text) として扱う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 形式（本番環境向け）
    Json,
    /// 人間が読みやすい形式（開発環境向け）
    #[default]
    Text,
}

impl LogFormat {
    /// 文字列からログ形式をパースする
    pub fn parse(s: &str) -> Result<Self, ObservabilityError> {
        match s.to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ObservabilityError::UnknownFormat(s.to_string())),
        }
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// サービス名（起動ログと `app` スパンに出力）
    pub service_name: String,
    /// ログレベル（`RUST_LOG` が設定されていればそちらを優先）
    pub level:        LogLevel,
    /// ログ出力形式
    pub format:       LogFormat,
    /// ソースファイル名と行番号を出力するか
    pub add_source:   bool,
}

impl TracingConfig {
    /// 新しい設定を作成する
    pub fn new(
        service_name: impl Into<String>,
        level: LogLevel,
        format: LogFormat,
        add_source: bool,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            level,
            format,
            add_source,
        }
    }

    /// 文字列のログ設定から組み立てる
    ///
    /// 設定ファイルの値をそのまま渡す。不正な値はエラーになる。
    pub fn parse(
        service_name: impl Into<String>,
        level: &str,
        format: &str,
        add_source: bool,
    ) -> Result<Self, ObservabilityError> {
        Ok(Self::new(
            service_name,
            LogLevel::parse(level)?,
            LogFormat::parse(format)?,
            add_source,
        ))
    }
}

/// トレーシングを初期化する
///
/// `RUST_LOG` 環境変数が設定されていればそれを優先し、
/// 未設定の場合は [`TracingConfig::level`] を使う。
///
/// JSON モードでは `timestamp`, `level`, `target`, `message` がトップレベルに出力される。
pub fn init_tracing(config: &TracingConfig) -> Result<(), ObservabilityError> {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::default().add_directive(config.level.as_filter().into())
    });

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_file(config.add_source)
            .with_line_number(config.add_source)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_file(config.add_source)
            .with_line_number(config.add_source)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// UUID v7 で Request ID を採番する
///
/// 時刻順にソート可能なので、ログを時系列で追いやすい。
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// リクエストスパンを生成する
///
/// `SetRequestIdLayer` の内側で呼ばれる前提で、`x-request-id` ヘッダーの値を
/// `request_id` フィールドとして記録する。以降のログはこのスパンに紐づく。
pub fn make_request_span<B>(request: &Request<B>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        http.method = %request.method(),
        http.path = %request.uri().path(),
        request_id = %request_id,
    )
}
