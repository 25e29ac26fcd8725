//! # Phasor Backend サーバー
//!
//! 稼働中のインスタンスの識別情報を返す HTTP サーバー。
//!
//! ## エンドポイント
//!
//! | Method | Path | 説明 |
//! |--------|------|------|
//! | GET | `/health/live` | Liveness Check |
//! | GET | `/health/ready` | Readiness Check |
//! | GET | `/instance/info` | バージョン、ホスト名、稼働時間 |
//!
//! ## 起動引数・環境変数
//!
//! | 名前 | 必須 | 説明 |
//! |------|------|------|
//! | `--config` | No | 設定ファイルの絶対パス（デフォルト: `/config/config.yaml`） |
//! | `VERSION` | **Yes** | アプリケーションバージョン |
//! | `RUST_LOG` | No | 設定ファイルのログレベルを上書きする |
//!
//! ## 起動方法
//!
//! ```bash
//! VERSION=1.2.3 cargo run -p phasor-backend -- --config "$PWD/config.yaml"
//! ```
//!
//! 設定の読み込みかロガーの初期化に失敗した場合、待ち受けを開始せずに非ゼロで終了する。

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context as _;
use clap::Parser;
use phasor_backend::{
    app_builder::{SERVICE_NAME, build_router},
    config::Config,
};
use phasor_shared::observability::init_tracing;
use tokio::net::TcpListener;

/// 待ち受けポート
const SERVER_PORT: u16 = 8080;

/// コマンドライン引数
#[derive(Debug, Parser)]
#[command(name = "phasor-backend", version, about = "Instance identity probe service")]
struct Args {
    /// 設定ファイルのパス（絶対パス）
    #[arg(long, default_value = "/config/config.yaml")]
    config: PathBuf,
}

/// Backend サーバーのエントリーポイント
///
/// 以下の順序で初期化を行う:
///
/// 1. 環境変数の読み込み（.env ファイル）
/// 2. 設定の読み込みと検証
/// 3. トレーシングの初期化
/// 4. ルーターの構築
/// 5. HTTP サーバーの起動（SIGINT / SIGTERM で graceful shutdown）
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    // 本番環境では .env ファイルは使用せず、環境変数を直接設定する
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = Config::load(&args.config).context("failed to load config")?;

    let tracing_config = config
        .log_config
        .tracing_config(SERVICE_NAME)
        .context("failed to setup logger")?;
    init_tracing(&tracing_config).context("failed to setup logger")?;
    let _tracing_guard = tracing::info_span!(
        "app",
        service = SERVICE_NAME,
        environment = %config.environment,
    )
    .entered();

    let app = build_router(&config);

    let addr = SocketAddr::from(([0, 0, 0, 0], SERVER_PORT));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        version = %config.version,
        "Backend サーバーが起動しました"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Backend サーバーを停止しました");

    Ok(())
}

/// 最初の停止シグナルで完了する
///
/// Unix では SIGTERM（Kubernetes からの停止）と SIGINT（Ctrl-C）を待つ。
/// ハンドラの登録に失敗したシグナルは待たない。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl-C ハンドラの登録に失敗しました");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM ハンドラの登録に失敗しました");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("停止シグナルを受信しました。処理中のリクエストを待機します");
}
