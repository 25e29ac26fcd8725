//! # Phasor Backend ライブラリ
//!
//! 稼働中のインスタンスを識別するための HTTP サービスのコアモジュール。
//! オーケストレーターや監視から、ヘルスチェックとインスタンス情報を参照する。
//!
//! ## モジュール構成
//!
//! - `app_builder`: ルーターとミドルウェアの組み立て
//! - `config`: 設定ファイルと環境変数の読み込み
//! - `error`: リクエスト処理のエラー
//! - `handler`: HTTP ハンドラ

pub mod app_builder;
pub mod config;
pub mod error;
pub mod handler;
