//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ヘルスチェックは [`phasor_shared::health`] が提供するため、ここには置かない。
//!
//! ## ハンドラ一覧
//!
//! - `instance`: インスタンス情報（バージョン、ホスト名、稼働時間）

pub mod instance;

pub use instance::{
    HostnameResolver,
    InstanceInfoResponse,
    InstanceRegistry,
    get_instance_info,
    system_hostname,
};
