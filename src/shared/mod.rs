/// 共有エラー型とエラーハンドリング
pub mod errors;

/// 共有カタログデータベース接続管理
pub mod database;

/// 共有設定管理
pub mod config;

/// バックエンドAPIクライアント
pub mod api_client;

/// 共有ユーティリティ関数
pub mod utils;

// 便利な再エクスポート
pub use api_client::{ApiClient, ApiClientConfig};
pub use config::{initialize_logging_system, load_environment_variables, Environment};
pub use errors::{AppError, AppResult, ErrorSeverity};
