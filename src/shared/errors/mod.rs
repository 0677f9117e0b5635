use thiserror::Error;

/// クレート共通のエラー型
///
/// バックエンドのHTTPエラーは `api_client::error_from_response` でこの型に変換される。
#[derive(Debug, Error)]
pub enum AppError {
    /// カタログ（SQLite）の読み書きに失敗
    #[error("データベースエラー: {0}")]
    Database(String),

    /// 入力またはバックエンドの検証エラー（400）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// レコードやコレクションが存在しない（404）
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 未ログイン・トークン期限切れ・権限不足（401/403）
    #[error("認証エラー: {0}")]
    Authentication(String),

    /// バックエンドへの接続失敗、またはその他のHTTPエラー
    #[error("外部サービスエラー: {0}")]
    ExternalService(String),

    #[error("設定エラー: {0}")]
    Configuration(String),

    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    /// スキーママイグレーションの失敗（詳細は `MigrationError` 側に記録される）
    #[error("マイグレーションエラー: {0}")]
    Migration(String),
}

/// エラーの重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    /// CLIに表示するメッセージ
    ///
    /// 検証エラーと未検出エラーはバックエンドのメッセージをそのまま返す。
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) => msg,
            AppError::Authentication(_) => "認証に失敗しました。再度ログインしてください",
            AppError::ExternalService(_) => "バックエンドとの通信でエラーが発生しました",
            AppError::Database(_) => "カタログデータベースの操作でエラーが発生しました",
            AppError::Configuration(msg) => msg,
            AppError::Io(_) => "ファイル操作でエラーが発生しました",
            AppError::Json(_) => "データ形式の解析でエラーが発生しました",
            AppError::Migration(_) => "スキーマの移行に失敗しました",
        }
    }

    /// 重要度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Validation(_) | AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::Authentication(_)
            | AppError::ExternalService(_)
            | AppError::Io(_)
            | AppError::Json(_) => ErrorSeverity::Medium,
            AppError::Database(_) | AppError::Configuration(_) => ErrorSeverity::High,
            AppError::Migration(_) => ErrorSeverity::Critical,
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// # 引数
    /// * `resource` - 見つからなかったもの（例: `コレクション 'expenses'`）
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    pub fn authentication<S: Into<String>>(message: S) -> Self {
        AppError::Authentication(message.into())
    }

    /// # 引数
    /// * `service` - 接続先の名前
    /// * `message` - エラーメッセージ
    pub fn external_service<S: Into<String>>(service: S, message: S) -> Self {
        AppError::ExternalService(format!("{}: {}", service.into(), message.into()))
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        AppError::Database(error.to_string())
    }
}

/// トランスポート層の失敗（HTTPステータスによるエラーは含まない）
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalService(format!("HTTP通信エラー: {error}"))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_kind() {
        assert_eq!(AppError::validation("金額").severity(), ErrorSeverity::Low);
        assert_eq!(AppError::not_found("経費").severity(), ErrorSeverity::Low);
        assert_eq!(
            AppError::external_service("PocketBase", "接続失敗").severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(
            AppError::configuration("APP_ORIGIN がありません").severity(),
            ErrorSeverity::High
        );
        assert_eq!(
            AppError::Migration("失敗".to_string()).severity(),
            ErrorSeverity::Critical
        );
        assert!(ErrorSeverity::Critical > ErrorSeverity::Medium);
    }

    #[test]
    fn test_backend_messages_pass_through() {
        assert_eq!(
            AppError::validation("amount: Must be a number.").user_message(),
            "amount: Must be a number."
        );
        assert_eq!(
            AppError::not_found("経費").user_message(),
            "経費が見つかりません"
        );
        assert_eq!(
            AppError::authentication("token expired").user_message(),
            "認証に失敗しました。再度ログインしてください"
        );
    }

    #[test]
    fn test_rusqlite_conversion() {
        let error: AppError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(error, AppError::Database(_)));
        assert!(error.to_string().starts_with("データベースエラー"));
    }
}
