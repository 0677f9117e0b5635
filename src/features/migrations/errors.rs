//! スキーママイグレーションのエラー型
//!
//! マイグレーションの失敗は致命的であり、実行中のマイグレーションは
//! 全体がロールバックされます。

use crate::shared::errors::{AppError, ErrorSeverity};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// マイグレーションエラーの種類
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum MigrationErrorType {
    /// 台帳テーブルの作成や定義の直列化に失敗
    Initialization,
    /// ステップの適用（または取り消し）に失敗
    Execution,
    /// バックアップやSQLiteそのものの失敗
    System,
    /// 適用済みステップの定義が変更されている
    ChecksumMismatch,
    /// 定義の不備、存在しないコレクションへの操作
    Validation,
}

impl fmt::Display for MigrationErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationErrorType::Initialization => "初期化エラー",
            MigrationErrorType::Execution => "実行エラー",
            MigrationErrorType::System => "システムエラー",
            MigrationErrorType::ChecksumMismatch => "チェックサム不一致",
            MigrationErrorType::Validation => "検証エラー",
        };
        f.write_str(label)
    }
}

/// マイグレーションエラー
#[derive(Debug, Clone, Error, Serialize)]
#[error("[{error_type}] {message}{}{}", name_suffix(.migration_name), details_suffix(.details))]
pub struct MigrationError {
    pub error_type: MigrationErrorType,
    pub message: String,
    /// 失敗したステップ名（特定できる場合）
    pub migration_name: Option<String>,
    pub details: Option<String>,
}

fn name_suffix(name: &Option<String>) -> String {
    name.as_ref()
        .map(|n| format!(" (マイグレーション: {n})"))
        .unwrap_or_default()
}

fn details_suffix(details: &Option<String>) -> String {
    details
        .as_ref()
        .map(|d| format!(" - 詳細: {d}"))
        .unwrap_or_default()
}

impl MigrationError {
    fn new(
        error_type: MigrationErrorType,
        message: impl Into<String>,
        migration_name: Option<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            error_type,
            message: message.into(),
            migration_name,
            details,
        }
    }

    pub fn initialization(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(MigrationErrorType::Initialization, message, None, details)
    }

    /// ステップの適用失敗
    ///
    /// # 引数
    /// * `migration_name` - 失敗したステップ名
    /// * `message` - エラーメッセージ
    /// * `details` - 元のエラー内容
    pub fn execution(
        migration_name: impl Into<String>,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self::new(
            MigrationErrorType::Execution,
            message,
            Some(migration_name.into()),
            details,
        )
    }

    pub fn system(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(MigrationErrorType::System, message, None, details)
    }

    /// 台帳のチェックサムと現在の定義のチェックサムが異なる
    pub fn checksum_mismatch(migration_name: impl Into<String>, expected: &str, actual: &str) -> Self {
        let migration_name = migration_name.into();
        Self::new(
            MigrationErrorType::ChecksumMismatch,
            format!("適用済みの '{migration_name}' の定義が変更されています"),
            Some(migration_name),
            Some(format!("期待値: {expected}, 台帳: {actual}")),
        )
    }

    pub fn validation(
        message: impl Into<String>,
        migration_name: Option<String>,
        details: Option<String>,
    ) -> Self {
        Self::new(MigrationErrorType::Validation, message, migration_name, details)
    }

    /// 重要度
    ///
    /// バックアップなどのシステムエラー以外は、カタログを変更できないため致命的。
    pub fn severity(&self) -> ErrorSeverity {
        match self.error_type {
            MigrationErrorType::System => ErrorSeverity::High,
            _ => ErrorSeverity::Critical,
        }
    }

    /// ログ出力用の全文
    pub fn detailed_message(&self) -> String {
        self.to_string()
    }
}

/// MigrationErrorからAppErrorへの変換
impl From<MigrationError> for AppError {
    fn from(migration_error: MigrationError) -> Self {
        AppError::Migration(migration_error.detailed_message())
    }
}

/// rusqlite::ErrorからMigrationErrorへの変換
impl From<rusqlite::Error> for MigrationError {
    fn from(sqlite_error: rusqlite::Error) -> Self {
        MigrationError::system(
            format!("データベースエラー: {sqlite_error}"),
            Some(format!("SQLiteエラー: {sqlite_error:?}")),
        )
    }
}

/// serde_json::ErrorからMigrationErrorへの変換（チェックサム計算・定義の直列化）
impl From<serde_json::Error> for MigrationError {
    fn from(json_error: serde_json::Error) -> Self {
        MigrationError::initialization(
            format!("マイグレーション定義の直列化に失敗: {json_error}"),
            None,
        )
    }
}

/// AppErrorからMigrationErrorへの変換（カタログ操作の失敗）
impl From<AppError> for MigrationError {
    fn from(app_error: AppError) -> Self {
        match app_error {
            AppError::Validation(msg) => MigrationError::validation(msg, None, None),
            AppError::Database(msg) => MigrationError::system(msg, None),
            other => MigrationError::system(format!("予期しないエラー: {other}"), None),
        }
    }
}
