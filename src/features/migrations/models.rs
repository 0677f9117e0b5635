//! スキーママイグレーションのデータモデル
//!
//! マイグレーションは正方向（up）と逆方向（down）の操作列の組で表現され、
//! タイムスタンプ順にカタログへ適用されます。

use crate::features::schema::{AccessRules, CollectionDefinition, RuleAction, SchemaField};
use serde::Serialize;
use std::fmt;

/// ルールの部分更新
///
/// `None` は変更しない、`Some(None)` はルールを未設定に戻す、
/// `Some(Some(expr))` は式を設定することを表す。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleUpdate {
    #[serde(rename = "listRule", skip_serializing_if = "Option::is_none")]
    pub list: Option<Option<String>>,
    #[serde(rename = "viewRule", skip_serializing_if = "Option::is_none")]
    pub view: Option<Option<String>>,
    #[serde(rename = "createRule", skip_serializing_if = "Option::is_none")]
    pub create: Option<Option<String>>,
    #[serde(rename = "updateRule", skip_serializing_if = "Option::is_none")]
    pub update: Option<Option<String>>,
    #[serde(rename = "deleteRule", skip_serializing_if = "Option::is_none")]
    pub delete: Option<Option<String>>,
}

impl RuleUpdate {
    /// 5種類すべてのルールを同じ値に設定する更新
    pub fn all(rule: Option<String>) -> Self {
        Self {
            list: Some(rule.clone()),
            view: Some(rule.clone()),
            create: Some(rule.clone()),
            update: Some(rule.clone()),
            delete: Some(rule),
        }
    }

    /// 指定した操作のルールだけを設定する
    pub fn set(mut self, action: RuleAction, rule: Option<String>) -> Self {
        let slot = match action {
            RuleAction::List => &mut self.list,
            RuleAction::View => &mut self.view,
            RuleAction::Create => &mut self.create,
            RuleAction::Update => &mut self.update,
            RuleAction::Delete => &mut self.delete,
        };
        *slot = Some(rule);
        self
    }

    /// ルール集合に更新を適用する
    pub fn apply_to(&self, rules: &mut AccessRules) {
        let pairs = [
            (&self.list, &mut rules.list),
            (&self.view, &mut rules.view),
            (&self.create, &mut rules.create),
            (&self.update, &mut rules.update),
            (&self.delete, &mut rules.delete),
        ];
        for (update, target) in pairs {
            if let Some(value) = update {
                *target = value.clone();
            }
        }
    }
}

/// カタログに対する1つの変換操作
///
/// どの操作も冪等で、同じ操作を2回適用しても結果は変わらない。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum SchemaOperation {
    /// コレクションを作成（同じIDが存在する場合は定義を置き換える）
    CreateCollection(CollectionDefinition),
    /// コレクションを削除（存在しない場合は何もしない）
    DeleteCollection { collection: String },
    /// フィールドを追加、または同じIDのフィールドを置き換える
    UpsertField {
        collection: String,
        field: SchemaField,
    },
    /// フィールドを削除（存在しない場合は何もしない）
    RemoveField {
        collection: String,
        field_id: String,
    },
    /// アクセスルールを部分更新する
    SetRules {
        collection: String,
        rules: RuleUpdate,
    },
}

impl fmt::Display for SchemaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOperation::CreateCollection(definition) => {
                write!(f, "create_collection({})", definition.name)
            }
            SchemaOperation::DeleteCollection { collection } => {
                write!(f, "delete_collection({collection})")
            }
            SchemaOperation::UpsertField { collection, field } => {
                write!(f, "upsert_field({collection}.{})", field.name)
            }
            SchemaOperation::RemoveField {
                collection,
                field_id,
            } => write!(f, "remove_field({collection}.{field_id})"),
            SchemaOperation::SetRules { collection, .. } => write!(f, "set_rules({collection})"),
        }
    }
}

/// マイグレーション定義
///
/// 名前は `<UNIXタイムスタンプ>_<説明>` の形式で、タイムスタンプ順に適用される。
#[derive(Debug, Clone, Serialize)]
pub struct MigrationDefinition {
    /// マイグレーション名（一意）
    pub name: String,
    /// 作成タイムスタンプ（適用順序）
    pub timestamp: i64,
    /// マイグレーションの説明
    pub description: String,
    /// 正方向の操作列
    pub up: Vec<SchemaOperation>,
    /// 逆方向の操作列
    pub down: Vec<SchemaOperation>,
    /// 操作内容のチェックサム（SHA-256）
    pub checksum: String,
}

impl MigrationDefinition {
    /// 新しいマイグレーション定義を作成
    ///
    /// タイムスタンプは名前の先頭から取り出し、チェックサムは
    /// 操作列の正規化JSONから計算する。
    ///
    /// # 引数
    /// * `name` - マイグレーション名
    /// * `description` - 説明
    /// * `up` - 正方向の操作列
    /// * `down` - 逆方向の操作列
    pub fn new(
        name: &str,
        description: &str,
        up: Vec<SchemaOperation>,
        down: Vec<SchemaOperation>,
    ) -> Result<Self, serde_json::Error> {
        let timestamp = name
            .split('_')
            .next()
            .and_then(|prefix| prefix.parse::<i64>().ok())
            .unwrap_or(0);
        let checksum = checksum_of(&up, &down)?;

        Ok(Self {
            name: name.to_string(),
            timestamp,
            description: description.to_string(),
            up,
            down,
            checksum,
        })
    }

    /// マイグレーション定義の検証
    ///
    /// # 戻り値
    /// 有効な場合はOk(())、無効な場合はエラーメッセージ
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("マイグレーション名が空です".to_string());
        }

        if self.timestamp <= 0 || !self.name.starts_with(&format!("{}_", self.timestamp)) {
            return Err(format!(
                "マイグレーション名はタイムスタンプで始まる必要があります: '{}'",
                self.name
            ));
        }

        if self.up.is_empty() {
            return Err("正方向の操作がありません".to_string());
        }

        if self.checksum.len() != 64 || !self.checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("チェックサムが無効な形式です（64文字のSHA-256が必要）".to_string());
        }

        Ok(())
    }
}

impl fmt::Display for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Migration[{}]: {}", self.name, self.description)
    }
}

/// 操作列の正規化JSONに対するSHA-256チェックサム
pub fn checksum_of(
    up: &[SchemaOperation],
    down: &[SchemaOperation],
) -> Result<String, serde_json::Error> {
    #[derive(Serialize)]
    struct Canonical<'a> {
        up: &'a [SchemaOperation],
        down: &'a [SchemaOperation],
    }

    let canonical = serde_json::to_string(&Canonical { up, down })?;
    Ok(super::registry::MigrationRegistry::calculate_checksum(
        &canonical,
    ))
}

/// 適用済みマイグレーション
///
/// 台帳テーブルに記録された適用済みマイグレーションの情報を表します。
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    /// データベース内のID
    pub id: i64,
    /// マイグレーション名
    pub name: String,
    /// マイグレーションの説明
    pub description: Option<String>,
    /// 適用時のチェックサム
    pub checksum: String,
    /// 適用日時（UTC、RFC3339形式）
    pub applied_at: String,
    /// 実行時間（ミリ秒）
    pub execution_time_ms: Option<i64>,
}

impl AppliedMigration {
    /// チェックサムの整合性を検証
    pub fn verify_checksum(&self, expected_checksum: &str) -> bool {
        self.checksum == expected_checksum
    }
}

impl fmt::Display for AppliedMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Applied[{}] at {}", self.name, self.applied_at)
    }
}

/// マイグレーションの実行方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    Up,
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// マイグレーション実行結果
#[derive(Debug, Serialize)]
pub struct MigrationRunResult {
    /// 実行方向
    pub direction: MigrationDirection,
    /// 結果メッセージ
    pub message: String,
    /// 適用（または取り消し）したマイグレーション名一覧（実行順）
    pub migrations: Vec<String>,
    /// バックアップファイルのパス
    pub backup_path: Option<String>,
    /// 総実行時間（ミリ秒）
    pub total_execution_time_ms: i64,
}

impl MigrationRunResult {
    /// 何も実行しなかった結果を作成
    pub fn nothing_to_do(direction: MigrationDirection, message: String) -> Self {
        Self {
            direction,
            message,
            migrations: Vec::new(),
            backup_path: None,
            total_execution_time_ms: 0,
        }
    }
}

impl fmt::Display for MigrationRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}: {}件, 実行時間: {}ms)",
            self.message,
            self.direction,
            self.migrations.len(),
            self.total_execution_time_ms
        )?;
        if let Some(backup) = &self.backup_path {
            write!(f, ", バックアップ: {backup}")?;
        }
        Ok(())
    }
}

/// マイグレーション状態レポート
#[derive(Debug, Serialize)]
pub struct MigrationStatusReport {
    /// 利用可能なマイグレーション総数
    pub total_available: usize,
    /// 適用済みマイグレーション総数
    pub total_applied: usize,
    /// 未適用マイグレーション名一覧（適用順）
    pub pending_migrations: Vec<String>,
    /// 最後に適用したマイグレーション名
    pub last_applied: Option<String>,
    /// 最後のマイグレーション適用日時
    pub last_migration_date: Option<String>,
}

impl MigrationStatusReport {
    /// 未適用マイグレーションが存在するかチェック
    pub fn has_pending_migrations(&self) -> bool {
        !self.pending_migrations.is_empty()
    }

    /// マイグレーション完了率を計算
    ///
    /// # 戻り値
    /// 完了率（0.0-1.0）
    pub fn completion_rate(&self) -> f64 {
        if self.total_available == 0 {
            1.0
        } else {
            self.total_applied as f64 / self.total_available as f64
        }
    }
}

impl fmt::Display for MigrationStatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "マイグレーション状態: {}/{} 完了 ({:.1}%)",
            self.total_applied,
            self.total_available,
            self.completion_rate() * 100.0
        )?;

        if self.has_pending_migrations() {
            write!(f, ", 未適用: {}", self.pending_migrations.join(", "))?;
        }

        if let (Some(name), Some(date)) = (&self.last_applied, &self.last_migration_date) {
            write!(f, ", 最終適用: {name} ({date})")?;
        }

        Ok(())
    }
}
