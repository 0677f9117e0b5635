//! マイグレーション実行管理
//!
//! このモジュールは、操作列のカタログへの適用とバックアップ作成を行います。
//! トランザクションの開始・確定は呼び出し側（サービス）が行います。

use super::errors::MigrationError;
use super::models::{MigrationDefinition, MigrationDirection, SchemaOperation};
use super::table::MigrationTable;
use crate::features::schema::CatalogDao;
use crate::shared::database::create_backup;
use chrono::Utc;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// マイグレーション実行管理
pub struct MigrationExecutor;

impl MigrationExecutor {
    /// 新しいマイグレーション実行管理を作成
    pub fn new() -> Self {
        Self
    }

    /// マイグレーションを一方向に実行し、台帳を更新する
    ///
    /// # 引数
    /// * `conn` - データベース接続（通常はトランザクション）
    /// * `migration` - マイグレーション定義
    /// * `direction` - 実行方向
    ///
    /// # 戻り値
    /// 実行時間（ミリ秒）
    pub fn execute_migration(
        &self,
        conn: &Connection,
        migration: &MigrationDefinition,
        direction: MigrationDirection,
    ) -> Result<i64, MigrationError> {
        let start_time = Instant::now();
        log::info!(
            "マイグレーション '{}' ({direction}) の実行を開始します",
            migration.name
        );

        let operations = match direction {
            MigrationDirection::Up => &migration.up,
            MigrationDirection::Down => &migration.down,
        };

        self.apply_operations(conn, operations).map_err(|e| {
            log::error!("マイグレーション実行エラー: {}", e.detailed_message());
            MigrationError::execution(
                migration.name.clone(),
                format!("{direction} 方向の適用に失敗しました"),
                Some(e.detailed_message()),
            )
        })?;

        let execution_time = start_time.elapsed().as_millis() as i64;
        match direction {
            MigrationDirection::Up => MigrationTable::record_migration(
                conn,
                &migration.name,
                Some(&migration.description),
                &migration.checksum,
                &Utc::now().to_rfc3339(),
                Some(execution_time),
            )?,
            MigrationDirection::Down => MigrationTable::remove_migration(conn, &migration.name)?,
        }

        log::info!(
            "マイグレーション '{}' ({direction}) が完了しました (実行時間: {execution_time}ms)",
            migration.name
        );
        Ok(execution_time)
    }

    /// 操作列を順に適用する
    pub fn apply_operations(
        &self,
        conn: &Connection,
        operations: &[SchemaOperation],
    ) -> Result<(), MigrationError> {
        let dao = CatalogDao::new(conn);

        for operation in operations {
            log::debug!("操作を適用: {operation}");
            match operation {
                SchemaOperation::CreateCollection(definition) => {
                    dao.save_collection(definition)?;
                }
                SchemaOperation::DeleteCollection { collection } => {
                    dao.delete_collection(collection)?;
                }
                SchemaOperation::UpsertField { collection, field } => {
                    let mut definition = self.require(&dao, collection)?;
                    definition.upsert_field(field.clone());
                    dao.save_collection(&definition)?;
                }
                SchemaOperation::RemoveField {
                    collection,
                    field_id,
                } => {
                    let mut definition = self.require(&dao, collection)?;
                    if definition.remove_field(field_id) {
                        dao.save_collection(&definition)?;
                    }
                }
                SchemaOperation::SetRules { collection, rules } => {
                    let mut definition = self.require(&dao, collection)?;
                    rules.apply_to(&mut definition.rules);
                    dao.save_collection(&definition)?;
                }
            }
        }

        Ok(())
    }

    /// タイムスタンプ付きのバックアップファイルを作成
    ///
    /// # 引数
    /// * `conn` - データベース接続
    /// * `backup_dir` - バックアップの保存先ディレクトリ
    ///
    /// # 戻り値
    /// バックアップファイルのパス
    pub fn create_backup(
        &self,
        conn: &Connection,
        backup_dir: &Path,
    ) -> Result<PathBuf, MigrationError> {
        let backup_path = backup_dir.join(format!(
            "catalog_backup_{}.db",
            Utc::now().format("%Y%m%d%H%M%S%3f")
        ));

        log::info!("カタログのバックアップを作成中: {}", backup_path.display());

        std::fs::create_dir_all(backup_dir).map_err(|e| {
            MigrationError::system(
                format!("バックアップディレクトリの作成に失敗しました: {e}"),
                Some(backup_dir.display().to_string()),
            )
        })?;

        create_backup(conn, &backup_path).map_err(|e| {
            let error_msg = format!("バックアップ作成に失敗しました: {e}");
            log::error!("{error_msg}");
            MigrationError::system(error_msg, Some(backup_path.display().to_string()))
        })?;

        Ok(backup_path)
    }

    fn require(
        &self,
        dao: &CatalogDao<'_>,
        collection: &str,
    ) -> Result<crate::features::schema::CollectionDefinition, MigrationError> {
        dao.find_collection_by_name_or_id(collection)?.ok_or_else(|| {
            MigrationError::validation(
                format!("コレクション '{collection}' が存在しません"),
                None,
                None,
            )
        })
    }
}

impl Default for MigrationExecutor {
    fn default() -> Self {
        Self::new()
    }
}
