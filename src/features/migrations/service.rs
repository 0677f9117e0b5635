//! マイグレーションサービス
//!
//! レジストリ・実行管理・台帳を組み合わせ、未適用マイグレーションの適用、
//! 適用済みマイグレーションの取り消し、状態確認を提供します。
//! 1回の実行は1つのトランザクションで行われ、途中で失敗した場合は
//! 全体がロールバックされます。

use super::errors::MigrationError;
use super::executor::MigrationExecutor;
use super::models::{
    AppliedMigration, MigrationDefinition, MigrationDirection, MigrationRunResult,
    MigrationStatusReport,
};
use super::registry::MigrationRegistry;
use super::table::MigrationTable;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

/// 取り消し対象の範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertScope {
    /// 最後に適用したものから指定数だけ取り消す
    Steps(usize),
    /// 全て取り消す
    All,
}

/// マイグレーションサービス
pub struct MigrationService {
    /// マイグレーション登録管理
    registry: MigrationRegistry,
    /// マイグレーション実行管理
    executor: MigrationExecutor,
    /// バックアップの保存先（Noneの場合はバックアップしない）
    backup_dir: Option<PathBuf>,
}

impl MigrationService {
    /// 経費管理スキーマの全マイグレーションを登録したサービスを作成
    pub fn new() -> Result<Self, MigrationError> {
        Ok(Self::with_registry(
            MigrationRegistry::register_default_migrations()?,
        ))
    }

    /// 任意のレジストリからサービスを作成
    pub fn with_registry(registry: MigrationRegistry) -> Self {
        Self {
            registry,
            executor: MigrationExecutor::new(),
            backup_dir: None,
        }
    }

    /// 実行前バックアップの保存先を設定
    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(backup_dir.into());
        self
    }

    /// 登録済みマイグレーション
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// 未適用のマイグレーションをタイムスタンプ順に適用
    ///
    /// 適用済みのマイグレーションは再実行しない。適用済みのもののチェックサムが
    /// 現在の定義と一致しない場合は何も適用せずにエラーを返す。
    ///
    /// # 引数
    /// * `conn` - カタログデータベース接続
    ///
    /// # 戻り値
    /// 実行結果
    pub fn run_pending(&self, conn: &mut Connection) -> Result<MigrationRunResult, MigrationError> {
        let start_time = Instant::now();
        MigrationTable::initialize(conn)?;

        let applied = MigrationTable::get_applied_migrations(conn)?;
        self.verify_checksums(&applied)?;

        let applied_names: HashSet<&str> = applied.iter().map(|m| m.name.as_str()).collect();
        let pending: Vec<&MigrationDefinition> = self
            .registry
            .iter()
            .filter(|m| !applied_names.contains(m.name.as_str()))
            .collect();

        if pending.is_empty() {
            log::info!("未適用のマイグレーションはありません");
            return Ok(MigrationRunResult::nothing_to_do(
                MigrationDirection::Up,
                "カタログは最新です".to_string(),
            ));
        }

        log::info!("{}件のマイグレーションを適用します", pending.len());
        self.run_in_transaction(conn, &pending, MigrationDirection::Up, start_time)
    }

    /// 適用済みのマイグレーションを新しい順に取り消す
    ///
    /// # 引数
    /// * `conn` - カタログデータベース接続
    /// * `scope` - 取り消す範囲
    pub fn revert(
        &self,
        conn: &mut Connection,
        scope: RevertScope,
    ) -> Result<MigrationRunResult, MigrationError> {
        let start_time = Instant::now();
        MigrationTable::initialize(conn)?;

        let applied = MigrationTable::get_applied_migrations(conn)?;
        self.verify_checksums(&applied)?;

        let mut targets = Vec::new();
        for record in &applied {
            let migration = self.registry.find_migration(&record.name).ok_or_else(|| {
                MigrationError::validation(
                    "定義が存在しないマイグレーションは取り消せません".to_string(),
                    Some(record.name.clone()),
                    None,
                )
            })?;
            targets.push(migration);
        }
        targets.sort_by_key(|m| std::cmp::Reverse(m.timestamp));

        let limit = match scope {
            RevertScope::Steps(steps) => steps,
            RevertScope::All => targets.len(),
        };
        targets.truncate(limit);

        if targets.is_empty() {
            log::info!("取り消すマイグレーションはありません");
            return Ok(MigrationRunResult::nothing_to_do(
                MigrationDirection::Down,
                "取り消し対象はありません".to_string(),
            ));
        }

        log::info!("{}件のマイグレーションを取り消します", targets.len());
        self.run_in_transaction(conn, &targets, MigrationDirection::Down, start_time)
    }

    /// マイグレーション状態の確認
    pub fn status(&self, conn: &Connection) -> Result<MigrationStatusReport, MigrationError> {
        MigrationTable::initialize(conn)?;
        let applied = MigrationTable::get_applied_migrations(conn)?;
        let applied_names: HashSet<&str> = applied.iter().map(|m| m.name.as_str()).collect();

        let pending_migrations = self
            .registry
            .iter()
            .filter(|m| !applied_names.contains(m.name.as_str()))
            .map(|m| m.name.clone())
            .collect();
        let last = applied.last();

        Ok(MigrationStatusReport {
            total_available: self.registry.count(),
            total_applied: applied.len(),
            pending_migrations,
            last_applied: last.map(|m| m.name.clone()),
            last_migration_date: last.map(|m| m.applied_at.clone()),
        })
    }

    fn verify_checksums(&self, applied: &[AppliedMigration]) -> Result<(), MigrationError> {
        for record in applied {
            match self.registry.find_migration(&record.name) {
                Some(migration) if !record.verify_checksum(&migration.checksum) => {
                    let error = MigrationError::checksum_mismatch(
                        &record.name,
                        &migration.checksum,
                        &record.checksum,
                    );
                    log::error!("{}", error.detailed_message());
                    return Err(error);
                }
                Some(_) => {}
                None => log::warn!("台帳に未知のマイグレーションがあります: {}", record.name),
            }
        }
        Ok(())
    }

    fn run_in_transaction(
        &self,
        conn: &mut Connection,
        migrations: &[&MigrationDefinition],
        direction: MigrationDirection,
        start_time: Instant,
    ) -> Result<MigrationRunResult, MigrationError> {
        let backup_path = match &self.backup_dir {
            Some(dir) => Some(self.executor.create_backup(conn, dir)?),
            None => None,
        };

        let tx = conn.transaction()?;
        for migration in migrations {
            if let Err(e) = self.executor.execute_migration(&tx, migration, direction) {
                // txのドロップでロールバックされる
                match &backup_path {
                    Some(path) => log::error!(
                        "マイグレーションを中断しロールバックしました。バックアップファイル: {}",
                        path.display()
                    ),
                    None => log::error!("マイグレーションを中断しロールバックしました"),
                }
                return Err(e);
            }
        }
        tx.commit()?;

        let names: Vec<String> = migrations.iter().map(|m| m.name.clone()).collect();
        let total_execution_time_ms = start_time.elapsed().as_millis() as i64;
        let message = match direction {
            MigrationDirection::Up => format!("{}件のマイグレーションを適用しました", names.len()),
            MigrationDirection::Down => {
                format!("{}件のマイグレーションを取り消しました", names.len())
            }
        };
        log::info!("{message} (実行時間: {total_execution_time_ms}ms)");

        Ok(MigrationRunResult {
            direction,
            message,
            migrations: names,
            backup_path: backup_path.map(|p| p.display().to_string()),
            total_execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::migrations::errors::MigrationErrorType;
    use crate::features::migrations::models::{RuleUpdate, SchemaOperation};
    use crate::features::schema::CatalogDao;
    use crate::shared::database::open_in_memory_catalog;

    fn snapshot(conn: &Connection) -> String {
        CatalogDao::new(conn).snapshot().unwrap()
    }

    #[test]
    fn test_run_pending_applies_all_then_is_noop() {
        let mut conn = open_in_memory_catalog().unwrap();
        let service = MigrationService::new().unwrap();

        let result = service.run_pending(&mut conn).unwrap();
        assert_eq!(result.migrations.len(), 8);
        assert_eq!(result.direction, MigrationDirection::Up);
        let after_first = snapshot(&conn);

        let second = service.run_pending(&mut conn).unwrap();
        assert!(second.migrations.is_empty());
        assert_eq!(after_first, snapshot(&conn));

        let status = service.status(&conn).unwrap();
        assert!(!status.has_pending_migrations());
        assert_eq!(
            status.last_applied.as_deref(),
            Some("1719742711_updated_expenses")
        );
    }

    #[test]
    fn test_revert_steps_and_all() {
        let mut conn = open_in_memory_catalog().unwrap();
        let empty = snapshot(&conn);
        let service = MigrationService::new().unwrap();
        service.run_pending(&mut conn).unwrap();

        let reverted = service.revert(&mut conn, RevertScope::Steps(2)).unwrap();
        assert_eq!(
            reverted.migrations,
            vec!["1719742711_updated_expenses", "1719665960_updated_expenses"]
        );
        let status = service.status(&conn).unwrap();
        assert_eq!(status.pending_migrations.len(), 2);

        service.revert(&mut conn, RevertScope::All).unwrap();
        assert_eq!(empty, snapshot(&conn));
        assert_eq!(service.status(&conn).unwrap().total_applied, 0);

        let nothing = service.revert(&mut conn, RevertScope::All).unwrap();
        assert!(nothing.migrations.is_empty());
    }

    #[test]
    fn test_failure_rolls_back_entire_run() {
        let mut registry = MigrationRegistry::register_default_migrations().unwrap();
        registry
            .register(
                MigrationDefinition::new(
                    "1800000000_broken",
                    "存在しないコレクションを変更",
                    vec![SchemaOperation::SetRules {
                        collection: "invoices".to_string(),
                        rules: RuleUpdate::all(None),
                    }],
                    vec![],
                )
                .unwrap(),
            )
            .unwrap();
        let service = MigrationService::with_registry(registry);

        let mut conn = open_in_memory_catalog().unwrap();
        let empty = snapshot(&conn);
        let error = service.run_pending(&mut conn).unwrap_err();

        assert_eq!(error.error_type, MigrationErrorType::Execution);
        assert_eq!(error.migration_name.as_deref(), Some("1800000000_broken"));
        assert_eq!(empty, snapshot(&conn));
        assert_eq!(service.status(&conn).unwrap().total_applied, 0);
    }

    #[test]
    fn test_checksum_mismatch_is_fatal() {
        let mut conn = open_in_memory_catalog().unwrap();
        let service = MigrationService::new().unwrap();
        service.run_pending(&mut conn).unwrap();

        conn.execute(
            "UPDATE _migrations SET checksum = ?1 WHERE name = '1719663118_created_customers'",
            [&"0".repeat(64)],
        )
        .unwrap();

        let error = service.run_pending(&mut conn).unwrap_err();
        assert_eq!(error.error_type, MigrationErrorType::ChecksumMismatch);
        assert!(service.revert(&mut conn, RevertScope::All).is_err());
    }

    #[test]
    fn test_backup_created_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open_in_memory_catalog().unwrap();
        let service = MigrationService::new()
            .unwrap()
            .with_backup_dir(dir.path());

        let result = service.run_pending(&mut conn).unwrap();
        let backup = result.backup_path.unwrap();
        assert!(std::path::Path::new(&backup).exists());
    }
}
