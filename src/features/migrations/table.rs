//! マイグレーション台帳（_migrationsテーブル）管理
//!
//! 適用済みマイグレーションの記録・取得・削除を行います。

use super::errors::MigrationError;
use super::models::AppliedMigration;
use crate::shared::database::create_tables;
use rusqlite::{params, Connection, OptionalExtension};

/// マイグレーション台帳
pub struct MigrationTable;

impl MigrationTable {
    /// 台帳テーブルを初期化（既に存在する場合は何もしない）
    pub fn initialize(conn: &Connection) -> Result<(), MigrationError> {
        create_tables(conn).map_err(|e| {
            MigrationError::initialization(
                "マイグレーション台帳の初期化に失敗しました".to_string(),
                Some(e.to_string()),
            )
        })
    }

    /// 適用済みマイグレーション一覧を取得（適用順）
    pub fn get_applied_migrations(
        conn: &Connection,
    ) -> Result<Vec<AppliedMigration>, MigrationError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, description, checksum, applied_at, execution_time_ms
             FROM _migrations ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AppliedMigration {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                checksum: row.get(3)?,
                applied_at: row.get(4)?,
                execution_time_ms: row.get(5)?,
            })
        })?;

        let mut applied = Vec::new();
        for row in rows {
            applied.push(row?);
        }
        Ok(applied)
    }

    /// マイグレーション実行記録を保存
    pub fn record_migration(
        conn: &Connection,
        name: &str,
        description: Option<&str>,
        checksum: &str,
        applied_at: &str,
        execution_time_ms: Option<i64>,
    ) -> Result<(), MigrationError> {
        conn.execute(
            "INSERT INTO _migrations (name, description, checksum, applied_at, execution_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, description, checksum, applied_at, execution_time_ms],
        )?;
        Ok(())
    }

    /// マイグレーション実行記録を削除（逆方向の適用時）
    pub fn remove_migration(conn: &Connection, name: &str) -> Result<(), MigrationError> {
        conn.execute("DELETE FROM _migrations WHERE name = ?1", params![name])?;
        Ok(())
    }

    /// マイグレーションが適用済みかチェック
    pub fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool, MigrationError> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM _migrations WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_remove() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationTable::initialize(&conn).unwrap();
        MigrationTable::initialize(&conn).unwrap();

        MigrationTable::record_migration(
            &conn,
            "1719663118_created_customers",
            Some("customers"),
            &"a".repeat(64),
            "2024-06-29T12:00:00+00:00",
            Some(3),
        )
        .unwrap();

        assert!(MigrationTable::is_migration_applied(&conn, "1719663118_created_customers").unwrap());
        let applied = MigrationTable::get_applied_migrations(&conn).unwrap();
        assert_eq!(applied.len(), 1);
        assert!(applied[0].verify_checksum(&"a".repeat(64)));
        assert_eq!(applied[0].execution_time_ms, Some(3));

        MigrationTable::remove_migration(&conn, "1719663118_created_customers").unwrap();
        assert!(!MigrationTable::is_migration_applied(&conn, "1719663118_created_customers").unwrap());
    }

    #[test]
    fn test_duplicate_record_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationTable::initialize(&conn).unwrap();
        let record = |conn: &Connection| {
            MigrationTable::record_migration(conn, "m", None, "c", "now", None)
        };
        record(&conn).unwrap();
        assert!(record(&conn).is_err());
    }
}
