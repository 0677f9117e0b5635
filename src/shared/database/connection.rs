use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::Path;

/// カタログデータベースを開き、必要なテーブルを作成する
///
/// # 引数
/// * `path` - データベースファイルのパス
///
/// # 処理内容
/// 1. 親ディレクトリの確保
/// 2. データベース接続の開設
/// 3. カタログ・台帳テーブルの作成
pub fn open_catalog(path: &Path) -> AppResult<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::configuration(format!("カタログディレクトリの作成に失敗: {e}"))
            })?;
            log::info!("カタログディレクトリを作成: {}", parent.display());
        }
    }

    let conn = Connection::open(path)?;
    create_tables(&conn)?;

    log::info!("カタログデータベースを初期化しました: {}", path.display());
    Ok(conn)
}

/// メモリ上のカタログデータベースを開く（テスト・ドライラン用）
pub fn open_in_memory_catalog() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(conn)
}

/// カタログテーブルとマイグレーション台帳テーブルを作成する
///
/// 既に存在する場合は何もしない。
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _collections (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL UNIQUE,
            definition TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            checksum TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            execution_time_ms INTEGER
        );",
    )?;
    Ok(())
}

/// SQLiteのバックアップAPIでカタログを複製する
///
/// # 引数
/// * `conn` - 複製元の接続
/// * `backup_path` - 複製先のファイルパス
pub fn create_backup(conn: &Connection, backup_path: &Path) -> AppResult<()> {
    let mut backup_conn = Connection::open(backup_path)?;

    let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)?;
    backup.run_to_completion(5, std::time::Duration::from_millis(250), None)?;

    log::info!("カタログのバックアップを作成しました: {}", backup_path.display());
    Ok(())
}
