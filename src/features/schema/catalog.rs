//! コレクションカタログ
//!
//! SQLiteに保存されたコレクション定義の読み書きを行います。
//! マイグレーションはこのDAOを通してのみカタログを変更します。

use super::models::CollectionDefinition;
use crate::shared::errors::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};

/// カタログDAO
pub struct CatalogDao<'a> {
    conn: &'a Connection,
}

impl<'a> CatalogDao<'a> {
    /// 接続（またはトランザクション）からDAOを作成
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 名前またはIDでコレクションを検索
    pub fn find_collection_by_name_or_id(
        &self,
        name_or_id: &str,
    ) -> AppResult<Option<CollectionDefinition>> {
        let definition: Option<String> = self
            .conn
            .query_row(
                "SELECT definition FROM _collections WHERE id = ?1 OR name = ?1 LIMIT 1",
                params![name_or_id],
                |row| row.get(0),
            )
            .optional()?;

        definition
            .map(|json| serde_json::from_str(&json).map_err(AppError::from))
            .transpose()
    }

    /// 名前またはIDでコレクションを取得（存在しない場合はエラー）
    pub fn require_collection(&self, name_or_id: &str) -> AppResult<CollectionDefinition> {
        self.find_collection_by_name_or_id(name_or_id)?
            .ok_or_else(|| AppError::not_found(format!("コレクション '{name_or_id}'")))
    }

    /// コレクションを保存（同じIDがあれば置き換え）
    ///
    /// 保存前に定義の妥当性とリレーション先の存在を検証する。
    pub fn save_collection(&self, collection: &CollectionDefinition) -> AppResult<()> {
        collection.validate().map_err(AppError::validation)?;

        let clash: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM _collections WHERE name = ?1 AND id != ?2",
                params![collection.name, collection.id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(other_id) = clash {
            return Err(AppError::validation(format!(
                "コレクション名 '{}' は既に {other_id} で使用されています",
                collection.name
            )));
        }

        for field in &collection.schema {
            if let Some(target) = field.relation_target() {
                if target != collection.id && !self.exists(target)? {
                    return Err(AppError::validation(format!(
                        "フィールド '{}' のリレーション先コレクション '{target}' が存在しません",
                        field.name
                    )));
                }
            }
        }

        let json = serde_json::to_string(collection)?;
        self.conn.execute(
            "INSERT INTO _collections (id, name, definition) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, definition = excluded.definition",
            params![collection.id, collection.name, json],
        )?;

        log::debug!("コレクションを保存しました: {collection}");
        Ok(())
    }

    /// コレクションを削除
    ///
    /// 他のコレクションからリレーションで参照されている場合は削除できない。
    /// 存在しない場合は何もしない。
    pub fn delete_collection(&self, name_or_id: &str) -> AppResult<()> {
        let Some(target) = self.find_collection_by_name_or_id(name_or_id)? else {
            log::debug!("削除対象のコレクションが存在しません: {name_or_id}");
            return Ok(());
        };

        let referencing: Vec<String> = self
            .list_collections()?
            .into_iter()
            .filter(|c| c.id != target.id)
            .filter(|c| {
                c.schema
                    .iter()
                    .any(|f| f.relation_target() == Some(target.id.as_str()))
            })
            .map(|c| c.name)
            .collect();
        if !referencing.is_empty() {
            return Err(AppError::validation(format!(
                "コレクション '{}' は {} から参照されているため削除できません",
                target.name,
                referencing.join(", ")
            )));
        }

        self.conn
            .execute("DELETE FROM _collections WHERE id = ?1", params![target.id])?;
        log::debug!("コレクションを削除しました: {target}");
        Ok(())
    }

    /// 全コレクションをID順で取得
    pub fn list_collections(&self) -> AppResult<Vec<CollectionDefinition>> {
        let mut stmt = self
            .conn
            .prepare("SELECT definition FROM _collections ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut collections = Vec::new();
        for row in rows {
            collections.push(serde_json::from_str(&row?)?);
        }
        Ok(collections)
    }

    /// カタログ全体の正規化スナップショット（JSON文字列）
    ///
    /// 同じ状態からは常に同じバイト列が得られる。
    pub fn snapshot(&self) -> AppResult<String> {
        let collections = self.list_collections()?;
        Ok(serde_json::to_string_pretty(&collections)?)
    }

    fn exists(&self, id: &str) -> AppResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM _collections WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
