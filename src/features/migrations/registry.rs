//! マイグレーション登録管理
//!
//! ステップはタイムスタンプをキーに保持し、常にタイムスタンプ順で取り出されます。

use super::definitions;
use super::errors::MigrationError;
use super::models::MigrationDefinition;
use sha2::{Digest, Sha256};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// マイグレーション登録管理
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    by_timestamp: BTreeMap<i64, MigrationDefinition>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// ステップを登録する
    ///
    /// 定義が不正な場合、名前またはタイムスタンプが既存のステップと重なる場合はエラー。
    pub fn register(&mut self, migration: MigrationDefinition) -> Result<(), MigrationError> {
        if let Err(msg) = migration.validate() {
            return Err(MigrationError::validation(
                format!("マイグレーション定義が無効です: {msg}"),
                Some(migration.name),
                None,
            ));
        }

        if self.find_migration(&migration.name).is_some() {
            return Err(MigrationError::validation(
                "同じ名前のステップが既に登録されています",
                Some(migration.name),
                None,
            ));
        }

        match self.by_timestamp.entry(migration.timestamp) {
            Entry::Occupied(existing) => Err(MigrationError::validation(
                format!(
                    "タイムスタンプ {} は '{}' と重複しています",
                    existing.key(),
                    existing.get().name
                ),
                Some(migration.name),
                None,
            )),
            Entry::Vacant(slot) => {
                log::debug!("マイグレーションを登録: {}", migration.name);
                slot.insert(migration);
                Ok(())
            }
        }
    }

    /// 登録済みのステップ（タイムスタンプ順）
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MigrationDefinition> + '_ {
        self.by_timestamp.values()
    }

    pub fn find_migration(&self, name: &str) -> Option<&MigrationDefinition> {
        self.iter().find(|m| m.name == name)
    }

    pub fn count(&self) -> usize {
        self.by_timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_timestamp.is_empty()
    }

    pub fn get_migration_names(&self) -> Vec<String> {
        self.iter().map(|m| m.name.clone()).collect()
    }

    /// SHA-256（16進小文字64文字）
    pub fn calculate_checksum(content: &str) -> String {
        format!("{:x}", Sha256::digest(content.as_bytes()))
    }

    /// 経費管理スキーマの全ステップを登録したレジストリ
    pub fn register_default_migrations() -> Result<Self, MigrationError> {
        let mut registry = Self::new();
        for migration in definitions::all_migrations()? {
            registry.register(migration)?;
        }
        Ok(registry)
    }
}
