//! マイグレーション機能モジュール
//!
//! このモジュールは、コレクションカタログのスキーママイグレーション、
//! 実行前バックアップ、適用台帳による冪等な再実行、状態確認を提供します。

pub mod definitions;
pub mod errors;
pub mod executor;
pub mod models;
pub mod registry;
pub mod service;
pub mod table;


// 公開インターフェース
pub use definitions::{
    owner_or_admin_rule, owner_rule, CUSTOMERS_COLLECTION_ID, EXPENSES_COLLECTION_ID,
    EXPENSE_TYPES_COLLECTION_ID, PICTURE_MAX_SIZE,
};
pub use errors::{MigrationError, MigrationErrorType};
pub use executor::MigrationExecutor;
pub use models::{
    AppliedMigration, MigrationDefinition, MigrationDirection, MigrationRunResult,
    MigrationStatusReport, RuleUpdate, SchemaOperation,
};
pub use registry::MigrationRegistry;
pub use service::{MigrationService, RevertScope};
pub use table::MigrationTable;
