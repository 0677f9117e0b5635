//! スキーマ機能モジュール
//!
//! コレクション定義、アクセスルール式、カタログ永続化を提供します。

pub mod catalog;
pub mod models;
pub mod rules;

pub use catalog::CatalogDao;
pub use models::{
    AccessRules, CollectionDefinition, CollectionType, DateOptions, FieldKind, FileOptions,
    NumberOptions, RelationOptions, RuleAction, SchemaField, TextOptions, USERS_COLLECTION_ID,
};
pub use rules::{parse_rule, AccessRule, CompareOp, Operand, RuleExpr};
