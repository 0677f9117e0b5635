//! 経費管理スキーマのマイグレーション定義
//!
//! 各ステップは正方向と、その効果を正確に打ち消す逆方向の操作列を持つ。

use super::errors::MigrationError;
use super::models::{MigrationDefinition, RuleUpdate, SchemaOperation};
use crate::features::schema::{
    AccessRules, CollectionDefinition, CollectionType, DateOptions, FieldKind, FileOptions,
    NumberOptions, RelationOptions, RuleAction, RuleExpr, SchemaField, TextOptions,
    USERS_COLLECTION_ID,
};

pub const CUSTOMERS_COLLECTION_ID: &str = "7huq9rbs25jyrwv";
pub const EXPENSE_TYPES_COLLECTION_ID: &str = "7xzqxa4a17wgr05";
pub const EXPENSES_COLLECTION_ID: &str = "frv5fa0d678jb4c";

/// 経費画像の最大サイズ（10 MiB）
pub const PICTURE_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// アバター画像の最大サイズ（5 MiB）
const AVATAR_MAX_SIZE: u64 = 5 * 1024 * 1024;

const USER_FIELD_ID: &str = "0zt4dfjy";
const PICTURE_FIELD_ID: &str = "b5otabmc";

/// 所有者のみ: `@request.auth.id != "" && @request.auth.id = user.id`
pub fn owner_rule() -> String {
    RuleExpr::authenticated()
        .and(RuleExpr::requester_owns("user"))
        .to_string()
}

/// 所有者または管理者:
/// `@request.auth.id != "" && (@request.auth.id = user.id || @request.auth.role = "admin")`
pub fn owner_or_admin_rule() -> String {
    RuleExpr::authenticated()
        .and(RuleExpr::requester_owns("user").or(RuleExpr::requester_has_role("admin")))
        .to_string()
}

/// 全マイグレーションを作成（タイムスタンプ順）
pub fn all_migrations() -> Result<Vec<MigrationDefinition>, MigrationError> {
    Ok(vec![
        init_users()?,
        created_customers()?,
        created_expense_types()?,
        created_expenses()?,
        added_expense_owner()?,
        restricted_expenses_to_owner()?,
        relaxed_expense_picture()?,
        opened_expense_reads_to_admins()?,
    ])
}

fn text_field(id: &str, name: &str) -> SchemaField {
    SchemaField::new(id, name, false, FieldKind::Text(TextOptions::default()))
}

fn base_collection(
    id: &str,
    name: &str,
    timestamp: &str,
    schema: Vec<SchemaField>,
) -> CollectionDefinition {
    CollectionDefinition {
        id: id.to_string(),
        created: timestamp.to_string(),
        updated: timestamp.to_string(),
        name: name.to_string(),
        collection_type: CollectionType::Base,
        system: false,
        schema,
        indexes: Vec::new(),
        rules: AccessRules::default(),
        options: serde_json::Map::new(),
    }
}

fn picture_field(required: bool) -> SchemaField {
    SchemaField::new(
        PICTURE_FIELD_ID,
        "picture",
        required,
        FieldKind::File(FileOptions {
            mime_types: Vec::new(),
            thumbs: Vec::new(),
            max_select: 1,
            max_size: PICTURE_MAX_SIZE,
            protected: false,
        }),
    )
}

fn init_users() -> Result<MigrationDefinition, MigrationError> {
    let self_only = Some("id = @request.auth.id".to_string());
    let mut options = serde_json::Map::new();
    options.insert("allowEmailAuth".to_string(), true.into());
    options.insert("allowOAuth2Auth".to_string(), true.into());
    options.insert("allowUsernameAuth".to_string(), true.into());
    options.insert("minPasswordLength".to_string(), 8.into());
    options.insert("requireEmail".to_string(), false.into());

    let users = CollectionDefinition {
        id: USERS_COLLECTION_ID.to_string(),
        created: "2024-06-29 12:00:00.000Z".to_string(),
        updated: "2024-06-29 12:00:00.000Z".to_string(),
        name: "users".to_string(),
        collection_type: CollectionType::Auth,
        system: false,
        schema: vec![
            text_field("users_name", "name"),
            SchemaField::new(
                "users_avatar",
                "avatar",
                false,
                FieldKind::File(FileOptions {
                    mime_types: [
                        "image/jpeg",
                        "image/png",
                        "image/svg+xml",
                        "image/gif",
                        "image/webp",
                    ]
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                    thumbs: Vec::new(),
                    max_select: 1,
                    max_size: AVATAR_MAX_SIZE,
                    protected: false,
                }),
            ),
            text_field("users_role", "role"),
        ],
        indexes: Vec::new(),
        rules: AccessRules {
            list: self_only.clone(),
            view: self_only.clone(),
            create: Some(String::new()),
            update: self_only.clone(),
            delete: self_only,
        },
        options,
    };

    Ok(MigrationDefinition::new(
        "1640988000_init_users",
        "認証用usersコレクションの作成",
        vec![SchemaOperation::CreateCollection(users)],
        vec![SchemaOperation::DeleteCollection {
            collection: USERS_COLLECTION_ID.to_string(),
        }],
    )?)
}

fn created_customers() -> Result<MigrationDefinition, MigrationError> {
    let customers = base_collection(
        CUSTOMERS_COLLECTION_ID,
        "customers",
        "2024-06-29 12:11:58.210Z",
        vec![text_field("h6izurvc", "name")],
    );

    Ok(MigrationDefinition::new(
        "1719663118_created_customers",
        "customersコレクションの作成",
        vec![SchemaOperation::CreateCollection(customers)],
        vec![SchemaOperation::DeleteCollection {
            collection: CUSTOMERS_COLLECTION_ID.to_string(),
        }],
    )?)
}

fn created_expense_types() -> Result<MigrationDefinition, MigrationError> {
    let expense_types = base_collection(
        EXPENSE_TYPES_COLLECTION_ID,
        "expense_types",
        "2024-06-29 12:12:26.140Z",
        vec![text_field("7wssejnj", "name")],
    );

    Ok(MigrationDefinition::new(
        "1719663146_created_expense_types",
        "expense_typesコレクションの作成",
        vec![SchemaOperation::CreateCollection(expense_types)],
        vec![SchemaOperation::DeleteCollection {
            collection: EXPENSE_TYPES_COLLECTION_ID.to_string(),
        }],
    )?)
}

fn created_expenses() -> Result<MigrationDefinition, MigrationError> {
    let expenses = base_collection(
        EXPENSES_COLLECTION_ID,
        "expenses",
        "2024-06-29 12:14:10.857Z",
        vec![
            SchemaField::new(
                "zgubnyz0",
                "datetime",
                true,
                FieldKind::Date(DateOptions::default()),
            ),
            SchemaField::new(
                "tiquqg4i",
                "customer",
                true,
                FieldKind::Relation(RelationOptions::single(CUSTOMERS_COLLECTION_ID)),
            ),
            SchemaField::new(
                "ly0equh7",
                "expense_type",
                true,
                FieldKind::Relation(RelationOptions::single(EXPENSE_TYPES_COLLECTION_ID)),
            ),
            text_field("icmgtibu", "description"),
            picture_field(true),
            SchemaField::new(
                "qdid6mpb",
                "amount",
                true,
                FieldKind::Number(NumberOptions::default()),
            ),
            SchemaField::new("0e8vjenk", "company_credit_card", false, FieldKind::Bool),
        ],
    );

    Ok(MigrationDefinition::new(
        "1719663250_created_expenses",
        "expensesコレクションの作成",
        vec![SchemaOperation::CreateCollection(expenses)],
        vec![SchemaOperation::DeleteCollection {
            collection: EXPENSES_COLLECTION_ID.to_string(),
        }],
    )?)
}

fn added_expense_owner() -> Result<MigrationDefinition, MigrationError> {
    let user = SchemaField::new(
        USER_FIELD_ID,
        "user",
        true,
        FieldKind::Relation(RelationOptions::single(USERS_COLLECTION_ID)),
    );

    Ok(MigrationDefinition::new(
        "1719663305_updated_expenses",
        "expensesに所有者(user)フィールドを追加",
        vec![SchemaOperation::UpsertField {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            field: user,
        }],
        vec![SchemaOperation::RemoveField {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            field_id: USER_FIELD_ID.to_string(),
        }],
    )?)
}

fn restricted_expenses_to_owner() -> Result<MigrationDefinition, MigrationError> {
    Ok(MigrationDefinition::new(
        "1719663578_updated_expenses",
        "expensesの全操作を所有者のみに制限",
        vec![SchemaOperation::SetRules {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            rules: RuleUpdate::all(Some(owner_rule())),
        }],
        vec![SchemaOperation::SetRules {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            rules: RuleUpdate::all(None),
        }],
    )?)
}

fn relaxed_expense_picture() -> Result<MigrationDefinition, MigrationError> {
    Ok(MigrationDefinition::new(
        "1719665960_updated_expenses",
        "expensesのpictureを任意項目に変更",
        vec![SchemaOperation::UpsertField {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            field: picture_field(false),
        }],
        vec![SchemaOperation::UpsertField {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            field: picture_field(true),
        }],
    )?)
}

fn opened_expense_reads_to_admins() -> Result<MigrationDefinition, MigrationError> {
    let reads = |rule: String| {
        RuleUpdate::default()
            .set(RuleAction::List, Some(rule.clone()))
            .set(RuleAction::View, Some(rule))
    };

    Ok(MigrationDefinition::new(
        "1719742711_updated_expenses",
        "expensesの一覧・参照を管理者にも許可",
        vec![SchemaOperation::SetRules {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            rules: reads(owner_or_admin_rule()),
        }],
        vec![SchemaOperation::SetRules {
            collection: EXPENSES_COLLECTION_ID.to_string(),
            rules: reads(owner_rule()),
        }],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_strings_match_backend_syntax() {
        assert_eq!(
            owner_rule(),
            r#"@request.auth.id != "" && @request.auth.id = user.id"#
        );
        assert_eq!(
            owner_or_admin_rule(),
            r#"@request.auth.id != "" && (@request.auth.id = user.id || @request.auth.role = "admin")"#
        );
    }

    #[test]
    fn test_every_step_has_an_inverse() {
        for migration in all_migrations().unwrap() {
            assert!(!migration.up.is_empty(), "{}", migration.name);
            assert!(!migration.down.is_empty(), "{}", migration.name);
            assert!(migration.validate().is_ok(), "{}", migration.name);
        }
    }

    #[test]
    fn test_steps_are_in_timestamp_order() {
        let timestamps: Vec<i64> = all_migrations()
            .unwrap()
            .iter()
            .map(|m| m.timestamp)
            .collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn test_picture_limit_is_ten_mebibytes() {
        assert_eq!(PICTURE_MAX_SIZE, 10_485_760);
        assert!(!picture_field(false).required);
    }
}
