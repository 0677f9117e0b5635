//! コレクション定義のデータモデル
//!
//! バックエンドのコレクションカタログに保存される定義（フィールド、
//! アクセスルール）を型付きで表現します。JSON形式はバックエンドの
//! コレクションエクスポート形式と互換です。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 認証用システムコレクション（users）のID
pub const USERS_COLLECTION_ID: &str = "_pb_users_auth_";

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| panic!("名前正規表現が不正: {e}"))
});

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{3,}$").unwrap_or_else(|e| panic!("ID正規表現が不正: {e}"))
});

/// テキストフィールドのオプション
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    pub min: Option<u32>,
    pub max: Option<u32>,
    #[serde(default)]
    pub pattern: String,
}

/// 数値フィールドのオプション
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberOptions {
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(rename = "noDecimal", default)]
    pub no_decimal: bool,
}

/// 日時フィールドのオプション（空文字は制限なし）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateOptions {
    #[serde(default)]
    pub min: String,
    #[serde(default)]
    pub max: String,
}

/// リレーションフィールドのオプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationOptions {
    #[serde(rename = "collectionId")]
    pub collection_id: String,
    #[serde(rename = "cascadeDelete", default)]
    pub cascade_delete: bool,
    #[serde(rename = "minSelect")]
    pub min_select: Option<u32>,
    #[serde(rename = "maxSelect")]
    pub max_select: Option<u32>,
    #[serde(rename = "displayFields")]
    pub display_fields: Option<Vec<String>>,
}

impl RelationOptions {
    /// 単一レコードを参照するリレーション
    pub fn single(collection_id: &str) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            cascade_delete: false,
            min_select: None,
            max_select: Some(1),
            display_fields: None,
        }
    }
}

/// ファイルフィールドのオプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOptions {
    #[serde(rename = "mimeTypes", default)]
    pub mime_types: Vec<String>,
    #[serde(default)]
    pub thumbs: Vec<String>,
    #[serde(rename = "maxSelect")]
    pub max_select: u32,
    /// 最大サイズ（バイト）
    #[serde(rename = "maxSize")]
    pub max_size: u64,
    #[serde(default)]
    pub protected: bool,
}

/// フィールド種別と種別ごとのオプション
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text(TextOptions),
    Number(NumberOptions),
    Bool,
    Date(DateOptions),
    Relation(RelationOptions),
    File(FileOptions),
}

impl FieldKind {
    /// JSON上の型タグ
    pub fn type_tag(&self) -> &'static str {
        match self {
            FieldKind::Text(_) => "text",
            FieldKind::Number(_) => "number",
            FieldKind::Bool => "bool",
            FieldKind::Date(_) => "date",
            FieldKind::Relation(_) => "relation",
            FieldKind::File(_) => "file",
        }
    }

    fn options_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            FieldKind::Text(o) => serde_json::to_value(o),
            FieldKind::Number(o) => serde_json::to_value(o),
            FieldKind::Bool => Ok(serde_json::Value::Object(serde_json::Map::new())),
            FieldKind::Date(o) => serde_json::to_value(o),
            FieldKind::Relation(o) => serde_json::to_value(o),
            FieldKind::File(o) => serde_json::to_value(o),
        }
    }

    fn from_tag(tag: &str, options: serde_json::Value) -> Result<Self, String> {
        let parse_err = |e: serde_json::Error| format!("{tag} フィールドのオプションが不正です: {e}");
        let kind = match tag {
            "text" => FieldKind::Text(serde_json::from_value(options).map_err(parse_err)?),
            "number" => FieldKind::Number(serde_json::from_value(options).map_err(parse_err)?),
            "bool" => FieldKind::Bool,
            "date" => FieldKind::Date(serde_json::from_value(options).map_err(parse_err)?),
            "relation" => FieldKind::Relation(serde_json::from_value(options).map_err(parse_err)?),
            "file" => FieldKind::File(serde_json::from_value(options).map_err(parse_err)?),
            other => return Err(format!("未対応のフィールド種別です: {other}")),
        };
        Ok(kind)
    }
}

/// JSON境界で使う生のフィールド表現
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSchemaField {
    #[serde(default)]
    system: bool,
    id: String,
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    presentable: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    options: serde_json::Value,
}

/// コレクションのフィールド定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSchemaField", into = "RawSchemaField")]
pub struct SchemaField {
    pub system: bool,
    pub id: String,
    pub name: String,
    pub required: bool,
    pub presentable: bool,
    pub unique: bool,
    pub kind: FieldKind,
}

impl SchemaField {
    /// 新しいフィールド定義を作成
    pub fn new(id: &str, name: &str, required: bool, kind: FieldKind) -> Self {
        Self {
            system: false,
            id: id.to_string(),
            name: name.to_string(),
            required,
            presentable: false,
            unique: false,
            kind,
        }
    }

    /// 必須フラグを変更したコピーを返す
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// リレーション先のコレクションID（リレーション以外はNone）
    pub fn relation_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Relation(options) => Some(options.collection_id.as_str()),
            _ => None,
        }
    }
}

impl TryFrom<RawSchemaField> for SchemaField {
    type Error = String;

    fn try_from(raw: RawSchemaField) -> Result<Self, Self::Error> {
        let options = if raw.options.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            raw.options
        };
        Ok(Self {
            system: raw.system,
            id: raw.id,
            name: raw.name,
            required: raw.required,
            presentable: raw.presentable,
            unique: raw.unique,
            kind: FieldKind::from_tag(&raw.field_type, options)?,
        })
    }
}

impl From<SchemaField> for RawSchemaField {
    fn from(field: SchemaField) -> Self {
        // オプション構造体のシリアライズは失敗しない（数値・文字列・配列のみ）
        let options = field
            .kind
            .options_value()
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));
        Self {
            system: field.system,
            id: field.id,
            name: field.name,
            field_type: field.kind.type_tag().to_string(),
            required: field.required,
            presentable: field.presentable,
            unique: field.unique,
            options,
        }
    }
}

/// コレクション種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// 通常のコレクション
    Base,
    /// 認証用コレクション（users）
    Auth,
}

/// 5種類のアクセスルール
///
/// 各ルールは未設定（None: システム既定＝管理者のみ）か、式文字列。
/// 空文字列は「誰でも可」を表す。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRules {
    #[serde(rename = "listRule")]
    pub list: Option<String>,
    #[serde(rename = "viewRule")]
    pub view: Option<String>,
    #[serde(rename = "createRule")]
    pub create: Option<String>,
    #[serde(rename = "updateRule")]
    pub update: Option<String>,
    #[serde(rename = "deleteRule")]
    pub delete: Option<String>,
}

impl AccessRules {
    /// 全操作に同じルールを設定
    pub fn uniform(rule: Option<String>) -> Self {
        Self {
            list: rule.clone(),
            view: rule.clone(),
            create: rule.clone(),
            update: rule.clone(),
            delete: rule,
        }
    }

    /// 操作種別ごとのルールを取得
    pub fn get(&self, action: RuleAction) -> Option<&str> {
        match action {
            RuleAction::List => self.list.as_deref(),
            RuleAction::View => self.view.as_deref(),
            RuleAction::Create => self.create.as_deref(),
            RuleAction::Update => self.update.as_deref(),
            RuleAction::Delete => self.delete.as_deref(),
        }
    }
}

/// アクセスルールの操作種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleAction {
    List,
    View,
    Create,
    Update,
    Delete,
}

impl RuleAction {
    pub const ALL: [RuleAction; 5] = [
        RuleAction::List,
        RuleAction::View,
        RuleAction::Create,
        RuleAction::Update,
        RuleAction::Delete,
    ];
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleAction::List => "listRule",
            RuleAction::View => "viewRule",
            RuleAction::Create => "createRule",
            RuleAction::Update => "updateRule",
            RuleAction::Delete => "deleteRule",
        };
        write!(f, "{name}")
    }
}

/// コレクション定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDefinition {
    pub id: String,
    pub created: String,
    pub updated: String,
    pub name: String,
    #[serde(rename = "type")]
    pub collection_type: CollectionType,
    #[serde(default)]
    pub system: bool,
    pub schema: Vec<SchemaField>,
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(flatten)]
    pub rules: AccessRules,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl CollectionDefinition {
    /// 名前でフィールドを検索
    pub fn field_by_name(&self, name: &str) -> Option<&SchemaField> {
        self.schema.iter().find(|f| f.name == name)
    }

    /// フィールドを追加、または同じIDのフィールドを置き換える
    ///
    /// 置き換えの場合は元の位置を保つ。
    pub fn upsert_field(&mut self, field: SchemaField) {
        match self.schema.iter_mut().find(|f| f.id == field.id) {
            Some(existing) => *existing = field,
            None => self.schema.push(field),
        }
    }

    /// IDでフィールドを削除（存在しない場合は何もしない）
    ///
    /// # 戻り値
    /// 削除した場合はtrue
    pub fn remove_field(&mut self, field_id: &str) -> bool {
        let before = self.schema.len();
        self.schema.retain(|f| f.id != field_id);
        before != self.schema.len()
    }

    /// コレクション定義の検証
    ///
    /// # 戻り値
    /// 有効な場合はOk(())、無効な場合はエラーメッセージ
    pub fn validate(&self) -> Result<(), String> {
        if !ID_PATTERN.is_match(&self.id) {
            return Err(format!("コレクションIDが不正です: '{}'", self.id));
        }

        if !NAME_PATTERN.is_match(&self.name) {
            return Err(format!("コレクション名が不正です: '{}'", self.name));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for field in &self.schema {
            if !NAME_PATTERN.is_match(&field.name) {
                return Err(format!("フィールド名が不正です: '{}'", field.name));
            }
            if field.id.is_empty() {
                return Err(format!("フィールド '{}' のIDが空です", field.name));
            }
            if !names.insert(field.name.as_str()) {
                return Err(format!("フィールド名が重複しています: '{}'", field.name));
            }
            if !ids.insert(field.id.as_str()) {
                return Err(format!("フィールドIDが重複しています: '{}'", field.id));
            }
            if let FieldKind::File(options) = &field.kind {
                if options.max_size == 0 {
                    return Err(format!(
                        "ファイルフィールド '{}' の最大サイズが0です",
                        field.name
                    ));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for CollectionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Collection[{}] {} ({} fields)",
            self.id,
            self.name,
            self.schema.len()
        )
    }
}
