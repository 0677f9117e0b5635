//! コレクションごとのレコード型
//!
//! バックエンドのレスポンスは共通のシステムフィールドと、
//! コレクション固有のフィールド、任意の展開（expand）から成ります。

use serde::{Deserialize, Serialize};
use std::fmt;

/// コレクション名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collections {
    Customers,
    ExpenseTypes,
    Expenses,
    Users,
}

impl Collections {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collections::Customers => "customers",
            Collections::ExpenseTypes => "expense_types",
            Collections::Expenses => "expenses",
            Collections::Users => "users",
        }
    }
}

impl fmt::Display for Collections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 全レコード共通のシステムフィールド
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseSystemFields {
    pub id: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(rename = "collectionId", default)]
    pub collection_id: String,
    #[serde(rename = "collectionName", default)]
    pub collection_name: String,
}

/// APIレスポンスのレコード
///
/// `R` はコレクション固有のフィールド、`E` は展開されたリレーション。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResponse<R, E = serde_json::Value> {
    #[serde(flatten)]
    pub system: BaseSystemFields,
    #[serde(flatten)]
    pub record: R,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<E>,
}

impl<R, E> RecordResponse<R, E> {
    /// レコードID
    pub fn id(&self) -> &str {
        &self.system.id
    }
}

/// レコードIDを持つ型（クライアント側の絞り込み用）
pub trait Identified {
    fn record_id(&self) -> &str;
}

impl<R, E> Identified for RecordResponse<R, E> {
    fn record_id(&self) -> &str {
        self.id()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomersRecord {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseTypesRecord {
    #[serde(default)]
    pub name: String,
}

/// 経費レコード
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpensesRecord {
    pub amount: f64,
    #[serde(default)]
    pub company_credit_card: bool,
    pub customer: String,
    pub datetime: String,
    #[serde(default)]
    pub description: String,
    pub expense_type: String,
    /// 画像ファイル名（未添付の場合は空）
    #[serde(default)]
    pub picture: String,
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsersRecord {
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "emailVisibility", default)]
    pub email_visibility: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub verified: bool,
}

pub type CustomersResponse<E = serde_json::Value> = RecordResponse<CustomersRecord, E>;
pub type ExpenseTypesResponse<E = serde_json::Value> = RecordResponse<ExpenseTypesRecord, E>;
pub type UsersResponse<E = serde_json::Value> = RecordResponse<UsersRecord, E>;
pub type ExpensesResponse<E = ExpenseExpand> = RecordResponse<ExpensesRecord, E>;

/// 経費レコードの展開（`user,expense_type,customer`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseExpand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UsersResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_type: Option<ExpenseTypesResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomersResponse>,
}

/// 経費レコードで展開するリレーション
pub const EXPENSE_EXPAND: &str = "user,expense_type,customer";

/// 一覧取得のページ
#[derive(Debug, Clone, Deserialize)]
pub struct ListResult<T> {
    pub page: u32,
    #[serde(rename = "perPage")]
    pub per_page: u32,
    #[serde(rename = "totalItems", default)]
    pub total_items: i64,
    #[serde(rename = "totalPages", default)]
    pub total_pages: i64,
    pub items: Vec<T>,
}

/// 一覧取得のオプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// 並び順（既定は作成日時の新しい順）
    pub sort: String,
    /// 展開するリレーション（カンマ区切り）
    pub expand: Option<String>,
    /// バックエンド側のフィルター式
    pub filter: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            sort: "-created".to_string(),
            expand: None,
            filter: None,
        }
    }
}

impl ListOptions {
    pub fn with_expand(mut self, expand: &str) -> Self {
        self.expand = Some(expand.to_string());
        self
    }

    /// クエリパラメータに変換
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("sort", self.sort.clone())];
        if let Some(expand) = self.expand.as_ref().filter(|e| !e.is_empty()) {
            query.push(("expand", expand.clone()));
        }
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            query.push(("filter", filter.clone()));
        }
        query
    }
}
