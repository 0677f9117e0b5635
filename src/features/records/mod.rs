//! レコード機能モジュール
//!
//! コレクションごとの型付きレコードと、認証付きのCRUDを提供します。

pub mod models;
pub mod service;

pub use models::{
    BaseSystemFields, Collections, CustomersRecord, CustomersResponse, ExpenseExpand,
    ExpenseTypesRecord, ExpenseTypesResponse, ExpensesRecord, ExpensesResponse, Identified,
    ListOptions, ListResult, RecordResponse, UsersRecord, UsersResponse, EXPENSE_EXPAND,
};
pub use service::RecordService;
