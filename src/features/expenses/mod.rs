//! 経費機能モジュール
//!
//! 表示用の単位・金額整形と、経費の作成・削除を提供します。

pub mod display;
pub mod models;
pub mod service;

pub use display::{format_expense_amount, get_expense_unit, is_kilometer_expense_type};
pub use models::{ExpenseDraft, ExpensePayload, PictureUpload};
pub use service::ExpenseService;
