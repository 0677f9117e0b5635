/// 機能別モジュール
///
/// 各機能モジュールは、その機能に関連するモデル・サービス・永続化を含む自己完結型のユニットです。
// 機能モジュールの宣言
pub mod auth;
pub mod expenses;
pub mod migrations;
pub mod records;
pub mod schema;
pub mod stores;
