//! データストア機能モジュール
//!
//! コレクションごとのリアクティブストアと、バックエンドからの一括更新を提供します。

pub mod loader;
pub mod store;

pub use loader::{DataStores, RecordFetcher, RefreshReport, StoreLoader, UpdateFilter};
pub use store::{CollectionStore, SubscriptionId};
