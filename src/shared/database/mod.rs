/// カタログデータベース接続
pub mod connection;

pub use connection::{create_backup, create_tables, open_catalog, open_in_memory_catalog};
