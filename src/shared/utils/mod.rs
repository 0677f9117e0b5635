/// レコードID生成と検証
pub mod record_id;

/// JWTペイロードの解析
pub mod token;

pub use record_id::{generate_record_id, is_valid_record_id};
pub use token::{decode_token_payload, token_expires_at, TokenPayload};
