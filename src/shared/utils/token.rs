use crate::shared::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// 認証トークン（JWT）のペイロードのうち利用する項目
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    /// 有効期限（UNIX秒）
    pub exp: Option<i64>,
    /// 認証レコードのID
    pub id: Option<String>,
    /// トークン種別（"authRecord" など）
    #[serde(rename = "type")]
    pub token_type: Option<String>,
}

/// JWTのペイロード部分をデコードする
///
/// 署名は検証しない（検証はバックエンドの責務）。
pub fn decode_token_payload(token: &str) -> AppResult<TokenPayload> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => return Err(AppError::authentication("トークンの形式が不正です")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AppError::authentication(format!("トークンのデコードに失敗: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::authentication(format!("トークンペイロードの解析に失敗: {e}")))
}

/// トークンの有効期限を取得する
pub fn token_expires_at(token: &str) -> Option<DateTime<Utc>> {
    let payload = decode_token_payload(token).ok()?;
    payload.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
}

#[cfg(test)]
pub(crate) fn make_test_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        format!(r#"{{"exp":{exp},"id":"u1234567890abcd","type":"authRecord"}}"#).as_bytes(),
    );
    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token_payload() {
        let token = make_test_token(1_900_000_000);
        let payload = decode_token_payload(&token).unwrap();
        assert_eq!(payload.exp, Some(1_900_000_000));
        assert_eq!(payload.id.as_deref(), Some("u1234567890abcd"));
        assert_eq!(payload.token_type.as_deref(), Some("authRecord"));
    }

    #[test]
    fn test_token_expires_at() {
        let token = make_test_token(1_900_000_000);
        let expires = token_expires_at(&token).unwrap();
        assert_eq!(expires.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_malformed_token() {
        assert!(decode_token_payload("T").is_err());
        assert!(decode_token_payload("a..c").is_err());
        assert!(decode_token_payload("a.!!!.c").is_err());
        assert!(token_expires_at("garbage").is_none());
    }
}
