use nanoid::nanoid;
use once_cell::sync::Lazy;
use regex::Regex;

/// レコードIDの文字数（PocketBase互換）
pub const RECORD_ID_LENGTH: usize = 15;

/// レコードIDに使用する文字セット
const RECORD_ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

static RECORD_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]{15}$").unwrap_or_else(|e| panic!("レコードID正規表現が不正: {e}"))
});

/// クライアント側でレコードIDを生成する
///
/// 作成前にIDを決めておくことで、作成直後に単一レコードの再取得ができる。
///
/// # 戻り値
/// 15文字の `[a-z0-9]` 文字列
pub fn generate_record_id() -> String {
    nanoid!(RECORD_ID_LENGTH, &RECORD_ID_ALPHABET)
}

/// レコードIDが有効な形式かどうかを検証する
pub fn is_valid_record_id(id: &str) -> bool {
    RECORD_ID_PATTERN.is_match(id)
}
