use serde::{Deserialize, Serialize};

/// 認証済みアカウント（usersコレクションのレコード）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthModel {
    /// レコードID
    pub id: String,
    /// メールアドレス（非公開設定の場合は空）
    #[serde(default)]
    pub email: String,
    /// ユーザー名
    #[serde(default)]
    pub username: String,
    /// 表示名
    #[serde(default)]
    pub name: String,
    /// アバター画像のファイル名
    #[serde(default)]
    pub avatar: String,
    /// ロール（"admin" は全員の経費を参照できる）
    #[serde(default)]
    pub role: String,
    /// メール認証済みフラグ
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "collectionId", default)]
    pub collection_id: String,
    #[serde(rename = "collectionName", default)]
    pub collection_name: String,
}

impl AuthModel {
    /// 管理者ロールを持つか
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// 永続化される認証情報 `{ token, model }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    pub model: Option<AuthModel>,
}

/// パスワード認証のリクエストボディ
#[derive(Debug, Serialize)]
pub struct PasswordAuthRequest<'a> {
    pub identity: &'a str,
    pub password: &'a str,
}

/// パスワード認証のレスポンス
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: AuthModel,
}

/// 新規登録時の追加情報
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// 表示名
    pub name: Option<String>,
    /// その他の任意フィールド
    pub extra: serde_json::Map<String, serde_json::Value>,
}
