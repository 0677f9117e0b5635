//! 認証情報ストア
//!
//! `{ token, model }` をJSONファイルに永続化します。ファイルが無い場合、
//! または内容が壊れている場合は未認証として扱います。

use super::models::{AuthModel, StoredCredential};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::token_expires_at;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// 認証情報ストア
#[derive(Debug)]
pub struct CredentialStore {
    /// 保存先（Noneの場合はメモリ上のみ）
    path: Option<PathBuf>,
    current: RwLock<Option<StoredCredential>>,
}

impl CredentialStore {
    /// ファイルから認証情報を読み込んでストアを作成
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = Self::read_file(&path);
        Self {
            path: Some(path),
            current: RwLock::new(current),
        }
    }

    /// 永続化しないストアを作成
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
        }
    }

    /// 現在のトークン（未認証または空の場合はNone）
    pub fn token(&self) -> Option<String> {
        self.read_current()
            .map(|stored| stored.token)
            .filter(|token| !token.is_empty())
    }

    /// 現在の認証アカウント
    pub fn model(&self) -> Option<AuthModel> {
        self.read_current().and_then(|stored| stored.model)
    }

    /// トークンが存在し、有効期限内か
    pub fn is_valid(&self) -> bool {
        self.token()
            .and_then(|token| token_expires_at(&token))
            .map(|expires_at| expires_at > Utc::now())
            .unwrap_or(false)
    }

    /// 認証情報を保存
    pub fn save(&self, token: &str, model: Option<AuthModel>) -> AppResult<()> {
        let stored = StoredCredential {
            token: token.to_string(),
            model,
        };

        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
            log::debug!("認証情報を保存しました: {}", path.display());
        }

        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(stored);
        Ok(())
    }

    /// 認証情報を破棄（ログアウト）
    pub fn clear(&self) -> AppResult<()> {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;

        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => log::debug!("認証情報を削除しました: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::Io(e)),
            }
        }
        Ok(())
    }

    fn read_current(&self) -> Option<StoredCredential> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn read_file(path: &Path) -> Option<StoredCredential> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("認証情報ファイルを読み込めません（未認証として扱います）: {e}");
                return None;
            }
        };

        match serde_json::from_str::<StoredCredential>(&content) {
            Ok(stored) => Some(stored),
            Err(e) => {
                log::warn!("認証情報ファイルが不正です（未認証として扱います）: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::utils::token::make_test_token;

    fn model() -> AuthModel {
        serde_json::from_str(r#"{"id":"u1234567890abcd","email":"a@example.com"}"#).unwrap()
    }

    #[test]
    fn test_absent_file_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::load(dir.path().join("auth.json"));
        assert!(store.token().is_none());
        assert!(!store.is_valid());
    }

    #[test]
    fn test_malformed_file_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = CredentialStore::load(&path);
        assert!(store.token().is_none());
        assert!(store.model().is_none());
    }

    #[test]
    fn test_save_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.json");
        let token = make_test_token(Utc::now().timestamp() + 3600);

        let store = CredentialStore::load(&path);
        store.save(&token, Some(model())).unwrap();
        assert!(store.is_valid());

        let reloaded = CredentialStore::load(&path);
        assert_eq!(reloaded.token(), Some(token));
        assert_eq!(reloaded.model(), Some(model()));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let store = CredentialStore::in_memory();
        store
            .save(&make_test_token(Utc::now().timestamp() - 10), Some(model()))
            .unwrap();
        assert!(store.token().is_some());
        assert!(!store.is_valid());
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let store = CredentialStore::in_memory();
        store.save("", None).unwrap();
        assert!(store.token().is_none());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let store = CredentialStore::load(&path);
        store.save("T", None).unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.token().is_none());
        store.clear().unwrap();
    }
}
