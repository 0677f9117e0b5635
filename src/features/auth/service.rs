//! 認証サービス
//!
//! パスワード認証、登録してからのログイン、ログアウト、
//! 現在のアカウント取得とルートガードの適用を行います。

use super::guard::{route_guard, GuardDecision};
use super::models::{AuthModel, AuthResponse, PasswordAuthRequest, Registration};
use super::store::CredentialStore;
use crate::shared::api_client::ApiClient;
use crate::shared::errors::{AppError, AppResult};
use std::sync::Arc;

const USERS_ENDPOINT: &str = "/api/collections/users";

/// 認証サービス
#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
    store: Arc<CredentialStore>,
}

impl AuthService {
    /// 新しい認証サービスを作成
    pub fn new(api: ApiClient, store: Arc<CredentialStore>) -> Self {
        Self { api, store }
    }

    /// メールアドレス（またはユーザー名）とパスワードで認証し、認証情報を保存する
    ///
    /// 認証失敗はバックエンドのエラーがそのまま返り、リトライはしない。
    pub async fn auth_with_password(&self, identity: &str, password: &str) -> AppResult<AuthModel> {
        let request = PasswordAuthRequest { identity, password };
        let response: AuthResponse = self
            .api
            .post(
                &format!("{USERS_ENDPOINT}/auth-with-password"),
                &request,
                None,
            )
            .await?;

        self.store
            .save(&response.token, Some(response.record.clone()))?;
        log::info!("ログインしました: user_id={}", response.record.id);
        Ok(response.record)
    }

    /// ログイン（必要に応じて先にアカウントを登録する）
    ///
    /// # 引数
    /// * `email` - メールアドレス
    /// * `password` - パスワード
    /// * `registration` - Someの場合、認証前にアカウントを作成する
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        registration: Option<Registration>,
    ) -> AppResult<AuthModel> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation(
                "メールアドレスとパスワードを入力してください",
            ));
        }

        if let Some(registration) = registration {
            let mut body = registration.extra;
            if let Some(name) = registration.name {
                body.insert("name".to_string(), name.into());
            }
            body.insert("email".to_string(), email.into());
            body.insert("password".to_string(), password.into());
            body.insert("passwordConfirm".to_string(), password.into());

            let created: AuthModel = self
                .api
                .post(&format!("{USERS_ENDPOINT}/records"), &body, None)
                .await?;
            log::info!("アカウントを登録しました: user_id={}", created.id);
        }

        self.auth_with_password(email, password).await
    }

    /// ログアウト（保存された認証情報を破棄する）
    pub fn logout(&self) -> AppResult<()> {
        self.store.clear()?;
        log::info!("ログアウトしました");
        Ok(())
    }

    /// 有効な認証情報がある場合、そのアカウントを返す
    pub fn current_user(&self) -> Option<AuthModel> {
        if self.store.is_valid() {
            self.store.model()
        } else {
            None
        }
    }

    /// ルートガードを適用する
    ///
    /// 認証情報が無効な場合は保存された認証情報を破棄する。
    pub fn guard(&self, pathname: &str) -> AppResult<GuardDecision> {
        let authenticated = self.current_user().is_some();
        if !authenticated {
            self.store.clear()?;
        }
        Ok(route_guard(pathname, authenticated))
    }

    /// 認証情報ストア
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }
}
