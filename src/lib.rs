pub mod features;
pub mod shared;

use features::auth::{AuthService, CredentialStore};
use features::expenses::ExpenseService;
use features::records::RecordService;
use features::stores::{DataStores, StoreLoader};
use shared::api_client::{ApiClient, ApiClientConfig};
use shared::config::auth_file_path;
use shared::errors::AppResult;
use std::sync::Arc;

/// アプリケーション状態（バックエンド接続と共有ストアを保持）
#[derive(Debug)]
pub struct App {
    pub api: ApiClient,
    pub credentials: Arc<CredentialStore>,
    pub auth: AuthService,
    pub records: RecordService,
    pub expenses: ExpenseService,
    pub loader: StoreLoader<RecordService>,
}

impl App {
    /// 環境変数から設定を読み込んで初期化する
    pub fn from_env() -> AppResult<Self> {
        let config = ApiClientConfig::from_env()?;
        let credentials = Arc::new(CredentialStore::load(auth_file_path()?));
        Self::with_config(config, credentials)
    }

    /// 指定した設定と認証ストアで初期化する
    pub fn with_config(
        config: ApiClientConfig,
        credentials: Arc<CredentialStore>,
    ) -> AppResult<Self> {
        log::info!("バックエンドに接続します: {}", config.base_url);

        let api = ApiClient::new_with_config(config)?;
        let auth = AuthService::new(api.clone(), Arc::clone(&credentials));
        let records = RecordService::new(api.clone(), Arc::clone(&credentials));
        let expenses = ExpenseService::new(records.clone());
        let loader = StoreLoader::new(records.clone(), Arc::new(DataStores::new()));

        Ok(Self {
            api,
            credentials,
            auth,
            records,
            expenses,
            loader,
        })
    }

    /// 共有データストア
    pub fn stores(&self) -> &Arc<DataStores> {
        self.loader.stores()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_shares_credential_store() {
        let credentials = Arc::new(CredentialStore::in_memory());
        let app = App::with_config(
            ApiClientConfig::with_base_url("http://localhost:8090"),
            Arc::clone(&credentials),
        )
        .unwrap();

        credentials.save("token", None).unwrap();
        assert_eq!(app.auth.store().token().as_deref(), Some("token"));
        assert!(app.stores().expenses.snapshot().is_empty());
    }
}
