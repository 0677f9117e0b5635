//! レコードサービス
//!
//! 保存された認証情報のトークンを付与して、コレクションごとの
//! 一覧取得・作成・更新・削除を行います。

use super::models::{Collections, ListOptions, ListResult};
use crate::features::auth::CredentialStore;
use crate::shared::api_client::ApiClient;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::is_valid_record_id;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// 一覧取得時の1ページあたりの件数
const FULL_LIST_BATCH_SIZE: u32 = 500;

/// レコードサービス
#[derive(Debug, Clone)]
pub struct RecordService {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
}

impl RecordService {
    pub fn new(api: ApiClient, credentials: Arc<CredentialStore>) -> Self {
        Self { api, credentials }
    }

    fn records_endpoint(collection: Collections) -> String {
        format!("/api/collections/{}/records", collection.as_str())
    }

    /// 単一レコードのエンドポイント（不正な形式のIDは送信前に拒否する）
    fn record_endpoint(collection: Collections, id: &str) -> AppResult<String> {
        if !is_valid_record_id(id) {
            return Err(AppError::validation(format!(
                "レコードIDの形式が不正です: '{id}'"
            )));
        }
        Ok(format!("{}/{id}", Self::records_endpoint(collection)))
    }

    fn token(&self) -> Option<String> {
        self.credentials.token()
    }

    /// 全件取得（ページを順に取得して連結する）
    ///
    /// # 引数
    /// * `collection` - コレクション
    /// * `options` - 並び順・展開・フィルター
    pub async fn get_full_list<T>(
        &self,
        collection: Collections,
        options: &ListOptions,
    ) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let endpoint = Self::records_endpoint(collection);
        let token = self.token();
        let mut items = Vec::new();
        let mut page = 1_u32;

        loop {
            let mut query = options.to_query();
            query.push(("page", page.to_string()));
            query.push(("perPage", FULL_LIST_BATCH_SIZE.to_string()));
            query.push(("skipTotal", "1".to_string()));

            let result: ListResult<T> = self.api.get(&endpoint, &query, token.as_deref()).await?;
            let fetched = result.items.len();
            items.extend(result.items);

            if fetched < FULL_LIST_BATCH_SIZE as usize {
                break;
            }
            page += 1;
        }

        log::debug!("{collection} を {} 件取得しました", items.len());
        Ok(items)
    }

    /// 全件取得後、条件に合うレコードだけを残す
    pub async fn get_full_list_where<T, F>(
        &self,
        collection: Collections,
        options: &ListOptions,
        predicate: F,
    ) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let items: Vec<T> = self.get_full_list(collection, options).await?;
        Ok(items.into_iter().filter(|item| predicate(item)).collect())
    }

    /// 作成（JSON）
    pub async fn create<B, T>(&self, collection: Collections, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.token();
        self.api
            .post(&Self::records_endpoint(collection), body, token.as_deref())
            .await
    }

    /// 作成（multipart、ファイル添付あり）
    pub async fn create_multipart<T>(
        &self,
        collection: Collections,
        form: reqwest::multipart::Form,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let token = self.token();
        self.api
            .post_multipart(&Self::records_endpoint(collection), form, token.as_deref())
            .await
    }

    /// 更新
    pub async fn update<B, T>(&self, collection: Collections, id: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.token();
        self.api
            .patch(&Self::record_endpoint(collection, id)?, body, token.as_deref())
            .await
    }

    /// 削除
    pub async fn delete(&self, collection: Collections, id: &str) -> AppResult<()> {
        let token = self.token();
        self.api
            .delete(&Self::record_endpoint(collection, id)?, token.as_deref())
            .await
    }

    /// ファイル取得用URL
    pub fn file_url(&self, collection_id: &str, record_id: &str, filename: &str) -> String {
        self.api.file_url(collection_id, record_id, filename)
    }
}
