/// バックエンドAPIクライアント
///
/// PocketBase互換のREST APIとの通信を行う汎用的なクライアント。
/// 認証トークンは呼び出し側から渡され、存在する場合のみ
/// `Authorization: Bearer <token>` ヘッダーを付与する。
use crate::shared::config::environment::base_url_from_env;
use crate::shared::errors::{AppError, AppResult};
use log::{debug, info, warn};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// APIクライアント設定
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    /// タイムアウト（None の場合はトランスポートの既定に従う）
    pub timeout_seconds: Option<u64>,
    /// 接続失敗時のリトライ回数（HTTPエラーステータスは対象外）
    pub max_retries: u32,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: crate::shared::config::environment::DEVELOPMENT_BASE_URL.to_string(),
            timeout_seconds: None,
            max_retries: 0,
        }
    }
}

impl ApiClientConfig {
    /// ベースURLを指定して設定を作成
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// 環境設定からAPIクライアント設定を作成
    pub fn from_env() -> AppResult<Self> {
        let base_url = base_url_from_env()?;
        let timeout_seconds = std::env::var("API_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok());
        let max_retries = std::env::var("API_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(Self {
            base_url,
            timeout_seconds,
            max_retries,
        })
    }
}

/// バックエンドからのエラーレスポンス
///
/// 形式: `{"code": 400, "message": "...", "data": {"field": {"code": "...", "message": "..."}}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: BTreeMap<String, FieldError>,
}

/// フィールド単位の検証エラー
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

impl ApiErrorResponse {
    /// フィールドエラーを含めた表示用メッセージ
    pub fn describe(&self) -> String {
        if self.data.is_empty() {
            return self.message.clone();
        }

        let fields: Vec<String> = self
            .data
            .iter()
            .map(|(field, err)| format!("{field}: {}", err.message))
            .collect();
        format!("{} ({})", self.message, fields.join(", "))
    }
}

/// HTTPステータスとレスポンスボディからエラーを組み立てる
///
/// バックエンドの検証エラーは解釈せずにそのまま保持する。
pub fn error_from_response(status: StatusCode, body: &str) -> AppError {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
    let message = match &parsed {
        Some(response) if !response.message.is_empty() => response.describe(),
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("不明なエラー")
            .to_string(),
        _ => body.trim().to_string(),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Authentication(message),
        StatusCode::BAD_REQUEST => AppError::Validation(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        _ => AppError::ExternalService(format!(
            "APIサーバーエラー: status={} - {message}",
            status.as_u16()
        )),
    }
}

/// 汎用APIクライアント
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiClientConfig,
}

impl ApiClient {
    /// 環境設定からAPIクライアントを作成
    pub fn new() -> AppResult<Self> {
        Self::new_with_config(ApiClientConfig::from_env()?)
    }

    /// 設定を指定してAPIクライアントを作成
    pub fn new_with_config(config: ApiClientConfig) -> AppResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| AppError::configuration(format!("HTTPクライアント初期化失敗: {e}")))?;

        Ok(Self { client, config })
    }

    /// ベースURL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// ファイル取得用URLを組み立てる
    ///
    /// `<baseURL>/api/files/{collectionId}/{recordId}/{filename}`
    pub fn file_url(&self, collection_id: &str, record_id: &str, filename: &str) -> String {
        format!(
            "{}/api/files/{}/{}/{}",
            self.config.base_url,
            urlencoding::encode(collection_id),
            urlencoding::encode(record_id),
            urlencoding::encode(filename)
        )
    }

    /// リクエストを組み立てる
    ///
    /// トークンが無い（または空）の場合、Authorizationヘッダーは付与しない。
    pub fn build_request(
        &self,
        method: Method,
        endpoint: &str,
        auth_token: Option<&str>,
    ) -> RequestBuilder {
        let url = format!("{}{endpoint}", self.config.base_url);
        let mut request = self.client.request(method, url);

        if let Some(token) = auth_token.filter(|t| !t.trim().is_empty()) {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
        }

        request
    }

    /// GETリクエストを送信
    pub async fn get<T>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        auth_token: Option<&str>,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        info!("GETリクエスト送信: endpoint={endpoint}");

        let request = self
            .build_request(Method::GET, endpoint, auth_token)
            .query(query);
        let response = self.send_with_retry(request, "GET", endpoint).await?;
        Self::parse_json(response, "GET", endpoint).await
    }

    /// POSTリクエストを送信
    pub async fn post<B, T>(&self, endpoint: &str, body: &B, auth_token: Option<&str>) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        info!("POSTリクエスト送信: endpoint={endpoint}");

        let request = self
            .build_request(Method::POST, endpoint, auth_token)
            .json(body);
        let response = self.send_with_retry(request, "POST", endpoint).await?;
        Self::parse_json(response, "POST", endpoint).await
    }

    /// multipart/form-data のPOSTリクエストを送信（ファイル添付用）
    ///
    /// フォームは複製できないためリトライは行わない。
    pub async fn post_multipart<T>(
        &self,
        endpoint: &str,
        form: reqwest::multipart::Form,
        auth_token: Option<&str>,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        info!("multipart POSTリクエスト送信: endpoint={endpoint}");

        let response = self
            .build_request(Method::POST, endpoint, auth_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("APIサーバーへの接続に失敗しました: {e}"))
            })?;
        let response = Self::check_status(response).await?;
        Self::parse_json(response, "POST", endpoint).await
    }

    /// PATCHリクエストを送信
    pub async fn patch<B, T>(
        &self,
        endpoint: &str,
        body: &B,
        auth_token: Option<&str>,
    ) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        info!("PATCHリクエスト送信: endpoint={endpoint}");

        let request = self
            .build_request(Method::PATCH, endpoint, auth_token)
            .json(body);
        let response = self.send_with_retry(request, "PATCH", endpoint).await?;
        Self::parse_json(response, "PATCH", endpoint).await
    }

    /// DELETEリクエストを送信
    ///
    /// 成功時のレスポンスボディは空（204）のため、ステータスのみ確認する。
    pub async fn delete(&self, endpoint: &str, auth_token: Option<&str>) -> AppResult<()> {
        info!("DELETEリクエスト送信: endpoint={endpoint}");

        let request = self.build_request(Method::DELETE, endpoint, auth_token);
        self.send_with_retry(request, "DELETE", endpoint).await?;
        info!("DELETEリクエスト成功: endpoint={endpoint}");
        Ok(())
    }

    /// 接続失敗時のみリトライしながらリクエストを送信
    ///
    /// HTTPエラーステータス（認証・検証エラー含む）はリトライせずに返す。
    async fn send_with_retry(
        &self,
        request: RequestBuilder,
        method: &str,
        endpoint: &str,
    ) -> AppResult<Response> {
        let mut attempts = 0;
        loop {
            let Some(cloned_request) = request.try_clone() else {
                return Err(AppError::ExternalService(
                    "リクエストのクローンに失敗しました".to_string(),
                ));
            };

            match cloned_request.send().await {
                Ok(response) => return Self::check_status(response).await,
                Err(e) if attempts < self.config.max_retries => {
                    attempts += 1;
                    let delay = Duration::from_millis(200 * 2_u64.pow(attempts));
                    warn!(
                        "{method}リクエスト失敗、リトライします: endpoint={endpoint}, attempt={attempts}/{}, delay={delay:?}, error={e}",
                        self.config.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("{method}リクエスト失敗: endpoint={endpoint}, error={e}");
                    return Err(AppError::ExternalService(format!(
                        "APIサーバーへの接続に失敗しました: {e}"
                    )));
                }
            }
        }
    }

    /// ステータスを確認し、エラーの場合は詳細なエラーに変換する
    async fn check_status(response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "レスポンス読み取り失敗".to_string());
        debug!("APIサーバーからエラーレスポンス: status={}, body={body}", status.as_u16());

        Err(error_from_response(status, &body))
    }

    async fn parse_json<T>(response: Response, method: &str, endpoint: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let result = response
            .json::<T>()
            .await
            .map_err(|e| AppError::ExternalService(format!("レスポンス解析エラー: {e}")))?;
        info!("{method}リクエスト成功: endpoint={endpoint}");
        Ok(result)
    }
}
