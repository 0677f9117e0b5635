//! 結合テスト用のスタブバックエンド
//!
//! ループバックで待ち受け、登録した応答を返しながらリクエストを記録します。

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// 記録したリクエスト
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// (メソッド, パス, pageクエリ) ごとの応答。pageがNoneの応答はどのページにも返す
type Routes = HashMap<(String, String, Option<String>), (StatusCode, String)>;

/// スタブバックエンド
pub struct StubBackend {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubBackend {
    pub fn builder() -> StubBackendBuilder {
        StubBackendBuilder {
            routes: HashMap::new(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

pub struct StubBackendBuilder {
    routes: Routes,
}

impl StubBackendBuilder {
    /// 応答を登録する（未登録のパスは404）
    pub fn route(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.insert(method, path, None, status, body)
    }

    /// `page` クエリの値ごとに応答を登録する
    pub fn route_page(self, method: &str, path: &str, page: u32, status: u16, body: &str) -> Self {
        self.insert(method, path, Some(page.to_string()), status, body)
    }

    fn insert(
        mut self,
        method: &str,
        path: &str,
        page: Option<String>,
        status: u16,
        body: &str,
    ) -> Self {
        self.routes.insert(
            (method.to_string(), path.to_string(), page),
            (StatusCode::from_u16(status).unwrap(), body.to_string()),
        );
        self
    }

    pub async fn start(self) -> StubBackend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(self.routes);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let recorder = Arc::clone(&recorder);
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        handle_request(req, Arc::clone(&routes), Arc::clone(&recorder))
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        StubBackend { addr, requests }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    routes: Arc<Routes>,
    recorder: Arc<Mutex<Vec<RecordedRequest>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query: Vec<(String, String)> = req
        .uri()
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };
    let page = query
        .iter()
        .find(|(k, _)| k == "page")
        .map(|(_, v)| v.clone());
    let authorization = header("authorization");
    let content_type = header("content-type");
    let body = req
        .into_body()
        .collect()
        .await
        .map(|b| b.to_bytes().to_vec())
        .unwrap_or_default();

    recorder.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query,
        authorization,
        content_type,
        body,
    });

    let (status, body) = routes
        .get(&(method.clone(), path.clone(), page))
        .or_else(|| routes.get(&(method, path, None)))
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, r#"{"code":404,"message":"Not found.","data":{}}"#.to_string()));

    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap())
}

/// 指定した有効期限のJWT（署名は検証されないためダミー）
pub fn make_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"u1xxxxxxxxxxxxx","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

/// 1ページ分の一覧レスポンス
pub fn list_body(items: &[serde_json::Value]) -> String {
    serde_json::json!({
        "page": 1,
        "perPage": 500,
        "totalItems": -1,
        "totalPages": -1,
        "items": items,
    })
    .to_string()
}

pub fn customer(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "created": "2024-06-01 08:00:00.000Z",
        "updated": "2024-06-01 08:00:00.000Z",
        "collectionId": "7huq9rbs25jyrwv",
        "collectionName": "customers",
        "name": name,
    })
}

pub fn expense_type(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "created": "2024-06-01 08:00:00.000Z",
        "updated": "2024-06-01 08:00:00.000Z",
        "collectionId": "7xzqxa4a17wgr05",
        "collectionName": "expense_types",
        "name": name,
    })
}

pub fn expense(id: &str, amount: f64, type_name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "created": "2024-06-30 10:00:00.000Z",
        "updated": "2024-06-30 10:00:00.000Z",
        "collectionId": "frv5fa0d678jb4c",
        "collectionName": "expenses",
        "amount": amount,
        "company_credit_card": false,
        "customer": "c1xxxxxxxxxxxxx",
        "datetime": "2024-06-30 09:15:00.000Z",
        "description": "",
        "expense_type": "t1xxxxxxxxxxxxx",
        "picture": "",
        "user": "u1xxxxxxxxxxxxx",
        "expand": {
            "expense_type": expense_type("t1xxxxxxxxxxxxx", type_name),
        },
    })
}
