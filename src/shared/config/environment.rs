use crate::shared::errors::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// ローカル開発時のバックエンドURL
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:8090";

/// コンテナ間通信時のバックエンドURL（サービス名で解決）
pub const CONTAINER_BASE_URL: &str = "http://pb:8090";

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// 開発環境（ローカルのバックエンドに接続）
    Development,
    /// コンテナ環境（サービス名でバックエンドに接続）
    Container,
    /// プロダクション環境（自身のオリジンに接続）
    Production,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "container" | "docker" => Some(Environment::Container),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    /// 環境名（小文字）
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Container => "container",
            Environment::Production => "production",
        }
    }
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: Environment,
    /// デバッグモードの有効/無効
    pub debug_mode: bool,
    /// ログレベル
    pub log_level: String,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        let environment = get_environment();
        let debug_mode = environment == Environment::Development;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if debug_mode {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        Self {
            environment,
            debug_mode,
            log_level,
        }
    }

    /// プロダクション環境かどうかを判定
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// 開発環境かどうかを判定
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. `/.dockerenv` が存在する場合は Container
/// 3. デバッグビルドの場合は Development
/// 4. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        if let Some(env) = Environment::parse(&env_var) {
            log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
            return env;
        }
        log::warn!("ENVIRONMENT の値が不正です: {env_var}（自動判定にフォールバック）");
    }

    detect_environment(Path::new("/.dockerenv"), cfg!(debug_assertions))
}

/// マーカーファイルとビルド設定から環境を判定する
fn detect_environment(docker_marker: &Path, debug_build: bool) -> Environment {
    let env = if docker_marker.exists() {
        Environment::Container
    } else if debug_build {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: marker={} debug_assertions={debug_build} -> {env:?}",
        docker_marker.display()
    );
    env
}

/// 環境に応じたバックエンドのベースURLを決定する
///
/// # 引数
/// * `env` - 実行環境
/// * `override_url` - 明示的な上書き（`POCKETBASE_URL`）
/// * `origin` - プロダクション時の自身のオリジン（`APP_ORIGIN`）
///
/// # 戻り値
/// 末尾のスラッシュを取り除いたベースURL
pub fn select_base_url(
    env: Environment,
    override_url: Option<&str>,
    origin: Option<&str>,
) -> AppResult<String> {
    let base = match override_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url.to_string(),
        None => match env {
            Environment::Development => DEVELOPMENT_BASE_URL.to_string(),
            Environment::Container => CONTAINER_BASE_URL.to_string(),
            Environment::Production => origin
                .filter(|o| !o.trim().is_empty())
                .map(|o| o.to_string())
                .ok_or_else(|| {
                    AppError::configuration(
                        "プロダクション環境では APP_ORIGIN または POCKETBASE_URL が必要です",
                    )
                })?,
        },
    };

    let parsed = url::Url::parse(base.trim())
        .map_err(|e| AppError::configuration(format!("ベースURLが不正です: {base} ({e})")))?;

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// 環境変数からバックエンドのベースURLを取得する
pub fn base_url_from_env() -> AppResult<String> {
    let env = get_environment();
    let override_url = std::env::var("POCKETBASE_URL").ok();
    let origin = std::env::var("APP_ORIGIN").ok();
    select_base_url(env, override_url.as_deref(), origin.as_deref())
}

/// 環境に応じたカタログデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_catalog.db"
/// - それ以外: "catalog.db"
pub fn get_catalog_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_catalog.db",
        Environment::Container | Environment::Production => "catalog.db",
    }
}

/// カタログデータベースのパス（`SPESR_CATALOG_DB` で上書き可能）
pub fn catalog_db_path() -> PathBuf {
    std::env::var("SPESR_CATALOG_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(get_catalog_filename(get_environment())))
}

/// 認証情報ファイルのパス（`SPESR_AUTH_FILE` で上書き可能）
pub fn auth_file_path() -> AppResult<PathBuf> {
    if let Ok(path) = std::env::var("SPESR_AUTH_FILE") {
        return Ok(PathBuf::from(path));
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::configuration("データディレクトリが取得できません"))?;
    Ok(data_dir.join("spesr").join("pocketbase_auth.json"))
}

/// 環境に応じた.envファイルを読み込む
pub fn load_environment_variables() {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    let env_file = match environment.as_str() {
        "production" => ".env.production",
        _ => ".env",
    };

    match dotenv::from_filename(env_file) {
        Ok(_) => {
            log::info!("{env_file}ファイルを読み込みました");
        }
        Err(_) => {
            if env_file != ".env" && dotenv::dotenv().is_ok() {
                log::warn!("{env_file}が見つからないため、デフォルトの.envファイルを読み込みました");
            } else {
                log::debug!("環境変数ファイルが見つかりません。直接設定された環境変数を使用します");
            }
        }
    }
}

/// ログシステムを初期化する
///
/// 二度目以降の呼び出しは無視される（テストとバイナリの両方から呼ばれるため）。
pub fn initialize_logging_system() {
    let env_config = EnvironmentConfig::from_env();

    let log_level = match env_config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    let initialized = env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .is_ok();

    if initialized {
        log::info!(
            "ログシステムを初期化しました: level={}, environment={}",
            env_config.log_level,
            env_config.environment.as_str()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_base_url_per_environment() {
        assert_eq!(
            select_base_url(Environment::Development, None, None).unwrap(),
            "http://localhost:8090"
        );
        assert_eq!(
            select_base_url(Environment::Container, None, None).unwrap(),
            "http://pb:8090"
        );
        assert_eq!(
            select_base_url(
                Environment::Production,
                None,
                Some("https://spesr.example.ch/")
            )
            .unwrap(),
            "https://spesr.example.ch"
        );
    }

    #[test]
    fn test_select_base_url_override_wins() {
        let url = select_base_url(
            Environment::Container,
            Some("http://127.0.0.1:9999"),
            Some("https://ignored.example"),
        )
        .unwrap();
        assert_eq!(url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_production_without_origin_is_configuration_error() {
        let result = select_base_url(Environment::Production, None, Some("  "));
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let result = select_base_url(Environment::Development, Some("not a url"), None);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_detect_environment() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join(".dockerenv");
        assert_eq!(detect_environment(&marker, true), Environment::Development);
        assert_eq!(detect_environment(&marker, false), Environment::Production);

        std::fs::write(&marker, "").unwrap();
        assert_eq!(detect_environment(&marker, true), Environment::Container);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("Production"), Some(Environment::Production));
        assert_eq!(Environment::parse("docker"), Some(Environment::Container));
        assert_eq!(Environment::parse("staging"), None);
    }

    #[test]
    fn test_get_catalog_filename() {
        assert_eq!(
            get_catalog_filename(Environment::Development),
            "dev_catalog.db"
        );
        assert_eq!(get_catalog_filename(Environment::Production), "catalog.db");
    }

    #[test]
    fn test_environment_config_methods() {
        let dev_config = EnvironmentConfig {
            environment: Environment::Development,
            debug_mode: true,
            log_level: "debug".to_string(),
        };
        assert!(dev_config.is_development());
        assert!(!dev_config.is_production());
    }

    #[test]
    fn test_initialize_logging_twice_does_not_panic() {
        initialize_logging_system();
        initialize_logging_system();
    }
}
