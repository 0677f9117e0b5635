/// 環境設定とログ初期化
pub mod environment;

pub use environment::{
    auth_file_path, base_url_from_env, catalog_db_path, get_catalog_filename, get_environment,
    initialize_logging_system, load_environment_variables, select_base_url, Environment,
    EnvironmentConfig,
};
