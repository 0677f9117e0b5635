pub mod guard;
pub mod models;
pub mod service;
pub mod store;

pub use guard::{route_guard, GuardDecision, APP_PATH, LOGIN_PATH};
pub use models::{AuthModel, AuthResponse, Registration, StoredCredential};
pub use service::AuthService;
pub use store::CredentialStore;
