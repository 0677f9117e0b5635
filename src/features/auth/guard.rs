//! ルートガード
//!
//! 表示しようとしているパスと認証状態から遷移先を決める純粋関数です。

/// 認証後の遷移先
pub const APP_PATH: &str = "/app/";
/// 未認証時の遷移先
pub const LOGIN_PATH: &str = "/login/";

/// ガードの判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// そのまま表示する
    Stay,
    /// 指定パスへリダイレクトする
    Redirect(&'static str),
}

/// パスと認証状態から遷移先を判定する
///
/// 認証済みでログイン・登録・トップページを開いた場合はアプリへ、
/// 未認証で `/app` 配下を開いた場合はログインページへ誘導する。
pub fn route_guard(pathname: &str, authenticated: bool) -> GuardDecision {
    if authenticated {
        match pathname {
            "/login/" | "/signup/" | "/" => GuardDecision::Redirect(APP_PATH),
            _ => GuardDecision::Stay,
        }
    } else if pathname.contains("/app") {
        GuardDecision::Redirect(LOGIN_PATH)
    } else {
        GuardDecision::Stay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_user_leaves_entry_pages() {
        for path in ["/", "/login/", "/signup/"] {
            assert_eq!(route_guard(path, true), GuardDecision::Redirect(APP_PATH));
        }
        assert_eq!(route_guard("/app/expenses/", true), GuardDecision::Stay);
    }

    #[test]
    fn test_anonymous_user_is_sent_to_login() {
        assert_eq!(route_guard("/app/", false), GuardDecision::Redirect(LOGIN_PATH));
        assert_eq!(
            route_guard("/app/expenses/", false),
            GuardDecision::Redirect(LOGIN_PATH)
        );
        assert_eq!(route_guard("/login/", false), GuardDecision::Stay);
        assert_eq!(route_guard("/", false), GuardDecision::Stay);
    }
}
