//! アクセスルール式
//!
//! コレクションのアクセスルール（list/view/create/update/delete）を
//! 構文木として扱います。評価そのものはバックエンドが行いますが、
//! ルールの組み立て・文字列化と、契約確認用の参照評価器を提供します。
//!
//! 文法:
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "(" expr ")" | compare
//! compare := operand ( "=" | "!=" ) operand
//! operand := "@request.auth." path | path | "\"" text "\""
//! ```

use crate::shared::errors::{AppError, AppResult};
use serde_json::Value;
use std::fmt;

const AUTH_PREFIX: &str = "@request.auth.";

/// 比較演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
        }
    }
}

/// 比較の被演算子
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// 認証済みリクエスト元のフィールド（`@request.auth.id` など）
    Requester(String),
    /// 対象レコードのフィールドパス（`user.id` など）
    Record(String),
    /// 文字列リテラル
    Literal(String),
}

/// ルール式の構文木
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    And(Box<RuleExpr>, Box<RuleExpr>),
    Or(Box<RuleExpr>, Box<RuleExpr>),
}

impl RuleExpr {
    /// 比較式を作成
    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        RuleExpr::Compare { left, op, right }
    }

    /// `@request.auth.id != ""`（認証済みであること）
    pub fn authenticated() -> Self {
        Self::compare(
            Operand::Requester("id".to_string()),
            CompareOp::NotEq,
            Operand::Literal(String::new()),
        )
    }

    /// `@request.auth.id = <relation>.id`（リクエスト元がレコードの所有者であること）
    pub fn requester_owns(relation_field: &str) -> Self {
        Self::compare(
            Operand::Requester("id".to_string()),
            CompareOp::Eq,
            Operand::Record(format!("{relation_field}.id")),
        )
    }

    /// `@request.auth.role = "<role>"`
    pub fn requester_has_role(role: &str) -> Self {
        Self::compare(
            Operand::Requester("role".to_string()),
            CompareOp::Eq,
            Operand::Literal(role.to_string()),
        )
    }

    pub fn and(self, other: RuleExpr) -> Self {
        RuleExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: RuleExpr) -> Self {
        RuleExpr::Or(Box::new(self), Box::new(other))
    }

    /// リクエスト元とレコードに対して式を評価する
    ///
    /// 未認証の場合、`@request.auth.*` は空文字列として扱われる。
    pub fn evaluate(&self, requester: Option<&Value>, record: &Value) -> bool {
        match self {
            RuleExpr::Compare { left, op, right } => {
                let l = resolve_operand(left, requester, record);
                let r = resolve_operand(right, requester, record);
                match op {
                    CompareOp::Eq => l == r,
                    CompareOp::NotEq => l != r,
                }
            }
            RuleExpr::And(a, b) => a.evaluate(requester, record) && b.evaluate(requester, record),
            RuleExpr::Or(a, b) => a.evaluate(requester, record) || b.evaluate(requester, record),
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parent_is_and: bool) -> fmt::Result {
        match self {
            RuleExpr::Or(_, _) if parent_is_and => write!(f, "({self})"),
            RuleExpr::And(_, _) if !parent_is_and => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Requester(path) => write!(f, "{AUTH_PREFIX}{path}"),
            Operand::Record(path) => write!(f, "{path}"),
            Operand::Literal(text) => {
                write!(f, "\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
            }
        }
    }
}

impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleExpr::Compare { left, op, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
            RuleExpr::And(a, b) => {
                a.fmt_child(f, true)?;
                write!(f, " && ")?;
                b.fmt_child(f, true)
            }
            RuleExpr::Or(a, b) => {
                a.fmt_child(f, false)?;
                write!(f, " || ")?;
                b.fmt_child(f, false)
            }
        }
    }
}

/// 保存形式と対応するアクセスルール
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    /// 未設定（システム既定: 管理者のみ許可）
    Locked,
    /// 空文字列（誰でも許可）
    Public,
    /// 式による制限
    Expr(RuleExpr),
}

impl AccessRule {
    /// 保存形式（`Option<String>`）から解析する
    pub fn from_stored(stored: Option<&str>) -> AppResult<Self> {
        match stored {
            None => Ok(AccessRule::Locked),
            Some(text) if text.trim().is_empty() => Ok(AccessRule::Public),
            Some(text) => parse_rule(text).map(AccessRule::Expr),
        }
    }

    /// 保存形式に変換する
    pub fn to_stored(&self) -> Option<String> {
        match self {
            AccessRule::Locked => None,
            AccessRule::Public => Some(String::new()),
            AccessRule::Expr(expr) => Some(expr.to_string()),
        }
    }

    /// 一般利用者のリクエストを許可するかどうか
    ///
    /// 管理者（superuser）はルールを迂回するため、ここでは扱わない。
    pub fn allows(&self, requester: Option<&Value>, record: &Value) -> bool {
        match self {
            AccessRule::Locked => false,
            AccessRule::Public => true,
            AccessRule::Expr(expr) => expr.evaluate(requester, record),
        }
    }

    /// レコード一覧をルールで絞り込む（リスト操作の参照実装）
    pub fn filter_visible<'a>(
        &self,
        requester: Option<&Value>,
        records: &'a [Value],
    ) -> Vec<&'a Value> {
        records
            .iter()
            .filter(|record| self.allows(requester, record))
            .collect()
    }
}

impl From<RuleExpr> for AccessRule {
    fn from(expr: RuleExpr) -> Self {
        AccessRule::Expr(expr)
    }
}

fn resolve_operand(operand: &Operand, requester: Option<&Value>, record: &Value) -> String {
    match operand {
        Operand::Literal(text) => text.clone(),
        Operand::Requester(path) => requester
            .and_then(|auth| resolve_path(auth, path))
            .unwrap_or_default(),
        Operand::Record(path) => resolve_path(record, path).unwrap_or_default(),
    }
}

/// ドット区切りのパスを解決する
///
/// リレーションが展開されていない場合（値がID文字列）、`<field>.id` はそのIDとして扱う。
fn resolve_path(value: &Value, path: &str) -> Option<String> {
    let mut current = value;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            Value::String(id) if segment == "id" && segments.peek().is_none() => {
                return Some(id.clone());
            }
            _ => return None,
        }
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Eq,
    NotEq,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> AppResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(AppError::validation("文字列リテラルが閉じていません")),
                        Some('\\') if matches!(chars.get(i + 1), Some('"' | '\\')) => {
                            text.push(chars[i + 1]);
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c == '@' || c == '_' || c.is_ascii_alphanumeric() => {
                let start = i;
                while i < chars.len()
                    && (chars[i] == '@'
                        || chars[i] == '_'
                        || chars[i] == '.'
                        || chars[i].is_ascii_alphanumeric())
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(AppError::validation(format!(
                    "ルール式に不正な文字があります: '{other}'"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> AppResult<RuleExpr> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            expr = expr.or(self.parse_and()?);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> AppResult<RuleExpr> {
        let mut expr = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            expr = expr.and(self.parse_unary()?);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> AppResult<RuleExpr> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let expr = self.parse_or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(expr),
                _ => Err(AppError::validation("括弧が閉じていません")),
            };
        }

        let left = self.parse_operand()?;
        let op = match self.next() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::NotEq,
            other => {
                return Err(AppError::validation(format!(
                    "比較演算子が必要です: {other:?}"
                )))
            }
        };
        let right = self.parse_operand()?;
        Ok(RuleExpr::compare(left, op, right))
    }

    fn parse_operand(&mut self) -> AppResult<Operand> {
        match self.next() {
            Some(Token::Str(text)) => Ok(Operand::Literal(text)),
            Some(Token::Ident(ident)) => match ident.strip_prefix(AUTH_PREFIX) {
                Some(path) if !path.is_empty() => Ok(Operand::Requester(path.to_string())),
                Some(_) => Err(AppError::validation("@request.auth のフィールドが空です")),
                None if ident.starts_with('@') => Err(AppError::validation(format!(
                    "未対応のマクロです: {ident}"
                ))),
                None => Ok(Operand::Record(ident)),
            },
            other => Err(AppError::validation(format!(
                "被演算子が必要です: {other:?}"
            ))),
        }
    }
}

/// ルール式の文字列を解析する
pub fn parse_rule(input: &str) -> AppResult<RuleExpr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(AppError::validation("ルール式が空です"));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(AppError::validation(format!(
            "ルール式の末尾に余分なトークンがあります: {input}"
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use serde_json::json;

    fn owner_rule() -> RuleExpr {
        RuleExpr::authenticated().and(RuleExpr::requester_owns("user"))
    }

    fn owner_or_admin_rule() -> RuleExpr {
        RuleExpr::authenticated().and(
            RuleExpr::requester_owns("user").or(RuleExpr::requester_has_role("admin")),
        )
    }

    #[test]
    fn test_render_matches_backend_syntax() {
        assert_eq!(
            owner_rule().to_string(),
            "@request.auth.id != \"\" && @request.auth.id = user.id"
        );
        assert_eq!(
            owner_or_admin_rule().to_string(),
            "@request.auth.id != \"\" && (@request.auth.id = user.id || @request.auth.role = \"admin\")"
        );
    }

    #[test]
    fn test_parse_then_render_is_stable() {
        for rule in [owner_rule(), owner_or_admin_rule(), RuleExpr::authenticated()] {
            let text = rule.to_string();
            assert_eq!(parse_rule(&text).unwrap(), rule);
        }
    }

    #[test]
    fn test_parse_tolerates_trailing_newline() {
        let text = "@request.auth.id != \"\" && (@request.auth.id = user.id || @request.auth.role = \"admin\")\n";
        assert_eq!(parse_rule(text).unwrap(), owner_or_admin_rule());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_rule("").is_err());
        assert!(parse_rule("@request.auth.id").is_err());
        assert!(parse_rule("(@request.auth.id = user.id").is_err());
        assert!(parse_rule("@request.auth.id = \"open").is_err());
        assert!(parse_rule("@collection.users.id = id").is_err());
        assert!(parse_rule("id = id id").is_err());
    }

    #[test]
    fn test_evaluate_owner_rule() {
        let rule = owner_rule();
        let me = json!({"id": "user1", "role": "member"});
        let mine = json!({"id": "e1", "user": "user1"});
        let theirs = json!({"id": "e2", "user": "user2"});

        assert!(rule.evaluate(Some(&me), &mine));
        assert!(!rule.evaluate(Some(&me), &theirs));
        assert!(!rule.evaluate(None, &mine));
    }

    #[test]
    fn test_evaluate_with_expanded_relation() {
        let rule = owner_rule();
        let me = json!({"id": "user1"});
        let record = json!({"id": "e1", "user": {"id": "user1", "name": "Anna"}});
        assert!(rule.evaluate(Some(&me), &record));
    }

    #[test]
    fn test_admin_sees_everything_with_owner_or_admin_rule() {
        let rule = AccessRule::from(owner_or_admin_rule());
        let admin = json!({"id": "boss", "role": "admin"});
        let rows = vec![
            json!({"id": "e1", "user": "user1"}),
            json!({"id": "e2", "user": "user2"}),
        ];
        assert_eq!(rule.filter_visible(Some(&admin), &rows).len(), 2);
        assert!(rule.filter_visible(None, &rows).is_empty());
    }

    #[test]
    fn test_access_rule_stored_forms() {
        assert_eq!(AccessRule::from_stored(None).unwrap(), AccessRule::Locked);
        assert_eq!(AccessRule::from_stored(Some("")).unwrap(), AccessRule::Public);
        assert_eq!(AccessRule::Locked.to_stored(), None);
        assert_eq!(AccessRule::Public.to_stored(), Some(String::new()));

        let record = json!({"id": "x"});
        assert!(!AccessRule::Locked.allows(None, &record));
        assert!(AccessRule::Public.allows(None, &record));
    }

    #[test]
    fn test_literal_escaping() {
        let rule = RuleExpr::requester_has_role("a\"b");
        let text = rule.to_string();
        assert_eq!(text, "@request.auth.role = \"a\\\"b\"");
        assert_eq!(parse_rule(&text).unwrap(), rule);
    }

    #[test]
    fn test_trailing_backslash_survives_storage() {
        let rule = AccessRule::from(RuleExpr::requester_has_role("a\\"));
        let stored = rule.to_stored().unwrap();
        assert_eq!(stored, "@request.auth.role = \"a\\\\\"");
        assert_eq!(AccessRule::from_stored(Some(&stored)).unwrap(), rule);
    }

    #[quickcheck]
    fn prop_literal_round_trips(literal: String, other: String) -> bool {
        let expr = RuleExpr::requester_has_role(&literal)
            .or(RuleExpr::compare(
                Operand::Record("description".to_string()),
                CompareOp::NotEq,
                Operand::Literal(other),
            ))
            .and(RuleExpr::authenticated());
        parse_rule(&expr.to_string()).ok() == Some(expr)
    }

    #[test]
    fn test_bare_record_field_operand() {
        let rule = parse_rule("id = @request.auth.id").unwrap();
        let me = json!({"id": "user1"});
        assert!(rule.evaluate(Some(&me), &json!({"id": "user1"})));
        assert!(!rule.evaluate(Some(&me), &json!({"id": "user2"})));
    }
}
