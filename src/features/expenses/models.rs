//! 経費作成用の入力モデル
//!
//! 送信前に必須リレーション・金額・画像サイズを検証します。

use crate::features::migrations::PICTURE_MAX_SIZE;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// バックエンドの日時形式
const BACKEND_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

/// 添付する経費画像
#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PictureUpload {
    /// ファイルから読み込む
    pub fn from_path(path: &std::path::Path) -> AppResult<Self> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| AppError::validation("画像ファイル名が取得できません"))?
            .to_string();
        let bytes = std::fs::read(path)?;
        Ok(Self { filename, bytes })
    }

    /// ファイルサイズを検証
    pub fn validate_size(&self) -> AppResult<()> {
        if self.bytes.len() as u64 > PICTURE_MAX_SIZE {
            return Err(AppError::validation("画像ファイルサイズが10MBを超えています"));
        }
        Ok(())
    }

    /// 拡張子からContent-Typeを推定
    pub fn content_type(&self) -> &'static str {
        let extension = std::path::Path::new(&self.filename)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

/// 経費の作成内容
#[derive(Debug, Clone)]
pub struct ExpenseDraft {
    pub datetime: DateTime<Utc>,
    pub customer: String,
    pub expense_type: String,
    pub description: String,
    pub amount: f64,
    pub company_credit_card: bool,
    /// 所有者（通常はログイン中のアカウント）
    pub user: String,
    pub picture: Option<PictureUpload>,
}

/// JSONで送信する経費の本体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpensePayload {
    pub id: String,
    pub datetime: String,
    pub customer: String,
    pub expense_type: String,
    pub description: String,
    pub amount: f64,
    pub company_credit_card: bool,
    pub user: String,
}

impl ExpenseDraft {
    /// 送信前の検証
    pub fn validate(&self) -> AppResult<()> {
        for (field, value) in [
            ("customer", &self.customer),
            ("expense_type", &self.expense_type),
            ("user", &self.user),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{field} は必須です")));
            }
        }

        if !self.amount.is_finite() {
            return Err(AppError::validation("金額が数値ではありません"));
        }

        if let Some(picture) = &self.picture {
            picture.validate_size()?;
        }

        Ok(())
    }

    /// 指定したレコードIDで送信用の本体を作る
    pub fn to_payload(&self, id: &str) -> ExpensePayload {
        ExpensePayload {
            id: id.to_string(),
            datetime: self.datetime.format(BACKEND_DATETIME_FORMAT).to_string(),
            customer: self.customer.clone(),
            expense_type: self.expense_type.clone(),
            description: self.description.clone(),
            amount: self.amount,
            company_credit_card: self.company_credit_card,
            user: self.user.clone(),
        }
    }
}

impl ExpensePayload {
    /// multipartフォームのテキスト項目
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("datetime", self.datetime.clone()),
            ("customer", self.customer.clone()),
            ("expense_type", self.expense_type.clone()),
            ("description", self.description.clone()),
            ("amount", self.amount.to_string()),
            ("company_credit_card", self.company_credit_card.to_string()),
            ("user", self.user.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> ExpenseDraft {
        ExpenseDraft {
            datetime: Utc.with_ymd_and_hms(2024, 6, 30, 9, 15, 0).unwrap(),
            customer: "c1xxxxxxxxxxxxx".to_string(),
            expense_type: "t1xxxxxxxxxxxxx".to_string(),
            description: "Zürich".to_string(),
            amount: 42.0,
            company_credit_card: false,
            user: "u1xxxxxxxxxxxxx".to_string(),
            picture: None,
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_missing_relation_rejected() {
        let mut missing_customer = draft();
        missing_customer.customer = " ".to_string();
        assert!(matches!(
            missing_customer.validate(),
            Err(AppError::Validation(_))
        ));

        let mut missing_user = draft();
        missing_user.user.clear();
        assert!(missing_user.validate().is_err());
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        let mut nan = draft();
        nan.amount = f64::NAN;
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_picture_size_limit() {
        let mut with_picture = draft();
        with_picture.picture = Some(PictureUpload {
            filename: "receipt.jpg".to_string(),
            bytes: vec![0; PICTURE_MAX_SIZE as usize],
        });
        assert!(with_picture.validate().is_ok());

        with_picture.picture = Some(PictureUpload {
            filename: "receipt.jpg".to_string(),
            bytes: vec![0; PICTURE_MAX_SIZE as usize + 1],
        });
        assert!(with_picture.validate().is_err());
    }

    #[test]
    fn test_payload_uses_backend_datetime_format() {
        let payload = draft().to_payload("abcdefghijklmno");
        assert_eq!(payload.datetime, "2024-06-30 09:15:00.000Z");
        assert_eq!(payload.id, "abcdefghijklmno");
        assert!(payload
            .form_fields()
            .contains(&("company_credit_card", "false".to_string())));
    }

    #[test]
    fn test_content_type() {
        let picture = PictureUpload {
            filename: "Beleg.JPG".to_string(),
            bytes: vec![],
        };
        assert_eq!(picture.content_type(), "image/jpeg");
    }
}
