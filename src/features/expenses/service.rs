//! 経費サービス
//!
//! 経費の作成・削除と画像URLの組み立てを行います。

use super::models::{ExpenseDraft, PictureUpload};
use crate::features::records::{Collections, ExpensesResponse, RecordService};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::generate_record_id;
use reqwest::multipart::{Form, Part};

/// 経費サービス
#[derive(Debug, Clone)]
pub struct ExpenseService {
    records: RecordService,
}

impl ExpenseService {
    pub fn new(records: RecordService) -> Self {
        Self { records }
    }

    /// 経費を作成する
    ///
    /// レコードIDはクライアント側で生成する。画像がある場合はmultipartで送信する。
    pub async fn create_expense(&self, draft: &ExpenseDraft) -> AppResult<ExpensesResponse> {
        draft.validate()?;

        let id = generate_record_id();
        let payload = draft.to_payload(&id);

        let created: ExpensesResponse = match &draft.picture {
            Some(picture) => {
                let mut form = Form::new();
                for (name, value) in payload.form_fields() {
                    form = form.text(name, value);
                }
                form = form.part("picture", picture_part(picture)?);
                self.records
                    .create_multipart(Collections::Expenses, form)
                    .await?
            }
            None => self.records.create(Collections::Expenses, &payload).await?,
        };

        log::info!("経費を作成しました: id={}", created.id());
        Ok(created)
    }

    /// 経費を削除する
    pub async fn delete_expense(&self, id: &str) -> AppResult<()> {
        self.records.delete(Collections::Expenses, id).await?;
        log::info!("経費を削除しました: id={id}");
        Ok(())
    }

    /// 経費画像のURL（画像がない場合はNone）
    pub fn picture_url(&self, expense: &ExpensesResponse) -> Option<String> {
        if expense.record.picture.is_empty() {
            return None;
        }
        Some(self.records.file_url(
            &expense.system.collection_id,
            expense.id(),
            &expense.record.picture,
        ))
    }
}

fn picture_part(picture: &PictureUpload) -> AppResult<Part> {
    Part::bytes(picture.bytes.clone())
        .file_name(picture.filename.clone())
        .mime_str(picture.content_type())
        .map_err(|e| AppError::validation(format!("画像の形式が不正です: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::CredentialStore;
    use crate::features::records::{BaseSystemFields, ExpensesRecord, RecordResponse};
    use crate::shared::api_client::{ApiClient, ApiClientConfig};
    use std::sync::Arc;

    fn service() -> ExpenseService {
        let api = ApiClient::new_with_config(ApiClientConfig::with_base_url("http://localhost:8090"))
            .unwrap();
        ExpenseService::new(RecordService::new(api, Arc::new(CredentialStore::in_memory())))
    }

    fn expense(picture: &str) -> ExpensesResponse {
        RecordResponse {
            system: BaseSystemFields {
                id: "e1xxxxxxxxxxxxx".to_string(),
                collection_id: "frv5fa0d678jb4c".to_string(),
                ..Default::default()
            },
            record: ExpensesRecord {
                picture: picture.to_string(),
                ..Default::default()
            },
            expand: None,
        }
    }

    #[test]
    fn test_picture_url() {
        let service = service();
        assert_eq!(
            service.picture_url(&expense("beleg.png")).as_deref(),
            Some("http://localhost:8090/api/files/frv5fa0d678jb4c/e1xxxxxxxxxxxxx/beleg.png")
        );
        assert!(service.picture_url(&expense("")).is_none());
    }

    #[tokio::test]
    async fn test_invalid_draft_is_rejected_before_sending() {
        let draft = ExpenseDraft {
            datetime: chrono::Utc::now(),
            customer: String::new(),
            expense_type: "t1xxxxxxxxxxxxx".to_string(),
            description: String::new(),
            amount: 1.0,
            company_credit_card: false,
            user: "u1xxxxxxxxxxxxx".to_string(),
            picture: None,
        };
        let result = service().create_expense(&draft).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
