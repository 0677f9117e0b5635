//! データストアの一括更新
//!
//! customers、expense_types、expenses の順に取得し、それぞれのストアを
//! 置き換えます。取得に失敗したコレクションはログに記録して読み飛ばし、
//! そのストアは以前の内容のまま残します。

use super::store::CollectionStore;
use crate::features::records::{
    Collections, CustomersResponse, ExpenseTypesResponse, ExpensesResponse, Identified,
    ListOptions, RecordService, EXPENSE_EXPAND,
};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

/// 経費管理で使う3つのコレクションストア
#[derive(Debug, Default)]
pub struct DataStores {
    pub customers: CollectionStore<CustomersResponse>,
    pub expense_types: CollectionStore<ExpenseTypesResponse>,
    pub expenses: CollectionStore<ExpensesResponse>,
}

impl DataStores {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 更新対象の絞り込み
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateFilter {
    /// 指定した場合、このIDのレコードだけをストアに残す
    pub expense_id: Option<String>,
}

impl UpdateFilter {
    /// 全件
    pub fn all() -> Self {
        Self::default()
    }

    /// 1レコードのみ
    pub fn record(id: impl Into<String>) -> Self {
        Self {
            expense_id: Some(id.into()),
        }
    }

    fn matches<T: Identified>(&self, item: &T) -> bool {
        self.expense_id
            .as_deref()
            .map_or(true, |id| item.record_id() == id)
    }
}

/// コレクションの取得元
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch_customers(&self, options: &ListOptions) -> AppResult<Vec<CustomersResponse>>;

    async fn fetch_expense_types(
        &self,
        options: &ListOptions,
    ) -> AppResult<Vec<ExpenseTypesResponse>>;

    async fn fetch_expenses(&self, options: &ListOptions) -> AppResult<Vec<ExpensesResponse>>;
}

#[async_trait]
impl RecordFetcher for RecordService {
    async fn fetch_customers(&self, options: &ListOptions) -> AppResult<Vec<CustomersResponse>> {
        self.get_full_list(Collections::Customers, options).await
    }

    async fn fetch_expense_types(
        &self,
        options: &ListOptions,
    ) -> AppResult<Vec<ExpenseTypesResponse>> {
        self.get_full_list(Collections::ExpenseTypes, options).await
    }

    async fn fetch_expenses(&self, options: &ListOptions) -> AppResult<Vec<ExpensesResponse>> {
        self.get_full_list(Collections::Expenses, options).await
    }
}

/// 更新結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// 置き換えたコレクション
    pub updated: Vec<Collections>,
    /// 取得に失敗したコレクション（ストアは以前のまま）
    pub failed: Vec<Collections>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// データストア更新
#[derive(Debug)]
pub struct StoreLoader<F> {
    fetcher: F,
    stores: Arc<DataStores>,
}

impl<F: RecordFetcher> StoreLoader<F> {
    pub fn new(fetcher: F, stores: Arc<DataStores>) -> Self {
        Self { fetcher, stores }
    }

    pub fn stores(&self) -> &Arc<DataStores> {
        &self.stores
    }

    /// 3つのコレクションを順に取得し、ストアを置き換える
    ///
    /// 取得は作成日時の新しい順。フィルターの絞り込みは取得後に行う。
    /// 同時に複数回呼ばれた場合は、後から書き込んだ結果が残る。
    pub async fn refresh_all(&self, filter: &UpdateFilter) -> RefreshReport {
        let mut report = RefreshReport::default();
        let options = ListOptions::default();

        let customers = self.fetcher.fetch_customers(&options).await;
        apply(
            Collections::Customers,
            &self.stores.customers,
            customers,
            filter,
            &mut report,
        );

        let expense_types = self.fetcher.fetch_expense_types(&options).await;
        apply(
            Collections::ExpenseTypes,
            &self.stores.expense_types,
            expense_types,
            filter,
            &mut report,
        );

        let expense_options = ListOptions::default().with_expand(EXPENSE_EXPAND);
        let expenses = self.fetcher.fetch_expenses(&expense_options).await;
        apply(
            Collections::Expenses,
            &self.stores.expenses,
            expenses,
            filter,
            &mut report,
        );

        report
    }
}

fn apply<T: Identified>(
    collection: Collections,
    store: &CollectionStore<T>,
    fetched: AppResult<Vec<T>>,
    filter: &UpdateFilter,
    report: &mut RefreshReport,
) {
    match fetched {
        Ok(items) => {
            let items: Vec<T> = items.into_iter().filter(|item| filter.matches(item)).collect();
            log::debug!("{collection} ストアを更新します: {}件", items.len());
            store.replace(items);
            report.updated.push(collection);
        }
        Err(e) => {
            log::error!("{collection} の取得に失敗しました（ストアは更新しません）: {e}");
            report.failed.push(collection);
        }
    }
}
