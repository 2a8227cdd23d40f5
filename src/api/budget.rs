use crate::client::{ApiClient, RequestOptions};
use crate::error::ClientError;
use crate::types::{
    Acknowledgement, BudgetCategory, BudgetChartData, BudgetSummary, BudgetTransaction,
    CategoryKind, Export, ExportFormat, NewBudgetTransaction, NewCategory, Period,
    TransactionFilter,
};

/// Largest page the backend accepts for transaction listings
pub const MAX_TRANSACTION_PAGE: u32 = 200;

pub struct Budget<'a> {
    client: &'a ApiClient,
}

impl<'a> Budget<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// The backend seeds a default set on first access
    pub async fn categories(&self) -> Result<Vec<BudgetCategory>, ClientError> {
        self.client
            .get_json("/budget/categories", RequestOptions::default())
            .await
    }

    pub async fn create_category(
        &self,
        name: &str,
        kind: CategoryKind,
        icon: Option<&str>,
    ) -> Result<BudgetCategory, ClientError> {
        let body = NewCategory {
            name: name.trim().to_string(),
            kind,
            icon: icon.map(str::to_string),
        };
        self.client.post_json("/budget/categories", &body).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<Acknowledgement, ClientError> {
        let response = self
            .client
            .delete(&format!("/budget/categories/{}", id))
            .await?;
        super::into_acknowledgement(response)
    }

    pub async fn transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<BudgetTransaction>, ClientError> {
        let options = RequestOptions::new()
            .query_opt("limit", filter.limit.map(|l| l.clamp(1, MAX_TRANSACTION_PAGE)))
            .query_opt("offset", filter.offset)
            .query_opt("category_id", filter.category_id)
            .query_opt("type", filter.kind.map(|k| k.as_str()));
        self.client.get_json("/budget/transactions", options).await
    }

    pub async fn create_transaction(
        &self,
        transaction: &NewBudgetTransaction,
    ) -> Result<BudgetTransaction, ClientError> {
        self.client
            .post_json("/budget/transactions", transaction)
            .await
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<Acknowledgement, ClientError> {
        let response = self
            .client
            .delete(&format!("/budget/transactions/{}", id))
            .await?;
        super::into_acknowledgement(response)
    }

    pub async fn summary(&self, period: Period) -> Result<BudgetSummary, ClientError> {
        self.client
            .get_json("/budget/summary", period_query(period))
            .await
    }

    pub async fn chart_data(&self, period: Period) -> Result<BudgetChartData, ClientError> {
        self.client
            .get_json("/budget/chart-data", period_query(period))
            .await
    }

    pub async fn export(&self, period: Period, format: ExportFormat) -> Result<Export, ClientError> {
        let response = self
            .client
            .get(
                &format!("/budget/export/{}", format.extension()),
                period_query(period),
            )
            .await?;
        Ok(super::into_export(
            response,
            &format!("budget_export_{}", period),
            format,
        ))
    }
}

fn period_query(period: Period) -> RequestOptions {
    RequestOptions::new().query("period", period)
}
