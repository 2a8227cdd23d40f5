use crate::client::{ApiClient, RequestOptions};
use crate::error::ClientError;
use crate::types::{
    Acknowledgement, Export, ExportFormat, NewEntry, NewPortfolio, NewTransaction, Portfolio,
    PortfolioEntry, PortfolioKind, PortfolioSummary, Transaction,
};

pub struct Portfolios<'a> {
    client: &'a ApiClient,
}

impl<'a> Portfolios<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Portfolio>, ClientError> {
        self.client.get_json("/portfolios", RequestOptions::default()).await
    }

    pub async fn create(&self, name: &str, kind: PortfolioKind) -> Result<Portfolio, ClientError> {
        let body = NewPortfolio {
            name: name.trim().to_string(),
            kind,
        };
        self.client.post_json("/portfolios", &body).await
    }

    pub async fn delete(&self, id: i64) -> Result<Acknowledgement, ClientError> {
        let response = self.client.delete(&format!("/portfolios/{}", id)).await?;
        super::into_acknowledgement(response)
    }

    /// Positions, per-transaction P&L and totals as computed by the backend
    pub async fn summary(&self, id: i64) -> Result<PortfolioSummary, ClientError> {
        self.client
            .get_json(&format!("/portfolios/{}/summary", id), RequestOptions::default())
            .await
    }

    pub async fn entries(&self, id: i64) -> Result<Vec<PortfolioEntry>, ClientError> {
        self.client
            .get_json(&format!("/portfolios/{}/entries", id), RequestOptions::default())
            .await
    }

    pub async fn add_entry(&self, id: i64, entry: &NewEntry) -> Result<PortfolioEntry, ClientError> {
        self.client
            .post_json(&format!("/portfolios/{}/entries", id), entry)
            .await
    }

    pub async fn delete_entry(&self, id: i64, entry_id: i64) -> Result<Acknowledgement, ClientError> {
        let response = self
            .client
            .delete(&format!("/portfolios/{}/entries/{}", id, entry_id))
            .await?;
        super::into_acknowledgement(response)
    }

    pub async fn transactions(&self, id: i64) -> Result<Vec<Transaction>, ClientError> {
        self.client
            .get_json(&format!("/portfolios/{}/transactions", id), RequestOptions::default())
            .await
    }

    pub async fn create_transaction(
        &self,
        id: i64,
        transaction: &NewTransaction,
    ) -> Result<Transaction, ClientError> {
        self.client
            .post_json(&format!("/portfolios/{}/transactions", id), transaction)
            .await
    }

    pub async fn export(&self, id: i64, format: ExportFormat) -> Result<Export, ClientError> {
        let response = self
            .client
            .get(
                &format!("/portfolios/{}/export/{}", id, format.extension()),
                RequestOptions::default(),
            )
            .await?;
        Ok(super::into_export(
            response,
            &format!("portfolio_{}_export", id),
            format,
        ))
    }
}
