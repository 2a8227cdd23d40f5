//! Shared types used across the codebase
//!
//! Wire models for the portfolio and budget endpoints. Monetary values are
//! whatever the backend computed; nothing here derives P&L on its own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `{"message": "..."}` acknowledgement returned by delete endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: String,
}

// ========== Portfolios ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioKind {
    Crypto,
    Stocks,
    Etf,
    Metals,
}

impl PortfolioKind {
    pub fn label(&self) -> &'static str {
        match self {
            PortfolioKind::Crypto => "Crypto",
            PortfolioKind::Stocks => "Stocks",
            PortfolioKind::Etf => "ETF",
            PortfolioKind::Metals => "Metals",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PortfolioKind,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPortfolio {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PortfolioKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub id: i64,
    pub symbol: String,
    pub amount: f64,
    pub purchase_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEntry {
    pub symbol: String,
    pub amount: f64,
    pub purchase_price: f64,
}

impl NewEntry {
    /// Symbols are stored upper-cased and trimmed
    pub fn new(symbol: &str, amount: f64, purchase_price: f64) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            amount,
            purchase_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(default)]
    pub portfolio_entry_id: Option<i64>,
    pub coin: String,
    pub quantity: f64,
    pub price: f64,
    #[serde(rename = "type")]
    pub side: TradeSide,
    #[serde(with = "timestamp")]
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
    pub coin: String,
    pub quantity: f64,
    pub price: f64,
    #[serde(rename = "type")]
    pub side: TradeSide,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_entry_id: Option<i64>,
}

/// One transaction of an asset, with the backend's P&L figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPnl {
    pub id: i64,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    #[serde(with = "timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub invested: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub profit_loss: Option<f64>,
    #[serde(default)]
    pub profit_loss_percentage: Option<f64>,
}

/// Aggregated position in one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSummary {
    pub symbol: String,
    pub amount: f64,
    #[serde(default, alias = "purchase_price")]
    pub avg_purchase_price: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub total_value: Option<f64>,
    #[serde(default)]
    pub profit_loss: Option<f64>,
    #[serde(default)]
    pub profit_loss_percentage: Option<f64>,
    #[serde(default)]
    pub transactions: Vec<TransactionPnl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    #[serde(default)]
    pub portfolio: Option<Portfolio>,
    #[serde(default)]
    pub items: Vec<AssetSummary>,
    #[serde(default)]
    pub total_invested: f64,
    #[serde(default)]
    pub total_current_value: f64,
    #[serde(default)]
    pub total_profit_loss: f64,
    #[serde(default)]
    pub total_profit_loss_percentage: f64,
}

// ========== Budget ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetTransaction {
    pub id: i64,
    pub category_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<BudgetCategory>,
}

impl BudgetTransaction {
    pub fn kind(&self) -> Option<CategoryKind> {
        self.category.as_ref().map(|c| c.kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBudgetTransaction {
    pub category_id: i64,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// Filters for listing budget transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub category_id: Option<i64>,
    pub kind: Option<CategoryKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    #[serde(default)]
    pub transactions: Vec<BudgetTransaction>,
    #[serde(default)]
    pub categories: Vec<BudgetCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub income: f64,
    pub expense: f64,
    /// Running balance up to and including this day
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetChartData {
    #[serde(default)]
    pub expense_by_category: Vec<CategoryTotal>,
    #[serde(default)]
    pub income_by_category: Vec<CategoryTotal>,
    #[serde(default)]
    pub daily_totals: Vec<DailyTotal>,
    pub total_income: f64,
    pub total_expense: f64,
}

// ========== Query parameters ==========

/// Reporting window accepted by the budget summary, chart and export endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::All => "all",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// A downloaded export file
#[derive(Debug, Clone)]
pub struct Export {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Export {
    pub fn write_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

/// Backend timestamps arrive either as RFC 3339 or as naive UTC (`2024-05-01T12:30:00.123456`).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
                None => Ok(None),
            }
        }
    }
}
