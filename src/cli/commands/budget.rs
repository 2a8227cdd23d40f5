use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::cli::config::CliContext;
use crate::cli::utils::{output_data, output_empty_collection, output_success};
use crate::cli::OutputFormat;
use crate::format::{money, render_budget_summary, render_chart};
use crate::types::{CategoryKind, ExportFormat, NewBudgetTransaction, Period, TransactionFilter};

const CURRENCY_SYMBOL: &str = "$";

#[derive(Subcommand)]
pub enum BudgetCommands {
    #[command(about = "List budget categories")]
    Categories,

    #[command(about = "Create a budget category")]
    AddCategory {
        #[arg(help = "Category name")]
        name: String,
        #[arg(long = "type", value_enum, help = "income or expense")]
        kind: CategoryKind,
        #[arg(long, help = "Emoji shown next to the category")]
        icon: Option<String>,
    },

    #[command(about = "Delete a budget category")]
    RemoveCategory {
        #[arg(help = "Category ID")]
        id: i64,
    },

    #[command(about = "Record an income or expense")]
    Add {
        #[arg(help = "Category ID")]
        category_id: i64,
        #[arg(help = "Amount")]
        amount: f64,
        #[arg(long, short = 'd', help = "Description")]
        description: Option<String>,
        #[arg(long, help = "Date (YYYY-MM-DD), defaults to now")]
        date: Option<NaiveDate>,
    },

    #[command(about = "Delete a budget transaction")]
    Remove {
        #[arg(help = "Transaction ID")]
        id: i64,
    },

    #[command(about = "List budget transactions")]
    Transactions {
        #[arg(long, help = "Maximum number of rows (1-200)")]
        limit: Option<u32>,
        #[arg(long, help = "Rows to skip")]
        offset: Option<u32>,
        #[arg(long, help = "Only this category")]
        category: Option<i64>,
        #[arg(long = "type", value_enum, help = "Only income or expense")]
        kind: Option<CategoryKind>,
    },

    #[command(about = "Show totals and recent transactions")]
    Summary {
        #[arg(long, value_enum, default_value = "month")]
        period: Period,
        #[arg(long = "type", value_enum, help = "Only income or expense rows")]
        kind: Option<CategoryKind>,
    },

    #[command(about = "Show category breakdown and daily balance")]
    Chart {
        #[arg(long, value_enum, default_value = "month")]
        period: Period,
    },

    #[command(about = "Download a budget export")]
    Export {
        #[arg(long, value_enum, default_value = "month")]
        period: Period,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        #[arg(long, help = "Output path (defaults to the server-provided filename)")]
        out: Option<PathBuf>,
    },
}

pub async fn handle(cmd: BudgetCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let budget = ctx.client.budget();

    match cmd {
        BudgetCommands::Categories => {
            let categories = budget.categories().await?;
            if categories.is_empty() {
                return output_empty_collection(&output_format, "categories", "No categories");
            }
            output_data(&output_format, &categories, || {
                categories
                    .iter()
                    .map(|c| {
                        format!(
                            "#{:<5} {} {:<20} {}\n",
                            c.id,
                            c.icon.as_deref().unwrap_or(" "),
                            c.name,
                            c.kind.as_str()
                        )
                    })
                    .collect()
            })
        }
        BudgetCommands::AddCategory { name, kind, icon } => {
            if name.trim().is_empty() {
                anyhow::bail!("Category name must not be empty");
            }
            let category = budget.create_category(&name, kind, icon.as_deref()).await?;
            output_success(
                &output_format,
                &format!("Created {} category '{}' (#{})", category.kind.as_str(), category.name, category.id),
                Some(json!({ "category": category })),
            )
        }
        BudgetCommands::RemoveCategory { id } => {
            budget.delete_category(id).await?;
            output_success(&output_format, &format!("Deleted category #{}", id), None)
        }
        BudgetCommands::Add { category_id, amount, description, date } => {
            if amount <= 0.0 {
                anyhow::bail!("Amount must be positive");
            }
            let date = date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
                .or_else(|| Some(Utc::now()));
            let body = NewBudgetTransaction {
                category_id,
                amount,
                description: description.filter(|d| !d.trim().is_empty()),
                date,
            };
            let transaction = budget.create_transaction(&body).await?;
            output_success(
                &output_format,
                &format!("Recorded {} (#{})", money(transaction.amount, CURRENCY_SYMBOL), transaction.id),
                Some(json!({ "transaction": transaction })),
            )
        }
        BudgetCommands::Remove { id } => {
            budget.delete_transaction(id).await?;
            output_success(&output_format, &format!("Deleted transaction #{}", id), None)
        }
        BudgetCommands::Transactions { limit, offset, category, kind } => {
            let filter = TransactionFilter {
                limit,
                offset,
                category_id: category,
                kind,
            };
            let transactions = budget.transactions(&filter).await?;
            if transactions.is_empty() {
                return output_empty_collection(&output_format, "transactions", "No transactions");
            }
            output_data(&output_format, &transactions, || {
                transactions
                    .iter()
                    .map(|t| {
                        let name = t.category.as_ref().map(|c| c.name.as_str()).unwrap_or("Unknown");
                        let signed = match t.kind() {
                            Some(CategoryKind::Expense) => -t.amount,
                            _ => t.amount,
                        };
                        format!(
                            "#{:<5} {} {:<18} {:>14}  {}\n",
                            t.id,
                            t.date.format("%Y-%m-%d"),
                            name,
                            money(signed, CURRENCY_SYMBOL),
                            t.description
                        )
                    })
                    .collect()
            })
        }
        BudgetCommands::Summary { period, kind } => {
            let summary = budget.summary(period).await?;
            output_data(&output_format, &summary, || {
                render_budget_summary(&summary, kind, CURRENCY_SYMBOL)
            })
        }
        BudgetCommands::Chart { period } => {
            let chart = budget.chart_data(period).await?;
            output_data(&output_format, &chart, || render_chart(&chart, CURRENCY_SYMBOL))
        }
        BudgetCommands::Export { period, format, out } => {
            let export = budget.export(period, format).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&export.filename));
            export.write_to(&path)?;
            output_success(
                &output_format,
                &format!("Saved {} ({} bytes)", path.display(), export.bytes.len()),
                Some(json!({ "path": path, "bytes": export.bytes.len() })),
            )
        }
    }
}
