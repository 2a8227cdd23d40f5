use std::path::PathBuf;

use clap::Subcommand;
use futures::future::join_all;
use serde_json::json;

use crate::cli::config::CliContext;
use crate::cli::utils::{output_data, output_empty_collection, output_success};
use crate::cli::OutputFormat;
use crate::format::{currency, percent, PnlTable};
use crate::types::{ExportFormat, NewEntry, NewTransaction, PortfolioKind, TradeSide};

#[derive(Subcommand)]
pub enum PortfolioCommands {
    #[command(about = "List portfolios")]
    List {
        #[arg(long, help = "Also fetch each portfolio's totals")]
        summaries: bool,
    },

    #[command(about = "Create a portfolio")]
    Create {
        #[arg(help = "Portfolio name")]
        name: String,
        #[arg(long = "type", value_enum, default_value = "crypto", help = "Asset class")]
        kind: PortfolioKind,
    },

    #[command(about = "Delete a portfolio and all of its assets")]
    Delete {
        #[arg(help = "Portfolio ID")]
        id: i64,
    },

    #[command(about = "Show positions with profit/loss")]
    Show {
        #[arg(help = "Portfolio ID")]
        id: i64,
        #[arg(long, help = "Expand transactions for a symbol (repeatable)")]
        expand: Vec<String>,
        #[arg(long, help = "Expand every symbol")]
        all: bool,
    },

    #[command(about = "List raw asset entries")]
    Entries {
        #[arg(help = "Portfolio ID")]
        id: i64,
    },

    #[command(about = "Add an asset purchase")]
    Add {
        #[arg(help = "Portfolio ID")]
        id: i64,
        #[arg(help = "Ticker symbol")]
        symbol: String,
        #[arg(help = "Quantity")]
        amount: f64,
        #[arg(help = "Purchase price per unit")]
        price: f64,
    },

    #[command(about = "Remove an asset entry")]
    RemoveEntry {
        #[arg(help = "Portfolio ID")]
        id: i64,
        #[arg(help = "Entry ID")]
        entry_id: i64,
    },

    #[command(about = "List portfolio transactions")]
    Transactions {
        #[arg(help = "Portfolio ID")]
        id: i64,
    },

    #[command(about = "Record a buy or sell")]
    Trade {
        #[arg(help = "Portfolio ID")]
        id: i64,
        #[arg(value_enum, help = "buy or sell")]
        side: TradeSide,
        #[arg(help = "Coin or ticker symbol")]
        coin: String,
        #[arg(help = "Quantity")]
        quantity: f64,
        #[arg(help = "Price per unit")]
        price: f64,
        #[arg(long, help = "Attach to an existing entry")]
        entry: Option<i64>,
    },

    #[command(about = "Download a portfolio export")]
    Export {
        #[arg(help = "Portfolio ID")]
        id: i64,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        #[arg(long, help = "Output path (defaults to the server-provided filename)")]
        out: Option<PathBuf>,
    },
}

pub async fn handle(cmd: PortfolioCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let portfolios = ctx.client.portfolios();

    match cmd {
        PortfolioCommands::List { summaries } => {
            let list = portfolios.list().await?;
            if list.is_empty() {
                return output_empty_collection(&output_format, "portfolios", "No portfolios yet");
            }

            if !summaries {
                return output_data(&output_format, &list, || {
                    list.iter()
                        .map(|p| format!("#{:<5} {:<24} {}\n", p.id, p.name, p.kind.label()))
                        .collect()
                });
            }

            // Concurrent fetches share a single token refresh if the session expired
            let results = join_all(list.iter().map(|p| portfolios.summary(p.id))).await;
            let mut rows = Vec::with_capacity(list.len());
            for (portfolio, result) in list.iter().zip(results) {
                rows.push((portfolio, result?));
            }

            let data: Vec<_> = rows
                .iter()
                .map(|(p, s)| json!({ "portfolio": p, "summary": s }))
                .collect();
            output_data(&output_format, &data, || {
                rows.iter()
                    .map(|(p, s)| {
                        format!(
                            "#{:<5} {:<24} {:<8} {:>16} {:>16} {:>9}\n",
                            p.id,
                            p.name,
                            p.kind.label(),
                            currency(Some(s.total_current_value)),
                            currency(Some(s.total_profit_loss)),
                            percent(Some(s.total_profit_loss_percentage)),
                        )
                    })
                    .collect()
            })
        }
        PortfolioCommands::Create { name, kind } => {
            if name.trim().is_empty() {
                anyhow::bail!("Portfolio name must not be empty");
            }
            let portfolio = portfolios.create(&name, kind).await?;
            output_success(
                &output_format,
                &format!("Created portfolio '{}' (#{})", portfolio.name, portfolio.id),
                Some(json!({ "portfolio": portfolio })),
            )
        }
        PortfolioCommands::Delete { id } => {
            portfolios.delete(id).await?;
            output_success(&output_format, &format!("Deleted portfolio #{}", id), None)
        }
        PortfolioCommands::Show { id, expand, all } => {
            let summary = portfolios.summary(id).await?;
            output_data(&output_format, &summary, || {
                let mut table = PnlTable::new(&summary);
                if all {
                    table.expand_all();
                }
                for symbol in &expand {
                    table.expand(symbol);
                }
                table.render()
            })
        }
        PortfolioCommands::Entries { id } => {
            let entries = portfolios.entries(id).await?;
            if entries.is_empty() {
                return output_empty_collection(&output_format, "entries", "No assets yet");
            }
            output_data(&output_format, &entries, || {
                entries
                    .iter()
                    .map(|e| {
                        format!(
                            "#{:<5} {:<10} {:>14} @ {}\n",
                            e.id,
                            e.symbol,
                            e.amount,
                            currency(Some(e.purchase_price)),
                        )
                    })
                    .collect()
            })
        }
        PortfolioCommands::Add { id, symbol, amount, price } => {
            if amount <= 0.0 || price <= 0.0 {
                anyhow::bail!("Amount and price must be positive");
            }
            let entry = portfolios.add_entry(id, &NewEntry::new(&symbol, amount, price)).await?;
            output_success(
                &output_format,
                &format!("Added {} {} to portfolio #{}", entry.amount, entry.symbol, id),
                Some(json!({ "entry": entry })),
            )
        }
        PortfolioCommands::RemoveEntry { id, entry_id } => {
            portfolios.delete_entry(id, entry_id).await?;
            output_success(&output_format, &format!("Removed entry #{}", entry_id), None)
        }
        PortfolioCommands::Transactions { id } => {
            let transactions = portfolios.transactions(id).await?;
            if transactions.is_empty() {
                return output_empty_collection(&output_format, "transactions", "No transactions yet");
            }
            output_data(&output_format, &transactions, || {
                transactions
                    .iter()
                    .map(|t| {
                        format!(
                            "#{:<5} {} {:<4} {:<8} {:>14} @ {}\n",
                            t.id,
                            t.date.format("%Y-%m-%d %H:%M"),
                            t.side.as_str(),
                            t.coin,
                            t.quantity,
                            currency(Some(t.price)),
                        )
                    })
                    .collect()
            })
        }
        PortfolioCommands::Trade { id, side, coin, quantity, price, entry } => {
            let body = NewTransaction {
                coin: coin.trim().to_uppercase(),
                quantity,
                price,
                side,
                portfolio_entry_id: entry,
            };
            let transaction = portfolios.create_transaction(id, &body).await?;
            output_success(
                &output_format,
                &format!("Recorded {} of {} {}", side.as_str(), transaction.quantity, transaction.coin),
                Some(json!({ "transaction": transaction })),
            )
        }
        PortfolioCommands::Export { id, format, out } => {
            let export = portfolios.export(id, format).await?;
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
