pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio CLI - Command-line client for the portfolio and budget tracking API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Backend base URL (overrides FOLIO_API_URL)")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Portfolios, assets and their profit/loss")]
    Portfolio {
        #[command(subcommand)]
        cmd: commands::portfolio::PortfolioCommands,
    },

    #[command(about = "Income and expense tracking")]
    Budget {
        #[command(subcommand)]
        cmd: commands::budget::BudgetCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let result = dispatch(cli, output_format.clone()).await;

    // JSON callers get a structured error on stdout; text mode leaves reporting to main
    if let (Err(e), OutputFormat::Json) = (&result, &output_format) {
        let code = e.downcast_ref::<ClientError>().map(ClientError::error_code);
        utils::output_error(&output_format, &e.to_string(), code)?;
        std::process::exit(1);
    }
    result
}

async fn dispatch(cli: Cli, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = config::CliContext::load(cli.api_url.as_deref(), output_format.clone())?;

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, &ctx, output_format).await,
        Commands::Portfolio { cmd } => commands::portfolio::handle(cmd, &ctx, output_format).await,
        Commands::Budget { cmd } => commands::budget::handle(cmd, &ctx, output_format).await,
    }
}
