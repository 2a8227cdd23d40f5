use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{resolve_password, CliContext};
use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;
use crate::session::TokenClaims;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout from server")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "Register new user and log in")]
    Register {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = &ctx.client;

    match cmd {
        AuthCommands::Login { email, password } => {
            let password = resolve_password(password)?;
            let tokens = client.auth().login(&email, &password).await?;
            output_success(
                &output_format,
                &format!("Logged in as {}", email),
                Some(json!({
                    "email": email,
                    "token_type": tokens.token_type,
                    "has_refresh_token": tokens.refresh_token.is_some(),
                })),
            )
        }
        AuthCommands::Logout => {
            client.auth().logout()?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let session = client.session();
            let claims = session.access_token().as_deref().and_then(TokenClaims::inspect);
            let expires_at = claims.as_ref().and_then(TokenClaims::expires_at);
            let status = json!({
                "server": client.config().base_url,
                "authenticated": session.is_authenticated(),
                "has_refresh_token": session.refresh_token().is_some(),
                "subject": claims.as_ref().and_then(|c| c.sub.clone()),
                "expires_at": expires_at,
                "session_file": ctx.store_path,
            });

            output_data(&output_format, &status, || {
                let mut text = format!("Server: {}\n", client.config().base_url);
                if !session.is_authenticated() {
                    text.push_str("Not logged in\n");
                    return text;
                }
                text.push_str("Logged in\n");
                if let Some(sub) = claims.as_ref().and_then(|c| c.sub.as_deref()) {
                    text.push_str(&format!("Subject: {}\n", sub));
                }
                let expired = claims.as_ref().is_some_and(|c| c.is_expired_at(chrono::Utc::now()));
                match expires_at {
                    Some(exp) if expired => {
                        text.push_str(&format!("Access token expired at {} (will refresh on next request)\n", exp))
                    }
                    Some(exp) => text.push_str(&format!("Access token expires at {}\n", exp)),
                    None => {}
                }
                if session.refresh_token().is_none() {
                    text.push_str("No refresh token stored\n");
                }
                text
            })
        }
        AuthCommands::Refresh => {
            client.refresh().await?;
            output_success(&output_format, "Access token refreshed", None)
        }
        AuthCommands::Whoami => match client.auth().restore_user().await? {
            Some(user) => output_data(&output_format, &user, || {
                format!(
                    "{}\nID: {}\nMember since: {}\n",
                    user.email,
                    user.id,
                    user.created_at.format("%Y-%m-%d")
                )
            }),
            None => anyhow::bail!("Not logged in"),
        },
        AuthCommands::Register { email, password } => {
            let password = resolve_password(password)?;
            let user = client.auth().register_and_login(&email, &password).await?;
            output_success(
                &output_format,
                &format!("Registered and logged in as {}", user.email),
                Some(json!({ "user": user })),
            )
        }
    }
}
