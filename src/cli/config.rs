use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::SESSION_EXPIRED_MESSAGE;
use crate::session::{FileTokenStore, LogoutReason, Session, SessionObserver};

/// Everything a command needs: the authenticated client over the on-disk session.
pub struct CliContext {
    pub client: ApiClient,
    pub store_path: std::path::PathBuf,
}

impl CliContext {
    pub fn load(api_url: Option<&str>, output_format: OutputFormat) -> anyhow::Result<Self> {
        let mut config = crate::config::config().clone();
        if let Some(url) = api_url {
            let explicit = ClientConfig::new(url)?;
            config.base_url = explicit.base_url;
        }

        let store = FileTokenStore::open_default(config.config_dir.as_deref())?;
        let store_path = store.path().to_path_buf();
        let session = Session::restore(Arc::new(store))?;

        let observer = Arc::new(ExpiryNotice { output_format });
        let client = ApiClient::new(config, Arc::new(session), observer)?;

        Ok(Self { client, store_path })
    }
}

/// Tells the user once that the stored session is gone
struct ExpiryNotice {
    output_format: OutputFormat,
}

impl SessionObserver for ExpiryNotice {
    fn on_forced_logout(&self, reason: &LogoutReason) {
        tracing::debug!(?reason, "Forced logout");
        if let OutputFormat::Text = self.output_format {
            eprintln!("{}. Run `folio auth login` to continue.", SESSION_EXPIRED_MESSAGE);
        }
    }
}

/// `--password` if given, then `FOLIO_PASSWORD`, then a prompt on stdin
pub fn resolve_password(provided: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    if let Ok(password) = std::env::var("FOLIO_PASSWORD") {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}
