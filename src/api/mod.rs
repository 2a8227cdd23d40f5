//! Typed wrappers over the backend endpoints.
//!
//! Each area is a small borrowed handle (`client.portfolios()`, `client.budget()`)
//! so every call goes through the same authenticated [`ApiClient`].

pub mod auth;
pub mod budget;
pub mod portfolio;

pub use auth::Auth;
pub use budget::Budget;
pub use portfolio::Portfolios;

use crate::client::{ApiClient, ApiResponse};
use crate::error::ClientError;
use crate::types::{Acknowledgement, Export, ExportFormat};

impl ApiClient {
    pub fn auth(&self) -> Auth<'_> {
        Auth::new(self)
    }

    pub fn portfolios(&self) -> Portfolios<'_> {
        Portfolios::new(self)
    }

    pub fn budget(&self) -> Budget<'_> {
        Budget::new(self)
    }
}

/// Delete endpoints answer `{"message": ...}` or nothing at all.
pub(crate) fn into_acknowledgement(response: ApiResponse) -> Result<Acknowledgement, ClientError> {
    if response.bytes().iter().all(u8::is_ascii_whitespace) {
        return Ok(Acknowledgement::default());
    }
    response.json()
}

/// Wrap a download, preferring the server's filename over `fallback_stem`.
pub(crate) fn into_export(response: ApiResponse, fallback_stem: &str, format: ExportFormat) -> Export {
    let filename = response
        .filename()
        .unwrap_or_else(|| format!("{}.{}", fallback_stem, format.extension()));
    let content_type = response.content_type().map(str::to_string);

    Export {
        filename,
        content_type,
        bytes: response.into_bytes(),
    }
}
