pub mod claims;
pub mod store;

pub use claims::TokenClaims;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

use std::sync::{Arc, Mutex};

use crate::error::ClientError;

/// Why a session was terminated without the user asking for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// The refresh call failed or no refresh token was available
    RefreshFailed(String),
    /// The backend rejected a freshly refreshed access token
    TokenRejected,
}

/// Receives forced-logout notifications; injected into the client at construction.
pub trait SessionObserver: Send + Sync {
    fn on_forced_logout(&self, reason: &LogoutReason);
}

impl<F> SessionObserver for F
where
    F: Fn(&LogoutReason) + Send + Sync,
{
    fn on_forced_logout(&self, reason: &LogoutReason) {
        self(reason)
    }
}

/// Observer that ignores notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_forced_logout(&self, _reason: &LogoutReason) {}
}

#[derive(Debug, Default, Clone)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Access/refresh credentials, mirrored into a persistent [`TokenStore`].
///
/// The in-memory copy is authoritative for request signing; every mutation is
/// written through to the store. A failed write is reported but the in-memory
/// state still changes, so the running process never keeps using a credential
/// it was told to drop.
pub struct Session {
    tokens: Mutex<Tokens>,
    store: Arc<dyn TokenStore>,
}

impl Session {
    /// Empty session backed by `store`; nothing is read from it.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            tokens: Mutex::new(Tokens::default()),
            store,
        }
    }

    /// Session populated from whatever `store` already holds.
    pub fn restore(store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let tokens = Tokens {
            access: store.load(ACCESS_TOKEN_KEY)?,
            refresh: store.load(REFRESH_TOKEN_KEY)?,
        };
        tracing::debug!(
            has_access = tokens.access.is_some(),
            has_refresh = tokens.refresh.is_some(),
            "Restored session"
        );
        Ok(Self {
            tokens: Mutex::new(tokens),
            store,
        })
    }

    /// In-memory session, mainly for tests and embedding.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.lock().refresh.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().access.is_some()
    }

    /// Replace both credentials (login). A missing refresh token removes the stored one.
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), ClientError> {
        let mut tokens = self.lock();
        tokens.access = Some(access.to_string());
        tokens.refresh = refresh.map(str::to_string);

        self.store.save(ACCESS_TOKEN_KEY, access)?;
        match refresh {
            Some(refresh) => self.store.save(REFRESH_TOKEN_KEY, refresh),
            None => self.store.remove(REFRESH_TOKEN_KEY),
        }
    }

    /// Replace the access token only (refresh). The refresh token is reused.
    pub fn set_access_token(&self, access: &str) -> Result<(), ClientError> {
        let mut tokens = self.lock();
        tokens.access = Some(access.to_string());
        self.store.save(ACCESS_TOKEN_KEY, access)
    }

    /// Drop both credentials together.
    pub fn clear(&self) -> Result<(), ClientError> {
        let mut tokens = self.lock();
        *tokens = Tokens::default();
        self.remove_stored()
    }

    /// Clear both credentials only while `access` is still the current access
    /// token. Returns whether anything was cleared.
    pub fn clear_if_access_token(&self, access: &str) -> Result<bool, ClientError> {
        let mut tokens = self.lock();
        if tokens.access.as_deref() != Some(access) {
            return Ok(false);
        }
        *tokens = Tokens::default();
        self.remove_stored()?;
        Ok(true)
    }

    fn remove_stored(&self) -> Result<(), ClientError> {
        let access = self.store.remove(ACCESS_TOKEN_KEY);
        let refresh = self.store.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tokens> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tokens = self.lock();
        f.debug_struct("Session")
            .field("has_access", &tokens.access.is_some())
            .field("has_refresh", &tokens.refresh.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_reads_both_keys() {
        let store = Arc::new(MemoryTokenStore::with_tokens("A1", "R1"));
        let session = Session::restore(store).unwrap();
        assert_eq!(session.access_token().as_deref(), Some("A1"));
        assert_eq!(session.refresh_token().as_deref(), Some("R1"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn set_access_token_keeps_refresh_token() {
        let store = Arc::new(MemoryTokenStore::with_tokens("A1", "R1"));
        let session = Session::restore(store.clone()).unwrap();

        session.set_access_token("A2").unwrap();

        assert_eq!(session.access_token().as_deref(), Some("A2"));
        assert_eq!(session.refresh_token().as_deref(), Some("R1"));
        assert_eq!(store.load(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("A2"));
        assert_eq!(store.load(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
    }

    #[test]
    fn clear_removes_both_from_store() {
        let store = Arc::new(MemoryTokenStore::with_tokens("A1", "R1"));
        let session = Session::restore(store.clone()).unwrap();

        session.clear().unwrap();

        assert!(!session.is_authenticated());
        assert_eq!(session.refresh_token(), None);
        assert_eq!(store.load(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.load(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn clear_if_access_token_ignores_stale_token() {
        let session = Session::in_memory();
        session.set_tokens("A2", Some("R1")).unwrap();

        assert!(!session.clear_if_access_token("A1").unwrap());
        assert_eq!(session.access_token().as_deref(), Some("A2"));

        assert!(session.clear_if_access_token("A2").unwrap());
        assert_eq!(session.access_token(), None);
        assert_eq!(session.refresh_token(), None);
    }

    #[test]
    fn login_without_refresh_token_drops_old_one() {
        let store = Arc::new(MemoryTokenStore::with_tokens("A1", "R1"));
        let session = Session::restore(store.clone()).unwrap();

        session.set_tokens("B1", None).unwrap();

        assert_eq!(session.refresh_token(), None);
        assert_eq!(store.load(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn closures_are_observers() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let observer: Arc<dyn SessionObserver> = Arc::new(move |_: &LogoutReason| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        observer.on_forced_logout(&LogoutReason::TokenRejected);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
