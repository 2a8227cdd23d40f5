pub mod request;
mod refresh;

pub use request::{ApiResponse, RequestBody, RequestOptions};
pub use reqwest::Method;

use std::sync::Arc;
use std::time::Instant;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{LogoutReason, NoopObserver, Session, SessionObserver};
use refresh::{Entry, RefreshGate, RefreshOutcome};

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const REFRESH_PATH: &str = "/refresh";

/// Token pair returned by `/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// HTTP client for the backend that signs requests with the session's access
/// token and transparently recovers from its expiry.
///
/// A 401 on an ordinary request triggers at most one `/refresh` call no matter
/// how many requests fail at once; the others wait for that call and are
/// replayed with its token. If the refresh fails the session is cleared and
/// the observer hears about it once.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: Arc<Session>,
    observer: Arc<dyn SessionObserver>,
    refresh: RefreshGate,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        session: Arc<Session>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| ClientError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            session,
            observer,
            refresh: RefreshGate::default(),
        })
    }

    /// Client without a logout observer
    pub fn with_session(config: ClientConfig, session: Arc<Session>) -> Result<Self, ClientError> {
        Self::new(config, session, Arc::new(NoopObserver))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether a refresh call is currently outstanding
    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Issue a request relative to the base URL.
    ///
    /// Network failures and non-401 error responses are returned untouched.
    /// A 401 is recovered through a shared refresh and a single replay; if
    /// that is impossible the result is [`ClientError::AuthExpired`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<ApiResponse, ClientError> {
        let signed_with = self.session.access_token();
        let response = self
            .send(&method, path, &body, &options, signed_with.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return response.into_result();
        }

        // Credential endpoints report bad credentials with 401; never refresh for them
        if is_credential_endpoint(path) {
            let detail = ClientError::from_response(401, response.bytes());
            return Err(ClientError::AuthExpired(detail.to_string()));
        }

        let token = self.recover_access_token(signed_with.as_deref()).await?;
        let replayed = self.send(&method, path, &body, &options, Some(&token)).await?;

        if replayed.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "Refreshed access token rejected, not retrying again");
            self.force_logout_if_current(&token, LogoutReason::TokenRejected);
            return Err(ClientError::auth_expired());
        }

        replayed.into_result()
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<ApiResponse, ClientError> {
        self.request(Method::GET, path, RequestBody::Empty, options).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.request(Method::DELETE, path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.get(path, options).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, RequestBody::json(body)?, RequestOptions::default())
            .await?
            .json()
    }

    /// Exchange credentials for a token pair and store it in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ClientError> {
        let body = RequestBody::form([("username", email), ("password", password)]);
        let tokens: TokenPair = self
            .request(Method::POST, LOGIN_PATH, body, RequestOptions::default())
            .await?
            .json()?;

        self.session
            .set_tokens(&tokens.access_token, tokens.refresh_token.as_deref())?;
        tracing::info!(
            has_refresh = tokens.refresh_token.is_some(),
            "Logged in"
        );
        Ok(tokens)
    }

    /// User-initiated logout: drop the stored credentials. The observer is not notified.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session.clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Refresh the access token now, sharing any refresh already in flight.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        self.shared_refresh().await
    }

    /// Token to replay a 401'd request with.
    async fn recover_access_token(&self, signed_with: Option<&str>) -> Result<String, ClientError> {
        match (self.session.access_token(), signed_with) {
            // A refresh settled after this request was signed; reuse its token
            (Some(current), Some(used)) if current != used => {
                tracing::debug!("Access token changed while request was in flight, replaying");
                Ok(current)
            }
            // The session was cleared after this request was signed
            (None, Some(_)) => Err(ClientError::auth_expired()),
            _ => self.shared_refresh().await,
        }
    }

    async fn shared_refresh(&self) -> RefreshOutcome {
        let leader = loop {
            match self.refresh.enter() {
                Entry::Leader(guard) => break guard,
                Entry::Waiter(rx) => match rx.await {
                    Ok(outcome) => return outcome,
                    // The leader was cancelled before settling; the first waiter back takes over
                    Err(_) => {
                        tracing::debug!("Refresh leader abandoned, re-entering");
                        continue;
                    }
                },
            }
        };

        match self.call_refresh().await {
            Ok(token) => {
                if let Err(e) = self.session.set_access_token(&token) {
                    tracing::error!("Failed to persist refreshed access token: {}", e);
                }
                let outcome = Ok(token);
                let woken = leader.settle(&outcome);
                tracing::info!(replayed = woken + 1, "Access token refreshed");
                outcome
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Token refresh failed, forcing logout");
                if let Err(e) = self.session.clear() {
                    tracing::error!("Failed to clear stored session: {}", e);
                }
                let outcome = Err(ClientError::auth_expired());
                leader.settle(&outcome);
                self.observer
                    .on_forced_logout(&LogoutReason::RefreshFailed(reason));
                outcome
            }
        }
    }

    /// One `/refresh` round trip. Any failure is described as a plain reason.
    async fn call_refresh(&self) -> Result<String, String> {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or_else(|| "no refresh token stored".to_string())?;

        let body = RequestBody::Json(json!({ "refresh_token": refresh_token }));
        let response = self
            .send(&Method::POST, REFRESH_PATH, &body, &RequestOptions::default(), None)
            .await
            .map_err(|e| match e {
                ClientError::Network { cause, .. } => format!("refresh call failed: {}", cause),
                other => other.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(format!(
                "refresh rejected with status {}",
                response.status().as_u16()
            ));
        }

        let parsed: RefreshResponse = response.json().map_err(|e| e.to_string())?;
        Ok(parsed.access_token)
    }

    fn force_logout_if_current(&self, token: &str, reason: LogoutReason) {
        let cleared = match self.session.clear_if_access_token(token) {
            Ok(cleared) => cleared,
            Err(e) => {
                // In-memory credentials are gone even when the store failed
                tracing::error!("Failed to clear stored session: {}", e);
                true
            }
        };
        if cleared {
            self.observer.on_forced_logout(&reason);
        }
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        body: &RequestBody,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let url = self.config.endpoint(path);
        let mut builder = self.http.request(method.clone(), &url);

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(pairs) => builder.form(pairs),
        };

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%method, path, "Request failed without a response: {}", e);
            ClientError::from(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(ClientError::from)?;

        tracing::debug!(
            %method,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            authenticated = token.is_some(),
            "API request"
        );

        Ok(ApiResponse::new(status, headers, bytes.to_vec()))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("session", &self.session)
            .finish()
    }
}

/// `/login`, `/register` and `/refresh` never trigger a refresh themselves.
pub fn is_credential_endpoint(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    let path = path.strip_prefix('/').unwrap_or(path);
    matches!(path, "login" | "register" | "refresh")
}
