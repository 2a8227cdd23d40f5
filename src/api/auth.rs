use crate::client::{ApiClient, TokenPair, REGISTER_PATH};
use crate::error::ClientError;
use crate::types::{Credentials, User};

pub struct Auth<'a> {
    client: &'a ApiClient,
}

impl<'a> Auth<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, ClientError> {
        self.client
            .post_json(REGISTER_PATH, &Credentials { email, password })
            .await
    }

    /// Create an account and immediately log into it.
    pub async fn register_and_login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let user = self.register(email, password).await?;
        tracing::info!(user_id = %user.id, "Registered, logging in");
        self.login(email, password).await?;
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ClientError> {
        self.client.login(email, password).await
    }

    /// Current user profile
    pub async fn me(&self) -> Result<User, ClientError> {
        self.client.get_json("/me", Default::default()).await
    }

    /// Load the profile for a restored session.
    ///
    /// Returns `None` without a request when no token is stored. A stored token
    /// the backend no longer honours (even after a refresh) is dropped.
    pub async fn restore_user(&self) -> Result<Option<User>, ClientError> {
        if !self.client.session().is_authenticated() {
            return Ok(None);
        }

        match self.me().await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_auth_expired() => {
                self.client.logout()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.client.logout()
    }
}
