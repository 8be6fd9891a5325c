//! Personal access token mode.

use async_trait::async_trait;
use magpie_types::{MagpieError, TokenProvider, traits::Result};
use secrecy::{ExposeSecret as _, SecretString};

/// A fixed bearer token, e.g. a Databricks personal access token.
pub struct StaticToken(SecretString);

impl StaticToken {
    /// # Errors
    ///
    /// Returns [`MagpieError::Auth`] if the token is blank.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(MagpieError::Auth("DATABRICKS_TOKEN is empty".into()));
        }
        Ok(Self(SecretString::from(token)))
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn get_token(&self) -> Result<String> {
        Ok(self.0.expose_secret().to_string())
    }
}
