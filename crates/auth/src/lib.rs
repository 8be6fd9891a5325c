//! Bearer token providers for the Databricks REST API.
//!
//! [`ServicePrincipalAuth`] runs the Azure AD client-credentials flow and
//! caches the result; [`StaticToken`] serves a personal access token.
//! [`token_provider`] picks one from the workspace configuration.

pub mod azure;
pub mod manager;
pub mod static_token;

pub use manager::ServicePrincipalAuth;
pub use static_token::StaticToken;

use magpie_config::DatabricksConfig;
use magpie_types::{TokenProvider, traits::Result};
use std::sync::Arc;

/// Build the token provider for `cfg`.
///
/// A configured static token wins over the service principal.
///
/// # Errors
///
/// Returns [`magpie_types::MagpieError::Auth`] if the chosen provider is
/// missing a credential.
pub fn token_provider(cfg: &DatabricksConfig) -> Result<Arc<dyn TokenProvider>> {
    if let Some(token) = cfg.token.as_deref().filter(|t| !t.is_empty()) {
        tracing::info!("using static Databricks token");
        return Ok(Arc::new(StaticToken::new(token)?));
    }
    tracing::info!(client_id = %cfg.client_id, tenant_id = %cfg.tenant_id, "using service principal authentication");
    Ok(Arc::new(ServicePrincipalAuth::new(cfg)?))
}
