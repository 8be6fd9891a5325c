//! Azure AD client-credentials flow.
//!
//! URL building, the form body of the token request and parsing of both the
//! success and the rejection responses. The network call itself lives in
//! [`crate::manager`].

use magpie_types::{AccessToken, MagpieError, Result, token::DEFAULT_EXPIRES_IN};
use regex::Regex;
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::Value;
use std::sync::LazyLock;

static AADSTS_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AADSTS(\d+)").expect("valid regex pattern"));

/// Token endpoint of `tenant` under `authority`.
#[must_use]
pub fn token_url(authority: &str, tenant: &str) -> String {
    format!(
        "{}/{tenant}/oauth2/v2.0/token",
        authority.trim_end_matches('/')
    )
}

/// Form body of a client-credentials token request.
#[must_use]
pub fn client_credentials_form<'a>(
    client_id: &'a str,
    client_secret: &'a SecretString,
    scope: &'a str,
) -> [(&'static str, &'a str); 4] {
    [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret.expose_secret()),
        ("scope", scope),
    ]
}

/// Parse a successful token endpoint response.
///
/// `expires_in` may be a number or a numeric string and defaults to one hour.
///
/// # Errors
///
/// Returns [`MagpieError::Auth`] if `access_token` is missing.
pub fn parse_token_response(json: &Value) -> Result<AccessToken> {
    let access_token = json
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MagpieError::Auth("missing access_token in token response".into()))?;

    let expires_in = match json.get("expires_in") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .unwrap_or(DEFAULT_EXPIRES_IN);

    Ok(AccessToken::new(access_token, expires_in))
}

/// Which credential an `AADSTS` error code points at, if the code is known.
#[must_use]
pub fn credential_hint(code: &str) -> Option<&'static str> {
    match code {
        "7000215" | "7000222" => Some("DATABRICKS_CLIENT_SECRET is invalid or expired"),
        "700016" => Some("DATABRICKS_CLIENT_ID was not found in the tenant"),
        "90002" => Some("DATABRICKS_TENANT_ID was not found"),
        _ => None,
    }
}

/// Build an error message for a rejected token request.
///
/// Only repeats what the response body states: the `error_description` (or
/// `error`) field and, for a recognised `AADSTS` code, the credential it names.
#[must_use]
pub fn describe_rejection(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let description = parsed
        .as_ref()
        .and_then(|v| {
            v.get("error_description")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
        })
        .map_or_else(|| body.trim().to_string(), str::to_string);

    let hint = AADSTS_CODE
        .captures(&description)
        .and_then(|c| c.get(1))
        .and_then(|m| credential_hint(m.as_str()));

    let description = description.lines().next().unwrap_or_default();
    match (hint, description.is_empty()) {
        (Some(hint), _) => format!("token request rejected (HTTP {status}): {hint}: {description}"),
        (None, false) => format!("token request rejected (HTTP {status}): {description}"),
        (None, true) => format!("token request rejected (HTTP {status})"),
    }
}
