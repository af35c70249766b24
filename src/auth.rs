//! Bearer tokens for the Compute Engine API.

use std::fmt;
use std::sync::Arc;

use gcp_auth::TokenProvider;

use crate::config::ApiConfig;
use crate::error::{ApiError, GcexError};
use crate::paths;

pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";

/// Where request tokens come from. Clients ask for a token on every call.
#[derive(Clone)]
pub enum TokenSource {
    /// Token taken verbatim from the environment; never refreshed.
    Static(String),
    /// Application-default credentials. The provider caches the token and
    /// refreshes it before it expires.
    Provider(Arc<dyn TokenProvider>),
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("TokenSource::Static(..)"),
            Self::Provider(_) => f.write_str("TokenSource::Provider(..)"),
        }
    }
}

impl TokenSource {
    pub async fn token(&self) -> Result<String, ApiError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Provider(provider) => provider
                .token(&[COMPUTE_SCOPE])
                .await
                .map(|token| token.as_str().to_string())
                .map_err(|e| ApiError::Auth {
                    message: e.to_string(),
                }),
        }
    }
}

/// Resolve the token source: the configured environment variable first,
/// then application-default credentials (a `GOOGLE_APPLICATION_CREDENTIALS`
/// key file, the gcloud ADC file, the metadata server, or the gcloud CLI).
/// One token is fetched up front so bad credentials fail before any call.
pub async fn token_source(api: &ApiConfig) -> Result<TokenSource, GcexError> {
    let env_name = api.access_token_env.as_str();
    if let Some(source) = from_environment(std::env::var(env_name).ok()) {
        tracing::debug!(var = env_name, "using access token from environment");
        return Ok(source);
    }

    match std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS") {
        Some(path) => tracing::debug!(path = %path.to_string_lossy(), "GOOGLE_APPLICATION_CREDENTIALS is set"),
        None => tracing::debug!("GOOGLE_APPLICATION_CREDENTIALS is not set"),
    }

    let provider = gcp_auth::provider()
        .await
        .map_err(|e| credentials_error(env_name, e))?;
    let source = TokenSource::Provider(provider);
    source
        .token()
        .await
        .map_err(|e| credentials_error(env_name, e))?;
    tracing::debug!("using application-default credentials");
    Ok(source)
}

fn from_environment(value: Option<String>) -> Option<TokenSource> {
    value
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(TokenSource::Static)
}

fn credentials_error(env_name: &str, cause: impl fmt::Display) -> GcexError {
    GcexError::Credentials {
        message: format!("{env_name} is not set and application-default credentials failed: {cause}"),
        remediation: remediation(env_name),
    }
}

fn remediation(env_name: &str) -> String {
    let adc = paths::adc_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/gcloud/application_default_credentials.json".into());
    format!(
        "run `gcloud auth application-default login`, or set GOOGLE_APPLICATION_CREDENTIALS \
         to a service account key, or export {env_name} with a valid access token.\n\
         Check that {adc} exists and that the Compute Engine API is enabled for the project."
    )
}
