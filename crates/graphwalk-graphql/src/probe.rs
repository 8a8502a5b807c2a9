//! Credential validity probes.
//!
//! Both are plain GETs against the GraphQL endpoint. Only the status that
//! identifies the failure counts; anything else is taken as valid.

use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::client::API_KEY_HEADER;
use crate::config::ClientConfig;
use crate::error::GraphqlClientError;

fn http_client(config: &ClientConfig) -> Result<reqwest::Client, GraphqlClientError> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout)
        .build()?)
}

fn endpoint(config: &ClientConfig) -> Result<url::Url, GraphqlClientError> {
    config
        .endpoint()
        .map_err(|err| GraphqlClientError::Configuration(err.to_string()))
}

/// `false` when the account host answers an unauthenticated GET with 404.
#[instrument(skip(config), fields(account = %config.account))]
pub async fn probe_account(config: &ClientConfig) -> Result<bool, GraphqlClientError> {
    let response = http_client(config)?.get(endpoint(config)?).send().await?;
    debug!(status = %response.status(), "account probe");
    Ok(response.status() != StatusCode::NOT_FOUND)
}

/// `false` when an authenticated GET is answered with 401.
#[instrument(skip(config), fields(account = %config.account))]
pub async fn probe_api_key(config: &ClientConfig) -> Result<bool, GraphqlClientError> {
    let response = http_client(config)?
        .get(endpoint(config)?)
        .header(API_KEY_HEADER, &config.api_key)
        .send()
        .await?;
    debug!(status = %response.status(), "API key probe");
    Ok(response.status() != StatusCode::UNAUTHORIZED)
}
