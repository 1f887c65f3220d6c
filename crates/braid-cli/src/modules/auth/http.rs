use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use crate::errors::CliError;
use crate::modules::config::{Environment, KafkaClusterConfig, Organization, User};

#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    pub token: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub user: User,
    pub organization: Organization,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

/// Remote auth SDK surface, narrowed to what the core needs. Token expiry
/// is decoded locally from the JWT claims, never via a remote call.
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn login(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthTokens, CliError>;

    async fn user(&self, server: &str, auth_token: &str) -> Result<UserProfile, CliError>;
}

/// Control-plane lookups used by the dynamic context resolver.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Returns `Ok(None)` for an unknown cluster id.
    async fn describe_kafka_cluster(
        &self,
        server: &str,
        auth_token: &str,
        environment_id: &str,
        cluster_id: &str,
    ) -> Result<Option<KafkaClusterConfig>, CliError>;
}

pub struct HttpAuthClient {
    pub client: reqwest::Client,
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn login(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthTokens, CliError> {
        let url = format!("{}/api/sessions", server.trim_end_matches('/'));
        let payload = serde_json::json!({ "email": username, "password": password });
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CliError::InvalidLogin);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CliError::Auth {
                message: format!("login failed: {status} {body}"),
            });
        }
        response.json::<AuthTokens>().await.map_err(request_error)
    }

    async fn user(&self, server: &str, auth_token: &str) -> Result<UserProfile, CliError> {
        let url = format!("{}/api/me", server.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {auth_token}"))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CliError::Auth {
                message: format!("failed to fetch user profile: {status} {body}"),
            });
        }
        response.json::<UserProfile>().await.map_err(request_error)
    }
}

pub struct HttpControlPlaneClient {
    pub client: reqwest::Client,
}

#[derive(Deserialize)]
struct KafkaClusterResponse {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    bootstrap: String,
    #[serde(default)]
    rest_endpoint: String,
}

#[async_trait]
impl ControlPlaneClient for HttpControlPlaneClient {
    async fn describe_kafka_cluster(
        &self,
        server: &str,
        auth_token: &str,
        environment_id: &str,
        cluster_id: &str,
    ) -> Result<Option<KafkaClusterConfig>, CliError> {
        let url = format!(
            "{}/api/environments/{environment_id}/clusters/{cluster_id}",
            server.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {auth_token}"))
            .send()
            .await
            .map_err(request_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CliError::Auth {
                message: format!("failed to describe cluster: {status} {body}"),
            });
        }
        let cluster: KafkaClusterResponse = response.json().await.map_err(request_error)?;
        Ok(Some(KafkaClusterConfig {
            id: cluster.id,
            name: cluster.name,
            bootstrap: cluster.bootstrap,
            rest_endpoint: cluster.rest_endpoint,
            ..Default::default()
        }))
    }
}

fn request_error(err: reqwest::Error) -> CliError {
    CliError::Auth {
        message: err.to_string(),
    }
}
