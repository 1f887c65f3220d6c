use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use tracing::debug;

use crate::errors::CliError;

/// Release feed check. `check_for_updates` returns whether a newer release
/// exists and the notice to print when it does.
#[async_trait]
pub trait UpdateClient: Send + Sync {
    async fn check_for_updates(
        &self,
        name: &str,
        current_version: &str,
        force: bool,
    ) -> Result<(bool, String), CliError>;
}

#[derive(Deserialize)]
struct ReleaseInfo {
    version: String,
}

pub struct HttpUpdateClient {
    client: reqwest::Client,
    releases_url: String,
}

impl HttpUpdateClient {
    pub fn new(releases_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            releases_url: releases_url.into(),
        }
    }
}

#[async_trait]
impl UpdateClient for HttpUpdateClient {
    async fn check_for_updates(
        &self,
        name: &str,
        current_version: &str,
        _force: bool,
    ) -> Result<(bool, String), CliError> {
        let response = self
            .client
            .get(self.releases_url.as_str())
            .send()
            .await
            .map_err(|err| CliError::Auth {
                message: format!("update check request failed: {err}"),
            })?;
        let release: ReleaseInfo = response.json().await.map_err(|err| CliError::Auth {
            message: format!("malformed release feed: {err}"),
        })?;

        let current = Version::parse(current_version.trim_start_matches('v'));
        let latest = Version::parse(release.version.trim_start_matches('v'));
        match (current, latest) {
            (Ok(current), Ok(latest)) if latest > current => Ok((
                true,
                format!("A newer version of {name} is available: v{latest} (running v{current}). "),
            )),
            (Ok(_), Ok(_)) => Ok((false, String::new())),
            (current, latest) => {
                debug!(?current, ?latest, "unparseable version in update check");
                Ok((false, String::new()))
            }
        }
    }
}

/// Used when update checks are disabled or no feed is configured.
pub struct DisabledUpdateClient;

#[async_trait]
impl UpdateClient for DisabledUpdateClient {
    async fn check_for_updates(
        &self,
        _name: &str,
        _current_version: &str,
        _force: bool,
    ) -> Result<(bool, String), CliError> {
        Ok((false, String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn newer_release_reported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/releases/latest")
            .with_status(200)
            .with_body(r#"{"version": "v2.1.0"}"#)
            .create_async()
            .await;

        let client = HttpUpdateClient::new(format!("{}/releases/latest", server.url()));
        let (available, message) = client
            .check_for_updates("braid", "2.0.0", false)
            .await
            .expect("check");
        assert!(available);
        assert!(message.contains("v2.1.0"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn same_release_is_quiet() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/releases/latest")
            .with_status(200)
            .with_body(r#"{"version": "2.0.0"}"#)
            .create_async()
            .await;

        let client = HttpUpdateClient::new(format!("{}/releases/latest", server.url()));
        let (available, _) = client
            .check_for_updates("braid", "2.0.0", false)
            .await
            .expect("check");
        assert!(!available);
    }
}
