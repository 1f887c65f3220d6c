use super::types::{ApiKeyPair, Context, Environment, KafkaClusterConfig, KafkaEnvContext};
use crate::errors::CliError;

/// Environment key used for cluster bookkeeping when the context has no
/// cloud login (on-prem and API-key contexts).
pub const DEFAULT_ENV_KEY: &str = "default";

impl Context {
    pub fn new(
        name: &str,
        platform_name: &str,
        credential_name: &str,
        netrc_machine_name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            platform_name: platform_name.to_string(),
            credential_name: credential_name.to_string(),
            kafka_cluster_context: Some(Default::default()),
            schema_registry_clusters: Default::default(),
            netrc_machine_name: netrc_machine_name.to_string(),
            last_org_id: String::new(),
            state: Default::default(),
        }
    }

    /// Id of the environment the context currently operates in, if a cloud
    /// login selected one.
    #[must_use]
    pub fn current_environment_id(&self) -> Option<&str> {
        self.state
            .auth
            .as_ref()
            .and_then(|auth| auth.environment.as_ref())
            .map(|env| env.id.as_str())
    }

    fn env_key(&self) -> String {
        self.current_environment_id()
            .unwrap_or(DEFAULT_ENV_KEY)
            .to_string()
    }

    #[must_use]
    pub fn active_kafka_cluster_id(&self) -> Option<String> {
        let env = self.kafka_cluster_context.as_ref()?.environments.get(&self.env_key())?;
        if env.active_kafka_cluster.is_empty() {
            None
        } else {
            Some(env.active_kafka_cluster.clone())
        }
    }

    /// Sets (or clears, with `None`) the active cluster for the current
    /// environment.
    pub fn set_active_kafka_cluster(&mut self, cluster_id: Option<&str>) {
        let key = self.env_key();
        if let Some(kcc) = self.kafka_cluster_context.as_mut() {
            let env = kcc.environments.entry(key).or_insert_with(KafkaEnvContext::default);
            env.active_kafka_cluster = cluster_id.unwrap_or_default().to_string();
        }
    }

    #[must_use]
    pub fn find_kafka_cluster(&self, cluster_id: &str) -> Option<&KafkaClusterConfig> {
        self.kafka_cluster_context
            .as_ref()?
            .environments
            .get(&self.env_key())?
            .kafka_cluster_configs
            .get(cluster_id)
    }

    pub fn add_kafka_cluster(&mut self, cluster: KafkaClusterConfig) {
        let key = self.env_key();
        if let Some(kcc) = self.kafka_cluster_context.as_mut() {
            let env = kcc.environments.entry(key).or_insert_with(KafkaEnvContext::default);
            env.kafka_cluster_configs.insert(cluster.id.clone(), cluster);
        }
    }

    #[must_use]
    pub fn kafka_clusters(&self) -> Vec<&KafkaClusterConfig> {
        let Some(env) = self
            .kafka_cluster_context
            .as_ref()
            .and_then(|kcc| kcc.environments.get(&self.env_key()))
        else {
            return Vec::new();
        };
        let mut clusters: Vec<_> = env.kafka_cluster_configs.values().collect();
        clusters.sort_by(|a, b| a.id.cmp(&b.id));
        clusters
    }

    /// Looks up a stored secret for `api_key` on `cluster_id`.
    pub fn find_api_secret(&self, cluster_id: &str, api_key: &str) -> Option<&ApiKeyPair> {
        self.find_kafka_cluster(cluster_id)
            .and_then(|cluster| cluster.api_keys.get(api_key))
            .filter(|pair| !pair.secret.is_empty())
    }

    pub fn store_api_key(&mut self, cluster_id: &str, pair: ApiKeyPair) -> Result<(), CliError> {
        let key = self.env_key();
        let cluster = self
            .kafka_cluster_context
            .as_mut()
            .and_then(|kcc| kcc.environments.get_mut(&key))
            .and_then(|env| env.kafka_cluster_configs.get_mut(cluster_id))
            .ok_or_else(|| CliError::KafkaClusterNotFound {
                id: cluster_id.to_string(),
            })?;
        cluster.api_keys.insert(pair.key.clone(), pair);
        Ok(())
    }

    pub fn use_api_key(&mut self, cluster_id: &str, api_key: &str) -> Result<(), CliError> {
        let key = self.env_key();
        let cluster = self
            .kafka_cluster_context
            .as_mut()
            .and_then(|kcc| kcc.environments.get_mut(&key))
            .and_then(|env| env.kafka_cluster_configs.get_mut(cluster_id))
            .ok_or_else(|| CliError::KafkaClusterNotFound {
                id: cluster_id.to_string(),
            })?;
        cluster.api_key = api_key.to_string();
        Ok(())
    }

    /// Sets the current environment. The environment must be one the login
    /// knows about.
    pub fn set_current_environment(&mut self, environment_id: &str) -> Result<(), CliError> {
        let Some(auth) = self.state.auth.as_mut() else {
            return Err(CliError::NoEnvironmentSelected);
        };
        let found = auth
            .environments
            .iter()
            .find(|env| env.id == environment_id)
            .cloned();
        match found {
            Some(env) => {
                auth.environment = Some(env);
                Ok(())
            }
            None => Err(CliError::EnvironmentNotFound {
                id: environment_id.to_string(),
            }),
        }
    }

    pub(crate) fn set_current_environment_unchecked(&mut self, environment_id: Option<&str>) {
        if let Some(auth) = self.state.auth.as_mut() {
            auth.environment = environment_id.map(|id| {
                auth.environments
                    .iter()
                    .find(|env| env.id == id)
                    .cloned()
                    .unwrap_or(Environment {
                        id: id.to_string(),
                        name: id.to_string(),
                    })
            });
        }
    }

    /// Forces the context into the logged-out state: auth snapshot cleared,
    /// both tokens emptied. Salt and nonce are kept so a later login reuses
    /// the pair.
    pub fn delete_user_auth(&mut self) {
        self.state.auth = None;
        self.state.auth_token.clear();
        self.state.auth_refresh_token.clear();
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::config::types::AuthState;

    fn context_with_cluster() -> Context {
        let mut context = Context::new("dev", "plat", "cred", "dev");
        context.add_kafka_cluster(KafkaClusterConfig {
            id: "lkc-123".to_string(),
            name: "orders".to_string(),
            ..Default::default()
        });
        context
    }

    #[test]
    fn active_cluster_roundtrip() {
        let mut context = context_with_cluster();
        assert_eq!(context.active_kafka_cluster_id(), None);
        context.set_active_kafka_cluster(Some("lkc-123"));
        assert_eq!(context.active_kafka_cluster_id().as_deref(), Some("lkc-123"));
        context.set_active_kafka_cluster(None);
        assert_eq!(context.active_kafka_cluster_id(), None);
    }

    #[test]
    fn clusters_are_scoped_per_environment() {
        let mut context = context_with_cluster();
        context.state.auth = Some(AuthState {
            environments: vec![Environment {
                id: "env-1".to_string(),
                name: "prod".to_string(),
            }],
            environment: Some(Environment {
                id: "env-1".to_string(),
                name: "prod".to_string(),
            }),
            ..Default::default()
        });
        // The cluster was registered under the default key, not env-1.
        assert!(context.find_kafka_cluster("lkc-123").is_none());
        context.add_kafka_cluster(KafkaClusterConfig {
            id: "lkc-999".to_string(),
            ..Default::default()
        });
        assert!(context.find_kafka_cluster("lkc-999").is_some());
        context.state.auth = None;
        assert!(context.find_kafka_cluster("lkc-123").is_some());
    }

    #[test]
    fn api_key_store_and_lookup() {
        let mut context = context_with_cluster();
        assert!(context.find_api_secret("lkc-123", "AK1").is_none());
        context
            .store_api_key(
                "lkc-123",
                ApiKeyPair {
                    key: "AK1".to_string(),
                    secret: "shh".to_string(),
                },
            )
            .expect("store");
        assert_eq!(
            context.find_api_secret("lkc-123", "AK1").map(|p| p.secret.as_str()),
            Some("shh")
        );
        let missing = context.store_api_key(
            "lkc-404",
            ApiKeyPair {
                key: "AK1".to_string(),
                secret: "shh".to_string(),
            },
        );
        assert!(matches!(missing, Err(CliError::KafkaClusterNotFound { .. })));
    }

    #[test]
    fn delete_user_auth_clears_session() {
        let mut context = context_with_cluster();
        context.state.auth_token = "tok".to_string();
        context.state.auth_refresh_token = "ref".to_string();
        context.state.auth = Some(AuthState::default());
        context.state.salt = Some("c2FsdA".to_string());
        context.delete_user_auth();
        assert!(context.state.auth.is_none());
        assert!(context.state.auth_token.is_empty());
        assert!(context.state.auth_refresh_token.is_empty());
        assert!(context.state.salt.is_some());
    }
}
