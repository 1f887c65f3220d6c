use tracing::debug;

use crate::errors::CliError;
use crate::modules::auth::http::ControlPlaneClient;
use crate::modules::config::{AuthState, Config, KafkaClusterConfig};

/// Flag-supplied overrides parsed from the command line. A `Some` value
/// means the user set the flag for this invocation.
#[derive(Default, Clone)]
pub struct ContextFlags {
    pub context: Option<String>,
    pub cluster: Option<String>,
    pub environment: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

/// Reconciles command-line flags, the active context, and remote lookups
/// into the effective context/environment/cluster for one invocation.
///
/// Flag values are applied to the live config so the rest of the process
/// sees them, but the pre-flag value is registered first (set-once) so
/// `Config::save` writes the persisted value, never the flag value.
pub struct DynamicContext<'a> {
    pub config: &'a mut Config,
    pub flags: ContextFlags,
    pub control_plane: Option<&'a dyn ControlPlaneClient>,
}

impl<'a> DynamicContext<'a> {
    pub fn new(
        config: &'a mut Config,
        flags: ContextFlags,
        control_plane: Option<&'a dyn ControlPlaneClient>,
    ) -> Result<Self, CliError> {
        if let Some(name) = flags.context.clone() {
            config.find_context(&name)?;
            if name != config.current_context {
                let original = config.current_context.clone();
                config.set_overwritten_current_context(original);
                config.current_context = name;
            }
        }
        Ok(Self {
            config,
            flags,
            control_plane,
        })
    }

    pub fn context_name(&self) -> Result<String, CliError> {
        if self.config.current_context.is_empty() {
            return Err(CliError::RequireCloudLogin);
        }
        Ok(self.config.current_context.clone())
    }

    /// Effective environment id: a changed `--environment` flag wins, then
    /// the context's current environment.
    pub fn environment_id(&mut self) -> Result<String, CliError> {
        if let Some(flag_env) = self.flags.environment.clone() {
            let name = self.context_name()?;
            let context = self.config.context_mut().ok_or(CliError::RequireCloudLogin)?;
            let Some(auth) = context.state.auth.as_ref() else {
                return Err(CliError::RequireCloudLogin);
            };
            if !auth.environments.iter().any(|env| env.id == flag_env) {
                return Err(CliError::EnvironmentNotFound { id: flag_env });
            }
            let original = context.current_environment_id().unwrap_or_default().to_string();
            self.config.set_overwritten_current_environment(original);
            if let Some(context) = self.config.context_mut() {
                context.set_current_environment_unchecked(Some(&flag_env));
            }
            self.config.sync_context_state(&name);
            debug!(environment = %flag_env, "using environment from flag");
            return Ok(flag_env);
        }
        self.config
            .context()
            .and_then(|context| context.current_environment_id())
            .map(str::to_string)
            .ok_or(CliError::NoEnvironmentSelected)
    }

    /// Effective Kafka cluster: a changed `--cluster` flag wins, then the
    /// active cluster of the current environment. A flag cluster unknown to
    /// the context is looked up remotely and registered.
    pub async fn kafka_cluster(&mut self, auth_token: &str) -> Result<KafkaClusterConfig, CliError> {
        let context = self.config.context().ok_or(CliError::NoKafkaSelected)?;
        let from_flag = self.flags.cluster.is_some();
        let cluster_id = match self.flags.cluster.clone() {
            Some(id) => id,
            None => context.active_kafka_cluster_id().ok_or(CliError::NoKafkaSelected)?,
        };

        if context.find_kafka_cluster(&cluster_id).is_none() {
            let fetched = self.fetch_kafka_cluster(auth_token, &cluster_id).await?;
            match fetched {
                Some(cluster) => {
                    let name = self.context_name()?;
                    if let Some(context) = self.config.context_mut() {
                        context.add_kafka_cluster(cluster);
                    }
                    debug!(cluster = %cluster_id, context = %name, "registered cluster from remote lookup");
                }
                None => return Err(CliError::KafkaClusterNotFound { id: cluster_id }),
            }
        }

        if from_flag {
            let context = self.config.context().ok_or(CliError::NoKafkaSelected)?;
            let original = context.active_kafka_cluster_id().unwrap_or_default();
            self.config.set_overwritten_active_kafka(original);
            if let Some(context) = self.config.context_mut() {
                context.set_active_kafka_cluster(Some(&cluster_id));
            }
            debug!(cluster = %cluster_id, "using cluster from flag");
        }

        let context = self.config.context().ok_or(CliError::NoKafkaSelected)?;
        context
            .find_kafka_cluster(&cluster_id)
            .cloned()
            .ok_or(CliError::KafkaClusterNotFound { id: cluster_id })
    }

    pub(crate) async fn fetch_kafka_cluster(
        &mut self,
        auth_token: &str,
        cluster_id: &str,
    ) -> Result<Option<KafkaClusterConfig>, CliError> {
        let Some(client) = self.control_plane else {
            return Ok(None);
        };
        if auth_token.is_empty() {
            return Ok(None);
        }
        let environment_id = match self.environment_id() {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };
        let server = self.platform_server()?;
        client
            .describe_kafka_cluster(&server, auth_token, &environment_id, cluster_id)
            .await
    }

    fn platform_server(&self) -> Result<String, CliError> {
        let context = self.config.context().ok_or(CliError::RequireCloudLogin)?;
        self.config
            .platforms
            .get(&context.platform_name)
            .map(|platform| platform.server.clone())
            .ok_or_else(|| CliError::PlatformNotFound {
                name: context.platform_name.clone(),
            })
    }

    /// Auth snapshot for the effective environment. Fails when the context
    /// has no cloud login.
    pub fn authenticated_state(&mut self) -> Result<AuthState, CliError> {
        {
            let context = self.config.context().ok_or(CliError::RequireCloudLogin)?;
            if context.state.auth.is_none() || context.state.auth_token.is_empty() {
                return Err(CliError::RequireCloudLogin);
            }
        }
        if self.flags.environment.is_some() {
            self.environment_id()?;
        }
        let context = self.config.context().ok_or(CliError::RequireCloudLogin)?;
        context.state.auth.clone().ok_or(CliError::RequireCloudLogin)
    }

    /// API key and stored secret for the effective cluster, for commands in
    /// the API-key flow. The flag key wins over the cluster's selected key.
    pub async fn resolve_api_key(
        &mut self,
        auth_token: &str,
    ) -> Result<(String, Option<String>), CliError> {
        let cluster = self.kafka_cluster(auth_token).await?;
        let key = match self.flags.api_key.clone() {
            Some(key) => key,
            None if !cluster.api_key.is_empty() => cluster.api_key.clone(),
            None => return Err(CliError::RequireApiKey),
        };
        if let Some(secret) = self.flags.api_secret.clone() {
            return Ok((key, Some(secret)));
        }
        let stored = self
            .config
            .context()
            .and_then(|context| context.find_api_secret(&cluster.id, &key))
            .map(|pair| pair.secret.clone());
        Ok((key, stored))
    }
}
