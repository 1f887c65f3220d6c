use std::collections::HashMap;
use std::path::PathBuf;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Schema version written by this CLI.
pub const CONFIG_VERSION: &str = "1.0.0";
/// Config files carried over from the standalone on-prem CLI arrive with
/// this marker version and are migrated in memory on load.
pub const LEGACY_CONFIG_VERSION: &str = "3.0.0";

/// Hostname suffix that identifies Braid Cloud control-plane endpoints.
pub const CLOUD_DOMAIN_SUFFIX: &str = "braid.cloud";

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    pub version: Version,
    #[serde(default)]
    pub platforms: HashMap<String, Platform>,
    #[serde(default)]
    pub credentials: HashMap<String, Credential>,
    #[serde(default)]
    pub contexts: HashMap<String, Context>,
    #[serde(default)]
    pub context_states: HashMap<String, ContextState>,
    #[serde(default)]
    pub current_context: String,
    #[serde(skip)]
    pub filename: PathBuf,
    /// Relaxes the context-state equality check in `validate` and lets
    /// `TEST_CLOUD_URL` count as a cloud endpoint.
    #[serde(skip)]
    pub is_test: bool,
    // Flag-driven values displace the persisted ones for the lifetime of the
    // process. Each field stores the pre-flag value so `save` can write it
    // instead of the flag value. Never serialized.
    #[serde(skip)]
    pub(crate) overwritten_current_context: Option<String>,
    #[serde(skip)]
    pub(crate) overwritten_current_environment: Option<String>,
    #[serde(skip)]
    pub(crate) overwritten_active_kafka: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct Platform {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_path: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    Username,
    ApiKey,
    #[default]
    None,
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username => write!(f, "username"),
            Self::ApiKey => write!(f, "api-key"),
            Self::None => write!(f, "none"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct Credential {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub credential_type: CredentialType,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_pair: Option<ApiKeyPair>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct ApiKeyPair {
    pub key: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Context {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "platform")]
    pub platform_name: String,
    #[serde(default, rename = "credential")]
    pub credential_name: String,
    pub kafka_cluster_context: Option<KafkaClusterContext>,
    #[serde(default)]
    pub schema_registry_clusters: HashMap<String, SchemaRegistryCluster>,
    #[serde(default)]
    pub netrc_machine_name: String,
    #[serde(default)]
    pub last_org_id: String,
    /// Live session state. Persisted separately in `Config::context_states`;
    /// the two copies must stay structurally equal (see `Config::validate`).
    #[serde(skip)]
    pub state: ContextState,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct ContextState {
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub auth_refresh_token: String,
    /// Base64 salt/nonce pair under which both tokens are encrypted at rest.
    /// Generated once per context; regenerating without re-encrypting both
    /// tokens invalidates them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthState>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct AuthState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    /// Currently selected environment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension_status: Option<SuspensionStatus>,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct SuspensionStatus {
    pub status: SuspensionStatusType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<SuspensionEventType>,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionStatusType {
    InProgress,
    Completed,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionEventType {
    EndOfFreeTrial,
    Other,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct Environment {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct KafkaClusterContext {
    /// Active cluster and known cluster configs, keyed by environment id.
    /// Contexts without a cloud login use the `"default"` environment key.
    #[serde(default)]
    pub environments: HashMap<String, KafkaEnvContext>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct KafkaEnvContext {
    #[serde(default)]
    pub active_kafka_cluster: String,
    #[serde(default)]
    pub kafka_cluster_configs: HashMap<String, KafkaClusterConfig>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct KafkaClusterConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bootstrap: String,
    #[serde(default)]
    pub rest_endpoint: String,
    #[serde(default)]
    pub api_keys: HashMap<String, ApiKeyPair>,
    /// Currently selected API key for this cluster, empty if none.
    #[serde(default)]
    pub api_key: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct SchemaRegistryCluster {
    pub id: String,
    #[serde(default)]
    pub schema_registry_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sr_api_key: Option<ApiKeyPair>,
}
