use std::path::PathBuf;

use braid_crypto::SecretStoreError;
use thiserror::Error;

/// Error taxonomy for the configuration and authentication core. Each kind
/// is distinguishable so callers can branch, and each carries its own
/// remediation text via [`CliError::suggestion`].
#[derive(Debug, Error)]
pub enum CliError {
    #[error("unable to read config file {path}: {source}")]
    UnableToReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to write config file {path}: {source}")]
    UnableToWriteConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to serialize config: {source}")]
    MarshalConfig {
        #[source]
        source: serde_json::Error,
    },
    #[error("HOME is not set")]
    HomeNotSet,
    #[error("unable to parse config file {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config version v{found} is not up to date with this CLI (expected v{expected})")]
    ConfigNotUpToDate {
        found: semver::Version,
        expected: semver::Version,
    },
    #[error("unrecognized config version v{found}")]
    InvalidConfigVersion { found: semver::Version },

    #[error("corrupted config file {path}: context with no name")]
    NoNameContext { path: PathBuf },
    #[error("corrupted config file {path}: context \"{context}\" has no credential")]
    UnspecifiedCredential { context: String, path: PathBuf },
    #[error("corrupted config file {path}: context \"{context}\" has no platform")]
    UnspecifiedPlatform { context: String, path: PathBuf },
    #[error("corrupted config file {path}: context \"{context}\" has no kafka cluster context")]
    MissingKafkaClusterContext { context: String, path: PathBuf },
    #[error("corrupted config file {path}: current context \"{context}\" does not exist")]
    CurrentContextNotExist { context: String, path: PathBuf },
    #[error("corrupted config file {path}: state of context \"{context}\" does not match its stored state")]
    ContextStateMismatch { context: String, path: PathBuf },
    #[error("corrupted config file {path}: state \"{context}\" is not mapped to any context")]
    ContextStateNotMapped { context: String, path: PathBuf },
    #[error("corrupted auth token for context \"{context}\": {source}")]
    CorruptedAuthToken {
        context: String,
        #[source]
        source: SecretStoreError,
    },
    #[error("failed to encrypt auth token for context \"{context}\": {source}")]
    TokenEncryption {
        context: String,
        #[source]
        source: SecretStoreError,
    },

    #[error("context \"{name}\" does not exist")]
    ContextDoesNotExist { name: String },
    #[error("context \"{name}\" already exists")]
    ContextAlreadyExists { name: String },
    #[error("credential \"{name}\" not found")]
    CredentialNotFound { name: String },
    #[error("platform \"{name}\" not found")]
    PlatformNotFound { name: String },
    #[error("credential must have a name")]
    NoNameCredential,
    #[error("platform must have a name")]
    NoNamePlatform,

    #[error("incorrect username or password")]
    InvalidLogin,
    #[error("you must be logged in to Braid Cloud to run this command")]
    RequireCloudLogin,
    #[error("you must be logged in to a Braid metadata service to run this command")]
    RequireOnPremLogin,
    #[error("this command requires an API-key context")]
    RequireApiKey,
    #[error("your organization is suspended")]
    OrgSuspended,
    #[error("your organization is suspended because your free trial has ended")]
    OrgSuspendedFreeTrialEnded,

    #[error("no Kafka cluster selected")]
    NoKafkaSelected,
    #[error("no environment selected")]
    NoEnvironmentSelected,
    #[error("Kafka cluster \"{id}\" not found")]
    KafkaClusterNotFound { id: String },
    #[error("environment \"{id}\" not found")]
    EnvironmentNotFound { id: String },
    #[error("no API secret stored or passed for API key \"{key}\" of cluster \"{cluster}\"")]
    NoApiSecretStoredOrPassed { key: String, cluster: String },

    #[error("{message}")]
    Auth { message: String },
}

impl CliError {
    #[must_use]
    pub fn suggestion(&self) -> Option<String> {
        let suggestion = match self {
            Self::ConfigNotUpToDate { .. } => {
                "Update the braid CLI to migrate your configuration file."
            }
            Self::NoNameContext { .. }
            | Self::UnspecifiedCredential { .. }
            | Self::UnspecifiedPlatform { .. }
            | Self::MissingKafkaClusterContext { .. }
            | Self::CurrentContextNotExist { .. }
            | Self::ContextStateMismatch { .. }
            | Self::ContextStateNotMapped { .. } => {
                "Remove the offending entry from the config file, or delete the file and log in again."
            }
            Self::CorruptedAuthToken { .. } => "Log in again with `braid login`.",
            Self::RequireCloudLogin => "Log in with `braid login`.",
            Self::RequireOnPremLogin => "Log in with `braid login --url <metadata-service-url>`.",
            Self::RequireApiKey => {
                "Create an API-key context with `braid context create --api-key <key> --api-secret <secret>`."
            }
            Self::OrgSuspended => "Contact Braid support to unsuspend your organization.",
            Self::OrgSuspendedFreeTrialEnded => {
                "Your free trial has ended. Add a payment method to keep using Braid Cloud."
            }
            Self::NoKafkaSelected => "Select a cluster with `braid kafka cluster use <id>`.",
            Self::NoEnvironmentSelected => {
                "Select an environment with `braid environment use <id>`."
            }
            Self::KafkaClusterNotFound { .. } => "List known clusters with `braid kafka cluster list`.",
            Self::EnvironmentNotFound { .. } => "List environments with `braid environment list`.",
            Self::NoApiSecretStoredOrPassed { key, .. } => {
                return Some(format!(
                    "Pass `--api-secret`, or store the secret once with `braid api-key store {key} <secret>`."
                ))
            }
            Self::InvalidLogin => "Check your credentials and try again.",
            _ => return None,
        };
        Some(suggestion.to_string())
    }

    /// True for structural invariant violations in the on-disk file. These
    /// are always fatal.
    #[must_use]
    pub fn is_corrupted_config(&self) -> bool {
        matches!(
            self,
            Self::NoNameContext { .. }
                | Self::UnspecifiedCredential { .. }
                | Self::UnspecifiedPlatform { .. }
                | Self::MissingKafkaClusterContext { .. }
                | Self::CurrentContextNotExist { .. }
                | Self::ContextStateMismatch { .. }
                | Self::ContextStateNotMapped { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_are_mode_specific() {
        assert_ne!(
            CliError::RequireCloudLogin.suggestion(),
            CliError::RequireOnPremLogin.suggestion()
        );
        assert_ne!(
            CliError::OrgSuspended.suggestion(),
            CliError::OrgSuspendedFreeTrialEnded.suggestion()
        );
        assert!(CliError::NoKafkaSelected
            .suggestion()
            .expect("suggestion")
            .contains("kafka cluster use"));
    }

    #[test]
    fn corrupted_config_grouping() {
        let err = CliError::ContextStateMismatch {
            context: "dev".to_string(),
            path: PathBuf::from("/tmp/config.json"),
        };
        assert!(err.is_corrupted_config());
        assert!(!CliError::NoKafkaSelected.is_corrupted_config());
    }
}
