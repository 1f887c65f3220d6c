use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use semver::Version;
use tracing::{debug, trace};

use super::types::{
    ApiKeyPair, Config, Context, ContextState, Credential, CredentialType, KafkaClusterConfig,
    Platform, SchemaRegistryCluster, SuspensionEventType, SuspensionStatus, SuspensionStatusType,
    CLOUD_DOMAIN_SUFFIX, CONFIG_VERSION, LEGACY_CONFIG_VERSION,
};
use crate::errors::CliError;

/// Platform URL treated as a cloud endpoint when `is_test` is set, so tests
/// can exercise cloud paths against a local mock server.
pub const TEST_CLOUD_URL: &str = "http://test.braid.local";

/// Values displaced out of the live config while it is being written; always
/// swapped back in afterwards, even when the write fails.
#[derive(Default)]
struct OverwriteRestore {
    active_kafka: Option<Option<String>>,
    environment: Option<Option<String>>,
    current_context: Option<String>,
}

fn expected_version() -> Version {
    Version::parse(CONFIG_VERSION).unwrap_or_else(|_| Version::new(1, 0, 0))
}

impl Config {
    #[must_use]
    pub fn new(filename: PathBuf) -> Self {
        Self {
            version: expected_version(),
            platforms: HashMap::new(),
            credentials: HashMap::new(),
            contexts: HashMap::new(),
            context_states: HashMap::new(),
            current_context: String::new(),
            filename,
            is_test: false,
            overwritten_current_context: None,
            overwritten_current_environment: None,
            overwritten_active_kafka: None,
        }
    }

    pub fn default_filename() -> Result<PathBuf, CliError> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| CliError::HomeNotSet)?;
        Ok(Path::new(&home).join(".braid").join("config.json"))
    }

    /// Reads the config from disk. A missing file is not an error: a fresh
    /// default config is written and returned.
    pub fn load(filename: PathBuf) -> Result<Self, CliError> {
        let input = match fs::read_to_string(&filename) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Self::new(filename);
                config.save()?;
                return Ok(config);
            }
            Err(err) => {
                return Err(CliError::UnableToReadConfig {
                    path: filename,
                    source: err,
                })
            }
        };
        let mut config: Self = serde_json::from_str(&input).map_err(|err| CliError::ParseConfig {
            path: filename.clone(),
            source: err,
        })?;
        config.filename = filename;
        config.check_version()?;

        let names: Vec<String> = config.contexts.keys().cloned().collect();
        for name in names {
            config.prevalidate_context(&name)?;
            config.wire_context_state(&name)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn check_version(&mut self) -> Result<(), CliError> {
        let expected = expected_version();
        if self.version < expected {
            return Err(CliError::ConfigNotUpToDate {
                found: self.version.clone(),
                expected,
            });
        }
        if self.version > expected {
            // A standalone on-prem CLI wrote this file; migrate it instead
            // of failing, backfilling the netrc machine names it never set.
            if self.version.to_string() == LEGACY_CONFIG_VERSION {
                debug!(version = %self.version, "migrating legacy config version");
                self.version = expected;
                let names: Vec<String> = self.contexts.keys().cloned().collect();
                for name in names {
                    if let Some(context) = self.contexts.get_mut(&name) {
                        context.netrc_machine_name = name;
                    }
                }
            } else {
                return Err(CliError::InvalidConfigVersion {
                    found: self.version.clone(),
                });
            }
        }
        Ok(())
    }

    fn prevalidate_context(&self, name: &str) -> Result<(), CliError> {
        let Some(context) = self.contexts.get(name) else {
            return Ok(());
        };
        if context.name.is_empty() {
            return Err(CliError::NoNameContext {
                path: self.filename.clone(),
            });
        }
        if context.credential_name.is_empty() {
            return Err(CliError::UnspecifiedCredential {
                context: context.name.clone(),
                path: self.filename.clone(),
            });
        }
        if context.platform_name.is_empty() {
            return Err(CliError::UnspecifiedPlatform {
                context: context.name.clone(),
                path: self.filename.clone(),
            });
        }
        if context.kafka_cluster_context.is_none() {
            return Err(CliError::MissingKafkaClusterContext {
                context: context.name.clone(),
                path: self.filename.clone(),
            });
        }
        Ok(())
    }

    /// Decrypts the stored tokens for `name` and installs the state as the
    /// context's live state. A token that fails to decrypt aborts the load;
    /// silently proceeding would run the session with a garbage token.
    fn wire_context_state(&mut self, name: &str) -> Result<(), CliError> {
        let Some(state) = self.context_states.get_mut(name) else {
            return Ok(());
        };
        if !state.auth_token.is_empty() || !state.auth_refresh_token.is_empty() {
            let (salt, nonce) = decode_salt_and_nonce(name, state)?;
            if !state.auth_token.is_empty() {
                state.auth_token = braid_crypto::decrypt(name, &state.auth_token, &salt, &nonce)
                    .map_err(|err| CliError::CorruptedAuthToken {
                        context: name.to_string(),
                        source: err,
                    })?;
            }
            if !state.auth_refresh_token.is_empty() {
                state.auth_refresh_token =
                    braid_crypto::decrypt(name, &state.auth_refresh_token, &salt, &nonce).map_err(
                        |err| CliError::CorruptedAuthToken {
                            context: name.to_string(),
                            source: err,
                        },
                    )?;
            }
        }
        let live = state.clone();
        if let Some(context) = self.contexts.get_mut(name) {
            context.state = live;
        }
        Ok(())
    }

    /// Writes the config to disk. Flag-driven overwrites are substituted out
    /// first so the file carries the pre-flag values, and substituted back in
    /// afterwards so the rest of the process keeps running against the flag
    /// values. Tokens are validated as plaintext and encrypted only into the
    /// serialized snapshot.
    pub fn save(&mut self) -> Result<(), CliError> {
        let restore = self.substitute_overwritten();
        let result = self.save_substituted();
        self.restore_overwritten(restore);
        result
    }

    fn substitute_overwritten(&mut self) -> OverwriteRestore {
        let mut restore = OverwriteRestore::default();
        if let Some(original) = self.overwritten_active_kafka.clone() {
            if let Some(context) = self.context_mut() {
                restore.active_kafka = Some(context.active_kafka_cluster_id());
                let original = (!original.is_empty()).then_some(original);
                context.set_active_kafka_cluster(original.as_deref());
            }
        }
        if let Some(original) = self.overwritten_current_environment.clone() {
            let name = self.current_context.clone();
            if let Some(context) = self.context_mut() {
                if context.state.auth.is_some() {
                    restore.environment =
                        Some(context.current_environment_id().map(str::to_string));
                    let original = (!original.is_empty()).then_some(original);
                    context.set_current_environment_unchecked(original.as_deref());
                }
            }
            self.sync_context_state(&name);
        }
        if let Some(original) = self.overwritten_current_context.clone() {
            restore.current_context = Some(std::mem::replace(&mut self.current_context, original));
        }
        restore
    }

    fn restore_overwritten(&mut self, restore: OverwriteRestore) {
        if let Some(flag_context) = restore.current_context {
            self.current_context = flag_context;
        }
        if let Some(flag_env) = restore.environment {
            let name = self.current_context.clone();
            if let Some(context) = self.context_mut() {
                context.set_current_environment_unchecked(flag_env.as_deref());
            }
            self.sync_context_state(&name);
        }
        if let Some(flag_kafka) = restore.active_kafka {
            if let Some(context) = self.context_mut() {
                context.set_active_kafka_cluster(flag_kafka.as_deref());
            }
        }
    }

    fn save_substituted(&mut self) -> Result<(), CliError> {
        self.validate()?;
        self.ensure_salt_and_nonce()?;
        // Encrypt only the serialized snapshot; the live states keep
        // plaintext tokens for the rest of the process.
        let plaintext_states = self.context_states.clone();
        let result = self.encrypt_states().and_then(|()| self.write_file());
        self.context_states = plaintext_states;
        result
    }

    /// Generates the per-context salt/nonce pair on first save of a state
    /// that carries tokens. The pair is reused afterwards so both tokens
    /// stay decryptable together.
    fn ensure_salt_and_nonce(&mut self) -> Result<(), CliError> {
        let names: Vec<String> = self.context_states.keys().cloned().collect();
        for name in names {
            let Some(state) = self.context_states.get_mut(&name) else {
                continue;
            };
            if state.auth_token.is_empty() && state.auth_refresh_token.is_empty() {
                continue;
            }
            if state.salt.is_none() || state.nonce.is_none() {
                state.salt = Some(BASE64.encode(braid_crypto::generate_salt()));
                state.nonce = Some(BASE64.encode(braid_crypto::generate_nonce()));
                let updated = state.clone();
                if let Some(context) = self.contexts.get_mut(&name) {
                    context.state.salt = updated.salt;
                    context.state.nonce = updated.nonce;
                }
            }
        }
        Ok(())
    }

    fn encrypt_states(&mut self) -> Result<(), CliError> {
        for (name, state) in &mut self.context_states {
            if state.auth_token.is_empty() && state.auth_refresh_token.is_empty() {
                continue;
            }
            let (salt, nonce) = decode_salt_and_nonce(name, state)?;
            if !state.auth_token.is_empty() {
                state.auth_token = braid_crypto::encrypt(name, &state.auth_token, &salt, &nonce)
                    .map_err(|err| CliError::TokenEncryption {
                        context: name.clone(),
                        source: err,
                    })?;
            }
            if !state.auth_refresh_token.is_empty() {
                state.auth_refresh_token =
                    braid_crypto::encrypt(name, &state.auth_refresh_token, &salt, &nonce).map_err(
                        |err| CliError::TokenEncryption {
                            context: name.clone(),
                            source: err,
                        },
                    )?;
            }
        }
        Ok(())
    }

    fn write_file(&self) -> Result<(), CliError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|err| CliError::MarshalConfig { source: err })?;
        if let Some(parent) = self.filename.parent() {
            fs::create_dir_all(parent).map_err(|err| CliError::UnableToWriteConfig {
                path: self.filename.clone(),
                source: err,
            })?;
        }
        // Single atomic replace; a half-written file must never be
        // observable.
        let tmp = self.filename.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|err| CliError::UnableToWriteConfig {
            path: tmp.clone(),
            source: err,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
        }
        fs::rename(&tmp, &self.filename).map_err(|err| CliError::UnableToWriteConfig {
            path: self.filename.clone(),
            source: err,
        })
    }

    /// Checks the structural invariants of the config. Repeatable; the only
    /// mutation is backfilling a missing state entry for a known context.
    pub fn validate(&mut self) -> Result<(), CliError> {
        if !self.current_context.is_empty() && !self.contexts.contains_key(&self.current_context) {
            trace!("current context does not exist");
            return Err(CliError::CurrentContextNotExist {
                context: self.current_context.clone(),
                path: self.filename.clone(),
            });
        }
        let names: Vec<String> = self.contexts.keys().cloned().collect();
        for name in names {
            self.prevalidate_context(&name)?;
            let context = &self.contexts[&name];
            if !self.credentials.contains_key(&context.credential_name) {
                trace!(context = %name, "unspecified credential");
                return Err(CliError::UnspecifiedCredential {
                    context: name,
                    path: self.filename.clone(),
                });
            }
            if !self.platforms.contains_key(&context.platform_name) {
                trace!(context = %name, "unspecified platform");
                return Err(CliError::UnspecifiedPlatform {
                    context: name,
                    path: self.filename.clone(),
                });
            }
            if !self.context_states.contains_key(&name) {
                self.context_states
                    .insert(name.clone(), ContextState::default());
            }
            if !self.is_test && self.context_states[&name] != self.contexts[&name].state {
                trace!(context = %name, "stored state does not match live state");
                return Err(CliError::ContextStateMismatch {
                    context: name,
                    path: self.filename.clone(),
                });
            }
        }
        for state_name in self.context_states.keys() {
            if !self.contexts.contains_key(state_name) {
                trace!(state = %state_name, "state mapped to nonexistent context");
                return Err(CliError::ContextStateNotMapped {
                    context: state_name.clone(),
                    path: self.filename.clone(),
                });
            }
        }
        Ok(())
    }

    /// Copies the live state of `name` into the persistence shadow. Must be
    /// called after any mutation of a context's state.
    pub fn sync_context_state(&mut self, name: &str) {
        if let Some(state) = self.contexts.get(name).map(|context| context.state.clone()) {
            self.context_states.insert(name.to_string(), state);
        }
    }

    #[must_use]
    pub fn context(&self) -> Option<&Context> {
        self.contexts.get(&self.current_context)
    }

    pub fn context_mut(&mut self) -> Option<&mut Context> {
        let name = self.current_context.clone();
        self.contexts.get_mut(&name)
    }

    pub fn find_context(&self, name: &str) -> Result<&Context, CliError> {
        self.contexts.get(name).ok_or_else(|| CliError::ContextDoesNotExist {
            name: name.to_string(),
        })
    }

    pub fn use_context(&mut self, name: &str) -> Result<(), CliError> {
        self.find_context(name)?;
        self.current_context = name.to_string();
        self.save()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_context(
        &mut self,
        name: &str,
        platform_name: &str,
        credential_name: &str,
        kafka_clusters: HashMap<String, KafkaClusterConfig>,
        active_kafka: Option<&str>,
        schema_registry_clusters: HashMap<String, SchemaRegistryCluster>,
        state: ContextState,
    ) -> Result<(), CliError> {
        if self.contexts.contains_key(name) {
            return Err(CliError::ContextAlreadyExists {
                name: name.to_string(),
            });
        }
        if !self.credentials.contains_key(credential_name) {
            return Err(CliError::CredentialNotFound {
                name: credential_name.to_string(),
            });
        }
        if !self.platforms.contains_key(platform_name) {
            return Err(CliError::PlatformNotFound {
                name: platform_name.to_string(),
            });
        }

        let mut context = Context::new(name, platform_name, credential_name, name);
        context.state = state;
        context.schema_registry_clusters = schema_registry_clusters;
        for cluster in kafka_clusters.into_values() {
            context.add_kafka_cluster(cluster);
        }
        context.set_active_kafka_cluster(active_kafka);

        self.context_states.insert(name.to_string(), context.state.clone());
        self.contexts.insert(name.to_string(), context);
        self.validate()?;
        self.save()
    }

    /// Creates an API-key context against a bare bootstrap URL, the flow
    /// used before any login exists.
    pub fn create_context(
        &mut self,
        name: &str,
        bootstrap_url: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Result<(), CliError> {
        let pair = ApiKeyPair {
            key: api_key.to_string(),
            secret: api_secret.to_string(),
        };
        let cluster = KafkaClusterConfig {
            id: "anonymous-id".to_string(),
            name: "anonymous-cluster".to_string(),
            bootstrap: bootstrap_url.to_string(),
            api_keys: HashMap::from([(api_key.to_string(), pair.clone())]),
            api_key: api_key.to_string(),
            ..Default::default()
        };
        let platform = Platform {
            name: bootstrap_url
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .to_string(),
            server: bootstrap_url.to_string(),
            ca_cert_path: None,
        };
        let credential = Credential {
            name: format!("{}-{}", CredentialType::ApiKey, api_key),
            credential_type: CredentialType::ApiKey,
            username: String::new(),
            api_key_pair: Some(pair),
        };
        let platform_name = platform.name.clone();
        let credential_name = credential.name.clone();
        self.save_credential(credential)?;
        self.save_platform(platform)?;
        let clusters = HashMap::from([(cluster.id.clone(), cluster)]);
        self.add_context(
            name,
            &platform_name,
            &credential_name,
            clusters,
            Some("anonymous-id"),
            HashMap::new(),
            ContextState::default(),
        )
    }

    pub fn delete_context(&mut self, name: &str) -> Result<(), CliError> {
        self.find_context(name)?;
        self.contexts.remove(name);
        self.context_states.remove(name);
        if self.current_context == name {
            self.current_context.clear();
        }
        self.save()
    }

    pub fn save_credential(&mut self, credential: Credential) -> Result<(), CliError> {
        if credential.name.is_empty() {
            return Err(CliError::NoNameCredential);
        }
        self.credentials.insert(credential.name.clone(), credential);
        self.save()
    }

    pub fn save_platform(&mut self, platform: Platform) -> Result<(), CliError> {
        if platform.name.is_empty() {
            return Err(CliError::NoNamePlatform);
        }
        self.platforms.insert(platform.name.clone(), platform);
        self.save()
    }

    /// The credential kind of the active context, used to gate which
    /// commands are available.
    #[must_use]
    pub fn credential_type(&self) -> CredentialType {
        if self.has_api_key_login() {
            return CredentialType::ApiKey;
        }
        if self.has_basic_login() {
            return CredentialType::Username;
        }
        CredentialType::None
    }

    fn has_api_key_login(&self) -> bool {
        self.context()
            .and_then(|context| self.credentials.get(&context.credential_name))
            .map(|credential| credential.credential_type == CredentialType::ApiKey)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn has_basic_login(&self) -> bool {
        let Some(context) = self.context() else {
            return false;
        };
        let is_username = self
            .credentials
            .get(&context.credential_name)
            .map(|credential| credential.credential_type == CredentialType::Username)
            .unwrap_or(false);
        is_username && !context.state.auth_token.is_empty()
    }

    // Set-once: an already-registered original value is never replaced, so
    // repeated flag resolution within one invocation stays idempotent.
    pub fn set_overwritten_current_context(&mut self, original: String) {
        if self.overwritten_current_context.is_none() {
            self.overwritten_current_context = Some(original);
        }
    }

    pub fn set_overwritten_current_environment(&mut self, original: String) {
        if self.overwritten_current_environment.is_none() {
            self.overwritten_current_environment = Some(original);
        }
    }

    pub fn set_overwritten_active_kafka(&mut self, original: String) {
        if self.overwritten_active_kafka.is_none() {
            self.overwritten_active_kafka = Some(original);
        }
    }

    #[must_use]
    pub fn is_cloud(&self) -> bool {
        let Some(platform) = self
            .context()
            .and_then(|context| self.platforms.get(&context.platform_name))
        else {
            return false;
        };
        if self.is_test && platform.server == TEST_CLOUD_URL {
            return true;
        }
        let host = platform
            .server
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split(['/', ':'])
            .next()
            .unwrap_or_default();
        host == CLOUD_DOMAIN_SUFFIX || host.ends_with(&format!(".{CLOUD_DOMAIN_SUFFIX}"))
    }

    #[must_use]
    pub fn is_cloud_login(&self) -> bool {
        self.is_cloud() && !self.is_org_suspended()
    }

    #[must_use]
    pub fn is_cloud_login_allow_free_trial_ended(&self) -> bool {
        self.is_cloud() && !self.is_login_blocked_by_org_suspension()
    }

    #[must_use]
    pub fn is_on_prem_login(&self) -> bool {
        self.context()
            .map(|context| !context.platform_name.is_empty())
            .unwrap_or(false)
            && !self.is_cloud()
    }

    fn suspension_status(&self) -> Option<SuspensionStatus> {
        self.context()
            .and_then(|context| context.state.auth.as_ref())
            .and_then(|auth| auth.organization.as_ref())
            .and_then(|org| org.suspension_status)
    }

    fn has_org_snapshot(&self) -> bool {
        self.context()
            .and_then(|context| context.state.auth.as_ref())
            .map(|auth| auth.organization.is_some())
            .unwrap_or(false)
    }

    /// A context without a complete auth/organization snapshot counts as
    /// suspended so it can never slip past the gate.
    #[must_use]
    pub fn is_org_suspended(&self) -> bool {
        if !self.has_org_snapshot() {
            trace!("context state is not set up for checking org suspension");
            return true;
        }
        matches!(
            self.suspension_status().map(|status| status.status),
            Some(SuspensionStatusType::InProgress) | Some(SuspensionStatusType::Completed)
        )
    }

    /// Like [`Config::is_org_suspended`], except a suspension caused by the
    /// end of a free trial does not block: those organizations may still run
    /// the commands that let them pay and unsuspend.
    #[must_use]
    pub fn is_login_blocked_by_org_suspension(&self) -> bool {
        if !self.has_org_snapshot() {
            trace!("context state is not set up for checking org suspension");
            return true;
        }
        let Some(status) = self.suspension_status() else {
            return false;
        };
        match status.status {
            SuspensionStatusType::InProgress | SuspensionStatusType::Completed => {
                status.event_type != Some(SuspensionEventType::EndOfFreeTrial)
            }
        }
    }

    #[must_use]
    pub fn last_org_id(&self) -> Option<String> {
        self.context()
            .filter(|context| !context.last_org_id.is_empty())
            .map(|context| context.last_org_id.clone())
    }
}

fn decode_salt_and_nonce(
    name: &str,
    state: &ContextState,
) -> Result<(Vec<u8>, Vec<u8>), CliError> {
    let corrupted = |source| CliError::CorruptedAuthToken {
        context: name.to_string(),
        source,
    };
    let salt = state
        .salt
        .as_deref()
        .ok_or_else(|| corrupted(braid_crypto::SecretStoreError::InvalidSalt))?;
    let nonce = state
        .nonce
        .as_deref()
        .ok_or_else(|| corrupted(braid_crypto::SecretStoreError::InvalidNonce))?;
    let salt = BASE64
        .decode(salt)
        .map_err(|_| corrupted(braid_crypto::SecretStoreError::InvalidSalt))?;
    let nonce = BASE64
        .decode(nonce)
        .map_err(|_| corrupted(braid_crypto::SecretStoreError::InvalidNonce))?;
    Ok((salt, nonce))
}
