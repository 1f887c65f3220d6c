use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use crate::errors::CliError;
use crate::modules::auth::http::AuthTokens;
use crate::modules::auth::{CommandRequirement, ControlPlaneClient, CredentialRefresher, PreRun};
use crate::modules::kafka::actions::handle_kafka_command;
use crate::modules::kafka::{ClusterCommand, KafkaArgs, KafkaCommand};
use crate::modules::config::{
    ApiKeyPair, AuthState, Config, Credential, CredentialType, Environment, KafkaClusterConfig,
    Organization, Platform, User, CONFIG_VERSION,
};
use crate::modules::shared::{ContextFlags, DynamicContext};
use crate::modules::system::analytics::RecordingAnalytics;
use crate::modules::system::{DisabledUpdateClient, UpdateClient};

const CTX: &str = "login-dev@example.com-https://api.braid.cloud";

fn jwt_with_expiry(expires: chrono::DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, expires.timestamp()));
    format!("{header}.{payload}.sig")
}

/// Cloud config with one logged-in context and two registered clusters,
/// backed by a file inside `dir`.
fn cloud_config(dir: &TempDir) -> Config {
    let mut config = Config::new(dir.path().join("config.json"));
    config.save_platform(Platform {
        name: "api.braid.cloud".to_string(),
        server: "https://api.braid.cloud".to_string(),
        ca_cert_path: None,
    })
    .expect("platform");
    config.save_credential(Credential {
        name: "username-dev@example.com".to_string(),
        credential_type: CredentialType::Username,
        username: "dev@example.com".to_string(),
        api_key_pair: None,
    })
    .expect("credential");

    let env = Environment {
        id: "env-1".to_string(),
        name: "dev".to_string(),
    };
    let state = crate::modules::config::ContextState {
        auth_token: jwt_with_expiry(Utc::now() + Duration::hours(1)),
        auth_refresh_token: "refresh-plaintext".to_string(),
        salt: None,
        nonce: None,
        auth: Some(AuthState {
            user: Some(User {
                id: "u-1".to_string(),
                email: "dev@example.com".to_string(),
            }),
            organization: Some(Organization {
                id: "org-1".to_string(),
                name: "example".to_string(),
                suspension_status: None,
            }),
            environments: vec![env.clone()],
            environment: Some(env),
        }),
    };
    config
        .add_context(
            CTX,
            "api.braid.cloud",
            "username-dev@example.com",
            HashMap::from([
                ("lkc-a".to_string(), cluster("lkc-a")),
                ("lkc-b".to_string(), cluster("lkc-b")),
            ]),
            Some("lkc-a"),
            HashMap::new(),
            state,
        )
        .expect("add context");
    config.current_context = CTX.to_string();
    config.save().expect("save");
    config
}

fn cluster(id: &str) -> KafkaClusterConfig {
    KafkaClusterConfig {
        id: id.to_string(),
        name: format!("cluster {id}"),
        bootstrap: format!("{id}.braid.cloud:9092"),
        rest_endpoint: String::new(),
        api_keys: HashMap::from([(
            "MYKEY".to_string(),
            ApiKeyPair {
                key: "MYKEY".to_string(),
                secret: "MYSECRET".to_string(),
            },
        )]),
        api_key: "MYKEY".to_string(),
    }
}

struct FailingRefresher;

#[async_trait]
impl CredentialRefresher for FailingRefresher {
    async fn refresh(&self, _machine_name: &str, _server: &str) -> Result<AuthTokens, CliError> {
        Err(CliError::InvalidLogin)
    }
}

struct NoClustersControlPlane;

#[async_trait]
impl ControlPlaneClient for NoClustersControlPlane {
    async fn describe_kafka_cluster(
        &self,
        _server: &str,
        _auth_token: &str,
        _environment_id: &str,
        _cluster_id: &str,
    ) -> Result<Option<KafkaClusterConfig>, CliError> {
        Ok(None)
    }
}

#[derive(Default)]
struct CountingUpdateClient {
    checks: AtomicUsize,
}

#[async_trait]
impl UpdateClient for CountingUpdateClient {
    async fn check_for_updates(
        &self,
        _name: &str,
        _current_version: &str,
        _force: bool,
    ) -> Result<(bool, String), CliError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok((false, String::new()))
    }
}

#[test]
fn save_load_roundtrip_preserves_graph_and_tokens() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    let token = config.contexts[CTX].state.auth_token.clone();
    config.save().expect("save");

    let mut loaded = Config::load(dir.path().join("config.json")).expect("load");
    loaded.validate().expect("validate");
    assert_eq!(loaded.current_context, CTX);
    assert_eq!(loaded.contexts.len(), config.contexts.len());
    assert_eq!(loaded.credentials, config.credentials);
    assert_eq!(loaded.platforms, config.platforms);
    // Tokens are ciphertext on disk but decrypt back to the original.
    assert_eq!(loaded.contexts[CTX].state.auth_token, token);
    assert_eq!(
        loaded.contexts[CTX].state.auth_refresh_token,
        "refresh-plaintext"
    );
    let raw = std::fs::read_to_string(dir.path().join("config.json")).expect("read");
    assert!(!raw.contains(&token));
    assert!(!raw.contains("refresh-plaintext"));
}

#[tokio::test]
async fn cluster_flag_overrides_in_memory_but_not_on_disk() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    let token = config.contexts[CTX].state.auth_token.clone();

    let flags = ContextFlags {
        cluster: Some("lkc-b".to_string()),
        ..Default::default()
    };
    let mut resolver = DynamicContext::new(&mut config, flags, None).expect("resolver");
    let effective = resolver.kafka_cluster(&token).await.expect("cluster");
    assert_eq!(effective.id, "lkc-b");
    assert_eq!(
        config.contexts[CTX].active_kafka_cluster_id().as_deref(),
        Some("lkc-b")
    );

    config.save().expect("save");

    // The file carries the pre-flag cluster; the process keeps the flag one.
    let raw = std::fs::read_to_string(dir.path().join("config.json")).expect("read");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(
        parsed["contexts"][CTX]["kafka_cluster_context"]["environments"]["env-1"]
            ["active_kafka_cluster"],
        "lkc-a"
    );
    assert_eq!(
        config.contexts[CTX].active_kafka_cluster_id().as_deref(),
        Some("lkc-b")
    );
}

#[test]
fn environment_flag_overrides_in_memory_but_not_on_disk() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    if let Some(auth) = config
        .context_mut()
        .and_then(|context| context.state.auth.as_mut())
    {
        auth.environments.push(Environment {
            id: "env-2".to_string(),
            name: "staging".to_string(),
        });
    }
    config.sync_context_state(CTX);
    config.save().expect("save");

    let flags = ContextFlags {
        environment: Some("env-2".to_string()),
        ..Default::default()
    };
    let mut resolver = DynamicContext::new(&mut config, flags, None).expect("resolver");
    assert_eq!(resolver.environment_id().expect("environment"), "env-2");
    assert_eq!(
        config.contexts[CTX].current_environment_id(),
        Some("env-2")
    );

    config.save().expect("save");

    // The file carries the pre-flag environment; the process keeps the flag
    // one, and the shadow state stays in sync with it.
    let raw = std::fs::read_to_string(dir.path().join("config.json")).expect("read");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(
        parsed["context_states"][CTX]["auth"]["environment"]["id"],
        "env-1"
    );
    assert_eq!(
        config.contexts[CTX].current_environment_id(),
        Some("env-2")
    );
    config.validate().expect("state in sync after save");
}

#[tokio::test]
async fn kafka_cluster_list_honors_the_environment_flag() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    if let Some(auth) = config
        .context_mut()
        .and_then(|context| context.state.auth.as_mut())
    {
        auth.environments.push(Environment {
            id: "env-2".to_string(),
            name: "staging".to_string(),
        });
    }
    config.sync_context_state(CTX);

    let flags = ContextFlags {
        environment: Some("env-2".to_string()),
        ..Default::default()
    };
    let args = KafkaArgs {
        command: KafkaCommand::Cluster(ClusterCommand::List),
    };
    handle_kafka_command(args, &mut config, &flags, &NoClustersControlPlane)
        .await
        .expect("list");

    // Listing applied the flag: clusters registered under env-1 are out of
    // scope, and the set-once overwrite recorded the original environment.
    assert_eq!(config.contexts[CTX].current_environment_id(), Some("env-2"));
    assert!(config.contexts[CTX].find_kafka_cluster("lkc-a").is_none());
    assert_eq!(
        config.overwritten_current_environment.as_deref(),
        Some("env-1")
    );
}

#[test]
fn overwritten_values_are_set_once() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    config.set_overwritten_active_kafka("lkc-a".to_string());
    config.set_overwritten_active_kafka("lkc-z".to_string());
    assert_eq!(config.overwritten_active_kafka.as_deref(), Some("lkc-a"));

    config.set_overwritten_current_context("old-context".to_string());
    config.set_overwritten_current_context("newer".to_string());
    assert_eq!(
        config.overwritten_current_context.as_deref(),
        Some("old-context")
    );
}

#[test]
fn version_gate_rejects_old_and_migrates_legacy() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.json");

    std::fs::write(&path, r#"{"version": "0.9.0"}"#).expect("write");
    let err = Config::load(path.clone()).expect_err("old version must fail");
    assert!(matches!(err, CliError::ConfigNotUpToDate { .. }));

    std::fs::write(
        &path,
        r#"{"version": "2.5.0"}"#,
    )
    .expect("write");
    let err = Config::load(path.clone()).expect_err("unknown newer version must fail");
    assert!(matches!(err, CliError::InvalidConfigVersion { .. }));

    std::fs::write(
        &path,
        format!(
            r#"{{
  "version": "3.0.0",
  "platforms": {{"p": {{"name": "p", "server": "https://mds.internal:8090"}}}},
  "credentials": {{"c": {{"name": "c", "credential_type": "username", "username": "ops"}}}},
  "contexts": {{"legacy": {{
    "name": "legacy", "platform": "p", "credential": "c",
    "kafka_cluster_context": {{"environments": {{}}}}
  }}}},
  "current_context": "legacy"
}}"#
        ),
    )
    .expect("write");
    let loaded = Config::load(path).expect("legacy version must migrate");
    assert_eq!(loaded.version.to_string(), CONFIG_VERSION);
    assert_eq!(loaded.contexts["legacy"].netrc_machine_name, "legacy");
}

#[test]
fn diverged_shadow_state_fails_validation() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    config.validate().expect("in sync");

    if let Some(state) = config.context_states.get_mut(CTX) {
        state.auth_token = "tampered".to_string();
    }
    let err = config.validate().expect_err("diverged state");
    assert!(matches!(err, CliError::ContextStateMismatch { .. }));
    assert!(err.is_corrupted_config());
}

#[tokio::test]
async fn expired_token_without_refresh_logs_out_and_records_timeout() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    if let Some(context) = config.context_mut() {
        context.state.auth_token = jwt_with_expiry(Utc::now() - Duration::hours(1));
    }
    config.sync_context_state(CTX);
    config.save().expect("save");

    let mut analytics = RecordingAnalytics::default();
    let mut prerun = PreRun {
        cli_name: "braid",
        cli_version: "0.0.0",
        update_client: &DisabledUpdateClient,
        analytics: &mut analytics,
        refresher: &FailingRefresher,
    };

    let flags = ContextFlags::default();
    let err = prerun
        .run(&mut config, &flags, "environment", CommandRequirement::Authenticated)
        .await
        .expect_err("expired session");
    assert!(matches!(err, CliError::RequireCloudLogin));

    let context = config.context().expect("context");
    assert!(context.state.auth.is_none());
    assert!(context.state.auth_token.is_empty());

    // Anonymous commands still run against the logged-out config.
    prerun
        .run(&mut config, &flags, "version", CommandRequirement::Anonymous)
        .await
        .expect("anonymous still works");
    assert_eq!(analytics.timed_out_contexts, vec![CTX.to_string()]);
    assert_eq!(analytics.commands, vec!["version".to_string()]);
}

#[tokio::test]
async fn anonymous_command_still_clears_an_expired_session() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    if let Some(context) = config.context_mut() {
        context.state.auth_token = jwt_with_expiry(Utc::now() - Duration::hours(1));
    }
    config.sync_context_state(CTX);
    config.save().expect("save");

    let mut analytics = RecordingAnalytics::default();
    let mut prerun = PreRun {
        cli_name: "braid",
        cli_version: "0.0.0",
        update_client: &DisabledUpdateClient,
        analytics: &mut analytics,
        refresher: &FailingRefresher,
    };

    let flags = ContextFlags::default();
    prerun
        .run(&mut config, &flags, "version", CommandRequirement::Anonymous)
        .await
        .expect("anonymous commands always proceed");

    let context = config.context().expect("context");
    assert!(context.state.auth.is_none());
    assert!(context.state.auth_token.is_empty());
    assert_eq!(analytics.timed_out_contexts, vec![CTX.to_string()]);
    assert_eq!(analytics.commands, vec!["version".to_string()]);

    // With no session left there is nothing to time out again.
    let mut prerun = PreRun {
        cli_name: "braid",
        cli_version: "0.0.0",
        update_client: &DisabledUpdateClient,
        analytics: &mut analytics,
        refresher: &FailingRefresher,
    };
    prerun
        .run(&mut config, &flags, "context", CommandRequirement::Anonymous)
        .await
        .expect("still anonymous");
    assert_eq!(analytics.timed_out_contexts, vec![CTX.to_string()]);
}

#[tokio::test]
async fn update_check_runs_for_every_requirement() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    let updates = CountingUpdateClient::default();
    let mut analytics = RecordingAnalytics::default();
    let mut prerun = PreRun {
        cli_name: "braid",
        cli_version: "0.0.0",
        update_client: &updates,
        analytics: &mut analytics,
        refresher: &FailingRefresher,
    };

    let flags = ContextFlags::default();
    prerun
        .run(&mut config, &flags, "version", CommandRequirement::Anonymous)
        .await
        .expect("anonymous");
    prerun
        .run(&mut config, &flags, "environment", CommandRequirement::Authenticated)
        .await
        .expect("logged in");
    prerun
        .run(&mut config, &flags, "api-key use", CommandRequirement::HasApiKey)
        .await
        .expect("stored key");
    assert_eq!(updates.checks.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn api_key_flow_requires_a_stored_or_passed_secret() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);
    let mut analytics = RecordingAnalytics::default();
    let mut prerun = PreRun {
        cli_name: "braid",
        cli_version: "0.0.0",
        update_client: &DisabledUpdateClient,
        analytics: &mut analytics,
        refresher: &FailingRefresher,
    };

    let stored = ContextFlags {
        api_key: Some("MYKEY".to_string()),
        ..Default::default()
    };
    prerun
        .run(&mut config, &stored, "api-key use", CommandRequirement::HasApiKey)
        .await
        .expect("stored secret");

    let unknown = ContextFlags {
        api_key: Some("OTHER".to_string()),
        ..Default::default()
    };
    let err = prerun
        .run(&mut config, &unknown, "api-key use", CommandRequirement::HasApiKey)
        .await
        .expect_err("no secret for unknown key");
    match err {
        CliError::NoApiSecretStoredOrPassed { key, cluster } => {
            assert_eq!(key, "OTHER");
            assert_eq!(cluster, "lkc-a");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Passing the secret on the command line satisfies the gate.
    let passed = ContextFlags {
        api_key: Some("OTHER".to_string()),
        api_secret: Some("adhoc".to_string()),
        ..Default::default()
    };
    prerun
        .run(&mut config, &passed, "api-key use", CommandRequirement::HasApiKey)
        .await
        .expect("flag secret");
}

#[test]
fn test_cloud_url_counts_as_cloud_only_in_test_mode() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = Config::new(dir.path().join("config.json"));
    config
        .save_platform(Platform {
            name: "test.braid.local".to_string(),
            server: crate::modules::config::TEST_CLOUD_URL.to_string(),
            ca_cert_path: None,
        })
        .expect("platform");
    config
        .save_credential(Credential {
            name: "username-dev@example.com".to_string(),
            credential_type: CredentialType::Username,
            username: "dev@example.com".to_string(),
            api_key_pair: None,
        })
        .expect("credential");
    config
        .add_context(
            "mock",
            "test.braid.local",
            "username-dev@example.com",
            HashMap::new(),
            None,
            HashMap::new(),
            crate::modules::config::ContextState::default(),
        )
        .expect("context");
    config.current_context = "mock".to_string();

    assert!(!config.is_cloud());
    config.is_test = true;
    assert!(config.is_cloud());
}

#[test]
fn deleting_contexts() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = cloud_config(&dir);

    let err = config
        .delete_context("no-such-context")
        .expect_err("unknown context");
    assert!(matches!(err, CliError::ContextDoesNotExist { .. }));
    assert_eq!(config.contexts.len(), 1);
    assert_eq!(config.current_context, CTX);

    config.delete_context(CTX).expect("delete current");
    assert!(config.current_context.is_empty());
    assert!(config.contexts.is_empty());
    assert!(config.context_states.is_empty());
}
