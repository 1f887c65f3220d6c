use chrono::Utc;
use tracing::debug;

use super::netrc::CredentialRefresher;
use crate::errors::CliError;
use crate::modules::config::{Config, CredentialType};
use crate::modules::shared::{ContextFlags, DynamicContext};
use crate::modules::system::analytics::Analytics;
use crate::modules::system::update::UpdateClient;

/// Login requirement a command declares; checked by the pre-run gate before
/// the command body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRequirement {
    /// No auth needed; still update-checked and tracked.
    Anonymous,
    /// Needs an API key usable against the effective cluster.
    HasApiKey,
    /// Needs a cloud login.
    Authenticated,
    /// Needs an on-prem metadata-service login.
    AuthenticatedOnPrem,
}

/// Commands an organization suspended for an ended free trial may still
/// run, so the user can pay and unsuspend.
const FREE_TRIAL_ALLOWED_COMMANDS: &[&str] = &["login", "logout", "context", "version"];

/// Gate executed before (almost) every command. Logging verbosity is set by
/// the caller before the gate runs; everything else of the pre-run sequence
/// lives here.
pub struct PreRun<'a> {
    pub cli_name: &'a str,
    pub cli_version: &'a str,
    pub update_client: &'a dyn UpdateClient,
    pub analytics: &'a mut dyn Analytics,
    pub refresher: &'a dyn CredentialRefresher,
}

impl PreRun<'_> {
    pub async fn run(
        &mut self,
        config: &mut Config,
        flags: &ContextFlags,
        command: &str,
        requirement: CommandRequirement,
    ) -> Result<(), CliError> {
        self.check_for_updates().await;

        if requirement == CommandRequirement::Anonymous {
            // Anonymous commands still clear an expired session so the next
            // authenticated command starts from a logged-out context, but the
            // command itself always proceeds.
            if let Err(err) = self.ensure_live_token(config, requirement).await {
                debug!(error = %err, "session expired during anonymous command");
            }
            self.track(command);
            return Ok(());
        }

        self.check_login_mode(config, requirement)?;
        self.check_suspension(config, command, requirement)?;
        self.ensure_live_token(config, requirement).await?;
        self.check_api_secret(config, flags, requirement).await?;
        self.track(command);
        Ok(())
    }

    fn check_login_mode(
        &self,
        config: &Config,
        requirement: CommandRequirement,
    ) -> Result<(), CliError> {
        match requirement {
            CommandRequirement::Anonymous => Ok(()),
            CommandRequirement::Authenticated => {
                let logged_in = config.is_cloud()
                    && config
                        .context()
                        .map(|context| context.state.auth.is_some())
                        .unwrap_or(false);
                if logged_in {
                    Ok(())
                } else {
                    Err(CliError::RequireCloudLogin)
                }
            }
            CommandRequirement::AuthenticatedOnPrem => {
                let logged_in = config.is_on_prem_login()
                    && config
                        .context()
                        .map(|context| !context.state.auth_token.is_empty())
                        .unwrap_or(false);
                if logged_in {
                    Ok(())
                } else {
                    Err(CliError::RequireOnPremLogin)
                }
            }
            CommandRequirement::HasApiKey => {
                let has_key_context = config.credential_type() == CredentialType::ApiKey;
                let has_cloud = config.is_cloud()
                    && config
                        .context()
                        .map(|context| context.state.auth.is_some())
                        .unwrap_or(false);
                if has_key_context || has_cloud {
                    Ok(())
                } else {
                    Err(CliError::RequireApiKey)
                }
            }
        }
    }

    fn check_suspension(
        &self,
        config: &Config,
        command: &str,
        requirement: CommandRequirement,
    ) -> Result<(), CliError> {
        // Suspension applies to cloud organizations only; an API-key context
        // with no cloud login has no organization to suspend.
        if requirement == CommandRequirement::AuthenticatedOnPrem || !config.is_cloud() {
            return Ok(());
        }
        if config.credential_type() == CredentialType::ApiKey
            && config
                .context()
                .map(|context| context.state.auth.is_none())
                .unwrap_or(true)
        {
            return Ok(());
        }
        if config.is_cloud_login() {
            return Ok(());
        }
        if !config.is_cloud_login_allow_free_trial_ended() {
            return Err(CliError::OrgSuspended);
        }
        // Suspended for end of free trial: a short allow-list still works.
        let root = command.split_whitespace().next().unwrap_or(command);
        if FREE_TRIAL_ALLOWED_COMMANDS.contains(&root) {
            return Ok(());
        }
        Err(CliError::OrgSuspendedFreeTrialEnded)
    }

    /// Token liveness: decode the expiry claim of the stored token; if the
    /// token is expired, malformed, or empty, make one silent
    /// reauthentication attempt with the saved netrc credentials. Failure
    /// degrades the context to logged-out and records a session-timed-out
    /// event; it never tears down the process.
    async fn ensure_live_token(
        &mut self,
        config: &mut Config,
        requirement: CommandRequirement,
    ) -> Result<(), CliError> {
        let name = config.current_context.clone();
        let Some(context) = config.context() else {
            return Ok(());
        };
        if config.credential_type() == CredentialType::ApiKey {
            return Ok(());
        }
        // No session, nothing to keep alive.
        if context.state.auth_token.is_empty() && context.state.auth.is_none() {
            return Ok(());
        }
        if braid_crypto::is_live(&context.state.auth_token, Utc::now()) {
            return Ok(());
        }

        let machine = context.netrc_machine_name.clone();
        let server = config
            .context()
            .and_then(|context| config.platforms.get(&context.platform_name))
            .map(|platform| platform.server.clone())
            .unwrap_or_default();
        match self.refresher.refresh(&machine, &server).await {
            Ok(tokens) => {
                debug!(context = %name, "silent reauthentication succeeded");
                if let Some(context) = config.context_mut() {
                    context.state.auth_token = tokens.token;
                    if !tokens.refresh_token.is_empty() {
                        context.state.auth_refresh_token = tokens.refresh_token;
                    }
                }
                config.sync_context_state(&name);
                config.save()?;
                Ok(())
            }
            Err(err) => {
                debug!(context = %name, error = %err, "silent reauthentication failed");
                if let Some(context) = config.context_mut() {
                    context.delete_user_auth();
                }
                config.sync_context_state(&name);
                config.save()?;
                self.analytics.session_timed_out(&name);
                Err(match requirement {
                    CommandRequirement::AuthenticatedOnPrem => CliError::RequireOnPremLogin,
                    _ => CliError::RequireCloudLogin,
                })
            }
        }
    }

    /// API-key flow: `--api-key` without `--api-secret` needs a previously
    /// stored secret for that key on the effective cluster.
    async fn check_api_secret(
        &mut self,
        config: &mut Config,
        flags: &ContextFlags,
        requirement: CommandRequirement,
    ) -> Result<(), CliError> {
        if requirement != CommandRequirement::HasApiKey {
            return Ok(());
        }
        let auth_token = config
            .context()
            .map(|context| context.state.auth_token.clone())
            .unwrap_or_default();
        let mut resolver = DynamicContext::new(config, flags.clone(), None)?;
        let cluster = resolver.kafka_cluster(&auth_token).await?;
        let (key, secret) = resolver.resolve_api_key(&auth_token).await?;
        if secret.is_none() {
            return Err(CliError::NoApiSecretStoredOrPassed {
                key,
                cluster: cluster.id,
            });
        }
        Ok(())
    }

    async fn check_for_updates(&self) {
        match self
            .update_client
            .check_for_updates(self.cli_name, self.cli_version, false)
            .await
        {
            Ok((true, message)) => eprintln!("{message}"),
            Ok((false, _)) => {}
            Err(err) => debug!(error = %err, "update check failed"),
        }
    }

    // Fire-and-forget; analytics failures never fail the command.
    fn track(&mut self, command: &str) {
        self.analytics.track_command(command);
    }
}
