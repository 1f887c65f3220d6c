use std::collections::HashMap;

use tracing::debug;

use super::args::{LoginArgs, LogoutArgs};
use super::http::AuthClient;
use super::netrc::{NetrcHandler, NetrcMachine};
use crate::modules::config::{
    AuthState, Config, ContextState, Credential, CredentialType, Platform,
};
use crate::{prompt_line, prompt_password, DEFAULT_CLOUD_URL};

pub(crate) async fn handle_login(
    args: LoginArgs,
    config: &mut Config,
    auth_client: &dyn AuthClient,
    netrc: &NetrcHandler,
) -> anyhow::Result<()> {
    let server = args
        .url
        .unwrap_or_else(|| DEFAULT_CLOUD_URL.to_string())
        .trim_end_matches('/')
        .to_string();
    let username = match args.username {
        Some(username) => username,
        None => prompt_line("Email: ")?,
    };
    let password = prompt_password("Password: ")?;

    let tokens = auth_client.login(&server, &username, &password).await?;
    let profile = auth_client.user(&server, &tokens.token).await?;
    if let Some(previous) = config.last_org_id() {
        if previous != profile.organization.id {
            debug!(previous = %previous, current = %profile.organization.id, "organization changed since last login");
        }
    }

    let platform = Platform {
        name: server
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string(),
        server: server.clone(),
        ca_cert_path: None,
    };
    let credential = Credential {
        name: format!("{}-{}", CredentialType::Username, username),
        credential_type: CredentialType::Username,
        username: username.clone(),
        api_key_pair: None,
    };
    let platform_name = platform.name.clone();
    let credential_name = credential.name.clone();
    config.save_credential(credential)?;
    config.save_platform(platform)?;

    let state = ContextState {
        auth_token: tokens.token,
        auth_refresh_token: tokens.refresh_token,
        salt: None,
        nonce: None,
        auth: Some(AuthState {
            user: Some(profile.user),
            organization: Some(profile.organization.clone()),
            environment: profile.environments.first().cloned(),
            environments: profile.environments,
        }),
    };

    let name = format!("login-{username}-{server}");
    if let Some(context) = config.contexts.get_mut(&name) {
        context.platform_name = platform_name;
        context.credential_name = credential_name;
        context.last_org_id = profile.organization.id.clone();
        // Keep the salt/nonce pair so previously written snapshots stay
        // decryptable under the same key material.
        let (salt, nonce) = (context.state.salt.take(), context.state.nonce.take());
        context.state = state;
        context.state.salt = salt;
        context.state.nonce = nonce;
        config.sync_context_state(&name);
        config.current_context = name.clone();
        config.save()?;
    } else {
        config.add_context(
            &name,
            &platform_name,
            &credential_name,
            HashMap::new(),
            None,
            HashMap::new(),
            state,
        )?;
        if let Some(context) = config.contexts.get_mut(&name) {
            context.last_org_id = profile.organization.id.clone();
        }
        config.sync_context_state(&name);
        config.current_context = name.clone();
        config.save()?;
    }

    let machine = config.find_context(&name)?.netrc_machine_name.clone();
    netrc.save_machine(NetrcMachine {
        name: machine,
        login: username.clone(),
        password,
    })?;

    println!("Logged in as \"{username}\".");
    Ok(())
}

pub(crate) fn handle_logout(
    _args: LogoutArgs,
    config: &mut Config,
    netrc: &NetrcHandler,
) -> anyhow::Result<()> {
    let name = config.current_context.clone();
    if name.is_empty() {
        println!("You are now logged out.");
        return Ok(());
    }
    let machine = config.find_context(&name)?.netrc_machine_name.clone();
    if let Some(context) = config.context_mut() {
        context.delete_user_auth();
    }
    config.sync_context_state(&name);
    config.save()?;
    netrc.delete_machine(&machine)?;
    println!("You are now logged out.");
    Ok(())
}
