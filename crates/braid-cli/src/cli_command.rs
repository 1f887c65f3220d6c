use crate::cli_args::*;
use crate::modules::apikey::actions::handle_api_key_command;
use crate::modules::auth::actions::{handle_login, handle_logout};
use crate::modules::auth::{AuthClient, CommandRequirement, ControlPlaneClient, NetrcHandler};
use crate::modules::config::actions::handle_context_command;
use crate::modules::config::Config;
use crate::modules::environment::actions::handle_environment_command;
use crate::modules::kafka::actions::handle_kafka_command;
use crate::modules::shared::ContextFlags;

/// Tracking name and login requirement declared per command.
pub(crate) fn command_info(command: &Command) -> (&'static str, CommandRequirement) {
    match command {
        Command::Login(_) => ("login", CommandRequirement::Anonymous),
        Command::Logout(_) => ("logout", CommandRequirement::Anonymous),
        Command::Context(_) => ("context", CommandRequirement::Anonymous),
        Command::Environment(_) => ("environment", CommandRequirement::Authenticated),
        Command::Kafka(_) => ("kafka cluster", CommandRequirement::Authenticated),
        // Storing a secret must work before any secret exists; selecting a
        // key requires a usable API-key setup on the effective cluster.
        Command::ApiKey(args) => match args.command {
            ApiKeyCommand::Store(_) => ("api-key store", CommandRequirement::Anonymous),
            ApiKeyCommand::Use(_) => ("api-key use", CommandRequirement::HasApiKey),
        },
        Command::Version => ("version", CommandRequirement::Anonymous),
    }
}

pub(crate) async fn handle_command(
    command: Command,
    config: &mut Config,
    flags: &ContextFlags,
    auth_client: &dyn AuthClient,
    control_plane: &dyn ControlPlaneClient,
    netrc: &NetrcHandler,
) -> anyhow::Result<()> {
    match command {
        Command::Login(args) => handle_login(args, config, auth_client, netrc).await?,
        Command::Logout(args) => handle_logout(args, config, netrc)?,
        Command::Context(args) => handle_context_command(args, config)?,
        Command::Environment(args) => handle_environment_command(args, config, flags)?,
        Command::Kafka(args) => handle_kafka_command(args, config, flags, control_plane).await?,
        Command::ApiKey(args) => handle_api_key_command(args, config)?,
        Command::Version => {
            println!("braid v{}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}
