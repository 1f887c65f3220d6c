use super::args::{ApiKeyArgs, ApiKeyCommand};
use crate::errors::CliError;
use crate::modules::config::{ApiKeyPair, Config};

fn effective_cluster(config: &Config, arg: Option<String>) -> Result<String, CliError> {
    match arg {
        Some(id) => Ok(id),
        None => config
            .context()
            .ok_or(CliError::RequireApiKey)?
            .active_kafka_cluster_id()
            .ok_or(CliError::NoKafkaSelected),
    }
}

pub(crate) fn handle_api_key_command(
    args: ApiKeyArgs,
    config: &mut Config,
) -> anyhow::Result<()> {
    let name = config.current_context.clone();
    if name.is_empty() {
        return Err(CliError::RequireApiKey.into());
    }
    match args.command {
        ApiKeyCommand::Store(store) => {
            let cluster_id = effective_cluster(config, store.cluster)?;
            let pair = ApiKeyPair {
                key: store.key.clone(),
                secret: store.secret,
            };
            config
                .context_mut()
                .ok_or(CliError::RequireApiKey)?
                .store_api_key(&cluster_id, pair)?;
            config.sync_context_state(&name);
            config.save()?;
            println!("Stored API key \"{}\" for cluster \"{cluster_id}\".", store.key);
        }
        ApiKeyCommand::Use(use_args) => {
            let cluster_id = effective_cluster(config, use_args.cluster)?;
            config
                .context_mut()
                .ok_or(CliError::RequireApiKey)?
                .use_api_key(&cluster_id, &use_args.key)?;
            config.sync_context_state(&name);
            config.save()?;
            println!("Using API key \"{}\" for cluster \"{cluster_id}\".", use_args.key);
        }
    }
    Ok(())
}
