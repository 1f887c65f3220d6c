use super::args::{ClusterCommand, KafkaArgs, KafkaCommand};
use crate::errors::CliError;
use crate::modules::auth::ControlPlaneClient;
use crate::modules::config::Config;
use crate::modules::shared::{ContextFlags, DynamicContext};

pub(crate) async fn handle_kafka_command(
    args: KafkaArgs,
    config: &mut Config,
    flags: &ContextFlags,
    control_plane: &dyn ControlPlaneClient,
) -> anyhow::Result<()> {
    let KafkaCommand::Cluster(command) = args.command;
    match command {
        ClusterCommand::List => {
            let mut resolver = DynamicContext::new(config, flags.clone(), None)?;
            if resolver.flags.environment.is_some() {
                resolver.environment_id()?;
            }
            let context = resolver.config.context().ok_or(CliError::RequireCloudLogin)?;
            let active = context.active_kafka_cluster_id();
            for cluster in context.kafka_clusters() {
                let marker = if active.as_deref() == Some(&cluster.id) { "*" } else { " " };
                println!("{marker} {} ({})", cluster.id, cluster.name);
            }
        }
        ClusterCommand::Use(use_args) => {
            let name = config.current_context.clone();
            if name.is_empty() {
                return Err(CliError::RequireCloudLogin.into());
            }
            let known = config
                .context()
                .ok_or(CliError::RequireCloudLogin)?
                .find_kafka_cluster(&use_args.id)
                .is_some();
            if !known {
                let auth_token = config
                    .context()
                    .map(|context| context.state.auth_token.clone())
                    .unwrap_or_default();
                let mut resolver =
                    DynamicContext::new(config, flags.clone(), Some(control_plane))?;
                let cluster = resolver
                    .fetch_kafka_cluster(&auth_token, &use_args.id)
                    .await?
                    .ok_or_else(|| CliError::KafkaClusterNotFound {
                        id: use_args.id.clone(),
                    })?;
                if let Some(context) = config.context_mut() {
                    context.add_kafka_cluster(cluster);
                }
            }
            if let Some(context) = config.context_mut() {
                context.set_active_kafka_cluster(Some(&use_args.id));
            }
            config.sync_context_state(&name);
            config.save()?;
            println!("Now using Kafka cluster \"{}\".", use_args.id);
        }
    }
    Ok(())
}
