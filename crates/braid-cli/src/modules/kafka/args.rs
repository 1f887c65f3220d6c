use clap::{Args, Subcommand};

#[derive(Args)]
pub struct KafkaArgs {
    #[command(subcommand)]
    pub command: KafkaCommand,
}

#[derive(Subcommand)]
pub enum KafkaCommand {
    #[command(subcommand, about = "Kafka cluster selection")]
    Cluster(ClusterCommand),
}

#[derive(Subcommand)]
pub enum ClusterCommand {
    #[command(about = "List clusters registered in the active context")]
    List,
    #[command(about = "Select a cluster for the active context")]
    Use(UseClusterArgs),
}

#[derive(Args)]
pub struct UseClusterArgs {
    pub id: String,
}
