use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ApiKeyArgs {
    #[command(subcommand)]
    pub command: ApiKeyCommand,
}

#[derive(Subcommand)]
pub enum ApiKeyCommand {
    #[command(about = "Store an API key and secret for a cluster")]
    Store(StoreApiKeyArgs),
    #[command(about = "Select a stored API key for a cluster")]
    Use(UseApiKeyArgs),
}

#[derive(Args)]
pub struct StoreApiKeyArgs {
    pub key: String,
    pub secret: String,
    /// Cluster to attach the key to; defaults to the active cluster.
    #[arg(long)]
    pub cluster: Option<String>,
}

#[derive(Args)]
pub struct UseApiKeyArgs {
    pub key: String,
    /// Cluster to select the key on; defaults to the active cluster.
    #[arg(long)]
    pub cluster: Option<String>,
}
