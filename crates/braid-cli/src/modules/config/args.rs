use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub command: ContextCommand,
}

#[derive(Subcommand)]
pub enum ContextCommand {
    #[command(about = "List saved contexts")]
    List,
    #[command(about = "Print the active context name")]
    Current,
    #[command(about = "Switch to a saved context")]
    Use(UseContextArgs),
    #[command(about = "Delete a saved context")]
    Delete(DeleteContextArgs),
    #[command(about = "Create an API-key context for a cluster endpoint")]
    Create(CreateContextArgs),
}

#[derive(Args)]
pub struct UseContextArgs {
    pub name: String,
}

#[derive(Args)]
pub struct DeleteContextArgs {
    pub name: String,
}

#[derive(Args)]
pub struct CreateContextArgs {
    pub name: String,
    #[arg(long)]
    pub bootstrap: String,
    #[arg(long)]
    pub api_key: String,
    #[arg(long)]
    pub api_secret: String,
}
