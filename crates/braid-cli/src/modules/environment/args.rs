use clap::{Args, Subcommand};

#[derive(Args)]
pub struct EnvironmentArgs {
    #[command(subcommand)]
    pub command: EnvironmentCommand,
}

#[derive(Subcommand)]
pub enum EnvironmentCommand {
    #[command(about = "List environments of the logged-in organization")]
    List,
    #[command(about = "Select an environment for the active context")]
    Use(UseEnvironmentArgs),
}

#[derive(Args)]
pub struct UseEnvironmentArgs {
    pub id: String,
}
