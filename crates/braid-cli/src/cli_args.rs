use clap::{ArgAction, Parser, Subcommand};

pub use crate::modules::apikey::args::*;
pub use crate::modules::auth::args::*;
pub use crate::modules::config::args::*;
pub use crate::modules::environment::args::*;
pub use crate::modules::kafka::args::*;

#[derive(Parser)]
#[command(name = "braid")]
#[command(about = "Braid Cloud CLI")]
pub struct Cli {
    /// Run against a saved context instead of the current one.
    #[arg(long, env = "BRAID_CONTEXT")]
    pub context: Option<String>,
    #[arg(long)]
    pub cluster: Option<String>,
    #[arg(long)]
    pub environment: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub api_secret: Option<String>,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Login(LoginArgs),
    Logout(LogoutArgs),
    Context(ContextArgs),
    Environment(EnvironmentArgs),
    Kafka(KafkaArgs),
    #[command(name = "api-key")]
    ApiKey(ApiKeyArgs),
    #[command(about = "Print the CLI version")]
    Version,
}
