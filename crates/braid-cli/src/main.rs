use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod cli_command;
mod errors;
mod modules;
#[cfg(test)]
mod tests;

use crate::cli_args::Cli;
use crate::cli_command::{command_info, handle_command};
use crate::errors::CliError;
use crate::modules::auth::{
    HttpAuthClient, HttpControlPlaneClient, NetrcHandler, NetrcRefresher, PreRun,
};
use crate::modules::config::Config;
use crate::modules::shared::ContextFlags;
use crate::modules::system::{DisabledUpdateClient, HttpUpdateClient, LogAnalytics, UpdateClient};

pub(crate) const DEFAULT_CLOUD_URL: &str = "https://api.braid.cloud";
const RELEASES_URL_ENV: &str = "BRAID_RELEASES_URL";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            if let Some(suggestion) = err.downcast_ref::<CliError>().and_then(CliError::suggestion)
            {
                eprintln!("\n{suggestion}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(Config::default_filename()?)?;

    let flags = ContextFlags {
        context: cli.context,
        cluster: cli.cluster,
        environment: cli.environment,
        api_key: cli.api_key,
        api_secret: cli.api_secret,
    };

    // A `--context` flag displaces the current context for this invocation
    // only; `save` writes the original back.
    if let Some(name) = flags.context.clone() {
        config.find_context(&name)?;
        if name != config.current_context {
            let original = std::mem::replace(&mut config.current_context, name);
            config.set_overwritten_current_context(original);
        }
    }

    let client = reqwest::Client::new();
    let auth_client = HttpAuthClient {
        client: client.clone(),
    };
    let control_plane = HttpControlPlaneClient {
        client: client.clone(),
    };
    let netrc = NetrcHandler {
        path: NetrcHandler::default_path()?,
    };
    let refresher = NetrcRefresher {
        netrc: NetrcHandler {
            path: NetrcHandler::default_path()?,
        },
        auth_client: &auth_client,
    };
    // Update checks run only against an explicitly configured release feed.
    let update_client: Box<dyn UpdateClient> = match std::env::var(RELEASES_URL_ENV) {
        Ok(url) if !url.is_empty() => Box::new(HttpUpdateClient::new(url)),
        _ => Box::new(DisabledUpdateClient),
    };
    let mut analytics = LogAnalytics;

    let (command_name, requirement) = command_info(&cli.command);
    let mut prerun = PreRun {
        cli_name: "braid",
        cli_version: env!("CARGO_PKG_VERSION"),
        update_client: update_client.as_ref(),
        analytics: &mut analytics,
        refresher: &refresher,
    };
    prerun
        .run(&mut config, &flags, command_name, requirement)
        .await?;

    handle_command(
        cli.command,
        &mut config,
        &flags,
        &auth_client,
        &control_plane,
        &netrc,
    )
    .await
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

pub(crate) fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    let mut input = String::new();
    print!("{prompt}");
    io::stdout().flush()?;
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub(crate) fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;
    Ok(password)
}
