use super::args::{EnvironmentArgs, EnvironmentCommand};
use crate::errors::CliError;
use crate::modules::config::Config;
use crate::modules::shared::{ContextFlags, DynamicContext};

pub(crate) fn handle_environment_command(
    args: EnvironmentArgs,
    config: &mut Config,
    flags: &ContextFlags,
) -> anyhow::Result<()> {
    match args.command {
        EnvironmentCommand::List => {
            let mut resolver = DynamicContext::new(config, flags.clone(), None)?;
            let auth = resolver.authenticated_state()?;
            let active = auth.environment.as_ref().map(|env| env.id.clone());
            for environment in &auth.environments {
                let marker = if active.as_deref() == Some(&environment.id) { "*" } else { " " };
                println!("{marker} {} ({})", environment.id, environment.name);
            }
        }
        EnvironmentCommand::Use(use_args) => {
            let name = config.current_context.clone();
            if name.is_empty() {
                return Err(CliError::RequireCloudLogin.into());
            }
            config
                .context_mut()
                .ok_or(CliError::RequireCloudLogin)?
                .set_current_environment(&use_args.id)?;
            config.sync_context_state(&name);
            config.save()?;
            println!("Now using environment \"{}\".", use_args.id);
        }
    }
    Ok(())
}
