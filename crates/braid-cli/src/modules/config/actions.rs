use super::args::{ContextArgs, ContextCommand};
use super::types::Config;

pub(crate) fn handle_context_command(args: ContextArgs, config: &mut Config) -> anyhow::Result<()> {
    match args.command {
        ContextCommand::List => {
            let mut names: Vec<&String> = config.contexts.keys().collect();
            names.sort();
            for name in names {
                let marker = if *name == config.current_context { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        ContextCommand::Current => {
            if !config.current_context.is_empty() {
                println!("{}", config.current_context);
            }
        }
        ContextCommand::Use(args) => {
            config.use_context(&args.name)?;
            println!("Now using context \"{}\".", args.name);
        }
        ContextCommand::Delete(args) => {
            config.delete_context(&args.name)?;
            println!("Deleted context \"{}\".", args.name);
        }
        ContextCommand::Create(args) => {
            config.create_context(&args.name, &args.bootstrap, &args.api_key, &args.api_secret)?;
            config.use_context(&args.name)?;
            println!("Created context \"{}\".", args.name);
        }
    }
    Ok(())
}
