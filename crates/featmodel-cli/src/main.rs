//! Featmodel CLI: the `fmctl` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = support::load_config_or_exit(cli.config.as_deref());

    match cli.command {
        Commands::Validate { model, json } => commands::validate::run(model, &config, json),

        Commands::CheckConfig {
            model,
            select,
            json,
        } => commands::check_config::run(model, select, &config, json),

        Commands::Analyze {
            model,
            kinds,
            variability,
            json,
        } => commands::analyze::run(model, kinds, variability, &config, json),

        Commands::Impact {
            model,
            feature,
            json,
        } => commands::impact::run(model, feature, &config, json),

        Commands::Generate {
            model,
            strategy,
            seed,
            count,
            diverse,
            require,
            exclude,
            json,
        } => commands::generate::run(
            commands::generate::Args {
                model,
                strategy,
                seed,
                count,
                diverse,
                require,
                exclude,
                json,
            },
            &config,
        ),

        Commands::Export {
            model,
            format,
            output,
        } => commands::export::run(model, format, output),

        Commands::Publish {
            model,
            store,
            actor,
            json,
        } => commands::publish::run(model, store, actor, &config, json),
    }
}
