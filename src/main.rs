use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use zap_flow::{example, schema, validate};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Schema => schema::run(),
        cli::Command::Example => example::run(),
        cli::Command::Validate { file } => validate::run(&file),
        cli::Command::Order {
            chains,
            done,
            current,
        } => commands::order(&chains, &done, current.as_deref()),
        cli::Command::Minimum {
            file,
            token,
            skip_bridge,
            chain,
        } => commands::minimum(&file, &token, skip_bridge, &chain),
        cli::Command::Flowchart {
            file,
            action,
            tokens,
            format,
            output,
        } => commands::flowchart(&file, &action, &tokens, format, output.as_deref()),
        cli::Command::Simulate {
            file,
            action,
            tokens,
            amount,
            recipient,
            address,
            cache_dir,
            output,
        } => commands::simulate(commands::SimulateArgs {
            file: &file,
            action: &action,
            tokens: &tokens,
            amount,
            recipient: recipient.as_deref(),
            address: &address,
            cache_dir,
            output: output.as_deref(),
        }),
    }
}
