use clap::Parser;
use tracing::Level;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut db = commands::connect(&cli)?;
    let stdout = std::io::stdout();
    commands::run_command(&mut db, cli.command, cli.format, &mut stdout.lock())
}
