//! ilfs CLI entry point.

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ilfs::cli::Cli;

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments first so --debug can shape the log filter
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.debug { "ilfs=debug" } else { "ilfs=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(default_level.parse()?))
        .init();

    // Execute command, mapping error kinds to exit codes
    if let Err(err) = cli.execute() {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
    Ok(())
}
