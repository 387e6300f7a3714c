pub mod signature;
pub mod catalog;
pub mod field;
pub mod builder;
pub mod options;
pub mod matcher;
pub mod prune;
pub mod generator;
pub mod setup;
pub mod emit;
pub mod error;
pub mod cli;

use tracing_subscriber::EnvFilter;

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    init_logging(command_line_interface.verbosity());
    command_line_interface.run()
}
