//! ovhgate CLI - OVHcloud web hosting and domain tools from the command line
//!
//! This is the main entry point for the ovhgate CLI, providing commands to
//! list and call catalog tools, send raw API requests, and serve tool calls
//! over a line-delimited JSON protocol.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use config::Config;
use error::Result;
use logging::{timing::Timer, LoggingConfig};
use output::OutputWriter;
use std::process;
use tracing::instrument;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    let result = match Config::load_with_file(cli.config.as_deref()) {
        Ok(config) => {
            if !config.output.color {
                control::set_override(false);
            }
            if let Err(e) = init_logging(&cli, &config) {
                eprintln!("Failed to initialize logging: {}", e);
            }
            run(cli, config).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic
#[instrument(skip_all, fields(command = cli.command.name()))]
async fn run(cli: Cli, config: Config) -> Result<()> {
    let _timer = Timer::new("cli_execution");

    let mut output = OutputWriter::new(
        cli.output,
        control::SHOULD_COLORIZE.should_colorize(),
        cli.quiet,
        config.output.progress,
    );

    tracing::debug!(verbosity = cli.verbosity_level(), "Executing command");

    match cli.command {
        Commands::Tools(args) => handlers::handle_tools(args, &mut output),
        Commands::Call(args) => handlers::handle_call(args, &config, &mut output).await,
        Commands::Request(args) => handlers::handle_request(args, &config, &mut output).await,
        Commands::Serve(args) => handlers::handle_serve(args, &config).await,
        Commands::Completions(args) => handlers::handle_completions(args),
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let verbosity = cli.verbosity_level();
    let mut logging_config = LoggingConfig::from_verbosity(verbosity);

    if let Some(file) = &config.logging {
        logging_config.merge_file(file, verbosity);
    }
    logging_config.merge_with_env();

    // If quiet mode, only log errors
    if cli.quiet {
        logging_config.level = "error".to_string();
    }
    if cli.no_color {
        logging_config.ansi = false;
    }

    logging::init_logging(logging_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["ovhgate", "-vv", "tools"]);
        assert_eq!(cli.verbosity_level(), 2);

        let cli = Cli::parse_from(["ovhgate", "--quiet", "call", "list_domains"]);
        assert_eq!(cli.verbosity_level(), 0);

        let cli = Cli::parse_from(["ovhgate", "serve", "--max-concurrency", "4"]);
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.max_concurrency, 4),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
