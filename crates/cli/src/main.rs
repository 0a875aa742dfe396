//! DeepSearch CLI — the main entry point.
//!
//! Commands:
//! - `ask`     — Research a question and stream the answer
//! - `config`  — Show, initialize, or locate the config file
//! - `doctor`  — Diagnose keys and provider reachability

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deepsearch",
    about = "DeepSearch — answers questions by searching and reading the web",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging and progress output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question and print the answer
    Ask {
        /// The question to research
        question: String,

        /// Override the step budget (search/scrape actions before a forced answer)
        #[arg(long)]
        max_steps: Option<u32>,

        /// Cancel the run after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the answer only once it is complete
        #[arg(long)]
        no_stream: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets masked)
    Show,
    /// Write a default config file if none exists
    Init,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the answer
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            max_steps,
            timeout,
            no_stream,
        } => {
            commands::ask::run(commands::ask::AskOptions {
                question,
                max_steps,
                timeout_secs: timeout,
                stream: !no_stream,
                verbose: cli.verbose,
            })
            .await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_flags() {
        let cli = Cli::parse_from([
            "deepsearch",
            "ask",
            "Who won the 2024 Masters?",
            "--max-steps",
            "3",
            "--timeout",
            "60",
            "--no-stream",
        ]);
        match cli.command {
            Commands::Ask {
                question,
                max_steps,
                timeout,
                no_stream,
            } => {
                assert_eq!(question, "Who won the 2024 Masters?");
                assert_eq!(max_steps, Some(3));
                assert_eq!(timeout, Some(60));
                assert!(no_stream);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn parses_config_subcommands() {
        let cli = Cli::parse_from(["deepsearch", "-v", "config", "show"]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
