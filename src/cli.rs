//! CLI argument parsing for the schoolbus-planner binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "schoolbus-planner", about = "School bus route planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Plan routes for an optimize request (JSON on stdin or from a file)
    Optimize {
        /// Request file; stdin when omitted
        #[arg(long, short)]
        input: Option<PathBuf>,
        /// Pretty-print the response
        #[arg(long)]
        pretty: bool,
    },
    /// Resolve an address or map link to coordinates
    Resolve {
        text: String,
    },
    /// Expand a short map link to its long form
    Expand {
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_optimize_defaults_to_stdin() {
        let cli = Cli::parse_from(["schoolbus-planner", "optimize"]);
        assert!(matches!(
            cli.command,
            Command::Optimize {
                input: None,
                pretty: false
            }
        ));
    }

    #[test]
    fn test_cli_optimize_with_file() {
        let cli = Cli::parse_from(["schoolbus-planner", "optimize", "--input", "req.json", "--pretty"]);
        match cli.command {
            Command::Optimize { input, pretty } => {
                assert_eq!(input, Some(PathBuf::from("req.json")));
                assert!(pretty);
            }
            _ => panic!("expected optimize"),
        }
    }

    #[test]
    fn test_cli_resolve_takes_text() {
        let cli = Cli::parse_from(["schoolbus-planner", "resolve", "https://maps.app.goo.gl/x"]);
        assert!(matches!(cli.command, Command::Resolve { ref text } if text == "https://maps.app.goo.gl/x"));
    }

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["schoolbus-planner"]).is_err());
    }
}
