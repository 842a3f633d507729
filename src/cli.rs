use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::benchmark::{self, BenchPath};
use crate::config::{self, Config};
use crate::unwind::set_thread_settings;

#[derive(Parser)]
#[command(name = "unwind")]
#[command(about = "Unwind - non-local control transfer core", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure escapes through a chain of bindings and cleanups
    Bench {
        /// Number of frames between the escape and its block
        #[arg(long, default_value = "16")]
        depth: usize,

        /// Number of escapes per path
        #[arg(long, default_value = "10000")]
        iterations: usize,

        /// Transfer path to measure
        #[arg(long, value_enum, default_value = "both")]
        path: BenchPath,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective settings as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::try_parse_from(args)?;
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before executing any command so config errors show first
    let config = Config::builder()
        .config_path(cli.config)
        .build()
        .context("Failed to load configuration")?;
    config::install(config.settings.clone());

    execute(cli.command, &config)
}

/// Run one command under `config`, whose settings govern this thread.
pub fn execute(command: Commands, config: &Config) -> Result<()> {
    set_thread_settings(config.settings.clone());

    match command {
        Commands::Bench {
            depth,
            iterations,
            path,
            json,
        } => {
            let report = benchmark::run_benchmark(benchmark::BenchmarkParams {
                depth,
                iterations,
                path,
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                benchmark::display_report(&report);
            }
        }

        Commands::Config => {
            if let Some(source) = &config.source {
                println!("# loaded from {}", source.display());
            }
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::unwind::thread_settings;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bench_defaults() {
        let cli = Cli::try_parse_from(args(&["unwind", "bench"])).unwrap();
        let Commands::Bench {
            depth,
            iterations,
            path,
            json,
        } = cli.command
        else {
            unreachable!("expected bench command");
        };
        assert_eq!(depth, 16);
        assert_eq!(iterations, 10000);
        assert_eq!(path, BenchPath::Both);
        assert!(!json);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(args(&["unwind", "config", "--config", "custom.toml"]))
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Config));
    }

    #[test]
    fn test_unknown_path_rejected() {
        let result = Cli::try_parse_from(args(&["unwind", "bench", "--path", "sideways"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_small_bench_runs() {
        let config = Config {
            settings: Settings::default(),
            source: None,
        };
        let command = Commands::Bench {
            depth: 4,
            iterations: 3,
            path: BenchPath::Both,
            json: true,
        };
        execute(command, &config).unwrap();
        assert_eq!(thread_settings(), Settings::default());
    }

    #[test]
    fn test_execute_applies_config_settings() {
        let settings = Settings {
            strict_abandon: true,
            force_fallback: false,
        };
        let config = Config {
            settings: settings.clone(),
            source: None,
        };
        execute(Commands::Config, &config).unwrap();
        assert_eq!(thread_settings(), settings);
        assert_eq!(crate::config::current_settings(), Settings::default());
    }
}
