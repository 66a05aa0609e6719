use clap::{Args, Subcommand};
use std::path::PathBuf;

/// CLI arguments shared by every vaultkeep command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Enable quiet mode (warnings and errors only)"
    )]
    pub quiet: bool,
}

/// Subcommands that only inspect configuration
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration (secrets redacted) and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log level implied by the CLI flags.
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments. `RUST_LOG` wins when set.
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("vaultkeep configuration:");
            println!("========================");
            println!("Export directory: {}", config.export.dir.display());
            println!("File prefix: {}", config.export.prefix);
            println!("File extension: {}", config.export.extension);
            match config.export.file_mode {
                Some(mode) => println!("File mode: {mode:o}"),
                None => println!("File mode: unchanged"),
            }
            println!("Minimum copies: {}", config.rotation.min_copies);
            println!("TTL hours: {}", config.rotation.ttl_hours);
            println!("Dry run: {}", config.rotation.dry_run);
            println!("bw CLI: {}", config.bitwarden.cli_path.display());
            println!("Client ID: {}", config.bitwarden.client_id);
            match &config.reporting.dsn {
                Some(_) => println!("Error reporting: sentry (DSN redacted)"),
                None => println!("Error reporting: log only"),
            }
        }
        Ok(())
    }

    /// Check that the configured paths are usable on this host
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        config.validate()?;

        if !config.export.dir.is_dir() {
            anyhow::bail!(
                "Export directory {} does not exist or is not a directory",
                config.export.dir.display()
            );
        }

        if !config.bitwarden.cli_path.is_file() {
            anyhow::bail!(
                "bw CLI not found at {}",
                config.bitwarden.cli_path.display()
            );
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't touch the vault or the export directory
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BitwardenConfig, Configuration, ExportConfig, ReportingConfig, RotationConfig,
    };
    use clap::{CommandFactory, Parser};

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,

        #[command(subcommand)]
        command: Option<CommonCommands>,
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        TestCli::command().debug_assert();
    }

    #[test]
    fn test_log_level_from_flags() {
        let cli = TestCli::parse_from(["vaultkeep", "-v"]);
        assert_eq!(utils::log_level(&cli.common), "debug");

        let cli = TestCli::parse_from(["vaultkeep", "--quiet"]);
        assert_eq!(utils::log_level(&cli.common), "warn");

        let cli = TestCli::parse_from(["vaultkeep"]);
        assert_eq!(utils::log_level(&cli.common), "info");
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(TestCli::try_parse_from(["vaultkeep", "-q", "-v"]).is_err());
    }

    fn config_for(dir: &std::path::Path, cli_path: &std::path::Path) -> Configuration {
        Configuration {
            export: ExportConfig {
                dir: dir.to_path_buf(),
                prefix: "bitwarden_export".to_string(),
                extension: "json".to_string(),
                file_mode: None,
            },
            rotation: RotationConfig {
                min_copies: 3,
                ttl_hours: 24,
                dry_run: false,
            },
            bitwarden: BitwardenConfig {
                client_id: "user.test".to_string(),
                client_secret: "secret".to_string(),
                password: "password".to_string(),
                cli_path: cli_path.to_path_buf(),
            },
            reporting: ReportingConfig::default(),
        }
    }

    #[test]
    fn test_validate_config_checks_host_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let bw = dir.path().join("bw");
        std::fs::write(&bw, "#!/bin/sh\n").unwrap();

        assert!(utils::validate_config(&config_for(dir.path(), &bw)).is_ok());

        let missing_dir = config_for(&dir.path().join("absent"), &bw);
        let err = utils::validate_config(&missing_dir).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        let missing_cli = config_for(dir.path(), &dir.path().join("no-bw"));
        let err = utils::validate_config(&missing_cli).unwrap_err();
        assert!(err.to_string().contains("bw CLI not found"));
    }

    #[test]
    fn test_config_subcommand_json_flag() {
        let cli = TestCli::parse_from(["vaultkeep", "config", "--json"]);
        assert!(matches!(cli.command, Some(CommonCommands::Config { json: true })));
    }
}
