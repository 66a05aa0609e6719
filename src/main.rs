mod backup;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::reporting;
use common::{Configuration, ErrorReporter, LogReporter};

#[derive(Parser)]
#[command(name = "vaultkeep")]
#[command(about = "vaultkeep - Bitwarden vault export with bounded on-disk history")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<VaultkeepCommands>,
}

#[derive(Subcommand, Default)]
enum VaultkeepCommands {
    /// Export the vault, then rotate old exports (default)
    #[default]
    Backup,
    /// Rotate old exports without exporting
    Rotate,
    /// Print version information and exit
    Version,
    #[command(flatten)]
    Common(CommonCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    let command = cli.command.unwrap_or_default();
    if let VaultkeepCommands::Version = command {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    // Configuration errors are fatal before anything touches the vault or disk
    let config = match utils::load_config(cli.common.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            LogReporter.report(&e);
            return ExitCode::FAILURE;
        }
    };

    // Held until main returns so queued error events are flushed
    let sentry_guard = match reporting::init_sentry(&config.reporting) {
        Ok(guard) => guard,
        Err(e) => {
            LogReporter.report(&e);
            return ExitCode::FAILURE;
        }
    };
    let reporter = reporting::reporter_for(sentry_guard.as_ref());

    match run(&command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: &VaultkeepCommands, config: &Configuration) -> Result<()> {
    match command {
        VaultkeepCommands::Common(common_cmd) => utils::handle_common_command(common_cmd, config),
        VaultkeepCommands::Rotate => {
            let rotator = backup::build_rotator(config)?;
            let outcome = rotator.rotate().context("Rotation of old exports failed")?;
            log::info!(
                "Rotation finished: {} deleted, {} remaining",
                outcome.deleted,
                outcome.remaining
            );
            Ok(())
        }
        VaultkeepCommands::Backup => {
            log::info!("Loaded configuration:");
            log::info!("  Export directory: {}", config.export.dir.display());
            log::info!(
                "  Retention: at least {} copies, TTL {} hours",
                config.rotation.min_copies,
                config.rotation.ttl_hours
            );

            let rotator = backup::build_rotator(config)?;
            let agent = backup::build_agent(config);
            let report = backup::run_backup(&agent, &rotator)?;

            log::info!(
                "Backup finished: exported {} items to {}, rotation deleted {} and kept {}",
                report.export.item_count,
                report.export.path.display(),
                report.rotation.deleted,
                report.rotation.remaining
            );
            Ok(())
        }
        VaultkeepCommands::Version => Ok(()),
    }
}
