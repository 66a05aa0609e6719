//! A full backup run: export the vault, then rotate old exports.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use common::Configuration;
use exporter::{BitwardenAgent, CommandRunner, Credentials, ExportSummary, Session};
use rotator::{Clock, FileNaming, FileRotator, RetentionPolicy, RotationOutcome};

#[derive(Debug)]
pub struct BackupReport {
    pub export: ExportSummary,
    pub rotation: RotationOutcome,
}

pub fn build_rotator(config: &Configuration) -> Result<FileRotator> {
    let naming = FileNaming::new(&config.export.prefix, &config.export.extension)
        .context("Invalid export file naming")?;
    let policy = RetentionPolicy::new(
        config.rotation.min_copies as usize,
        u64::from(config.rotation.ttl_hours),
    );

    Ok(FileRotator::new(&config.export.dir, naming, policy).dry_run(config.rotation.dry_run))
}

pub fn build_agent(config: &Configuration) -> BitwardenAgent {
    let credentials = Credentials {
        client_id: config.bitwarden.client_id.clone(),
        client_secret: config.bitwarden.client_secret.clone(),
        password: config.bitwarden.password.clone(),
    };

    BitwardenAgent::new(&config.bitwarden.cli_path, credentials).file_mode(config.export.file_mode)
}

/// Log in, export, log out, then rotate.
///
/// Logout is attempted whatever happened after login. Rotation only runs
/// once a fresh export has passed validation.
pub fn run_backup<R: CommandRunner, C: Clock>(
    agent: &BitwardenAgent<R>,
    rotator: &FileRotator<C>,
) -> Result<BackupReport> {
    log::info!("Starting backup of the Bitwarden vault");

    let session = agent.safe_login().context("Bitwarden login failed")?;
    let (session, exported) = export_vault(agent, rotator, session);

    if let Err(e) = agent.logout(session) {
        tracing::warn!(error = %e, "Bitwarden logout failed");
    }

    let export = exported?;
    tracing::info!(
        path = %export.path.display(),
        items = export.item_count,
        folders = export.folder_count,
        "Export validated"
    );

    let rotation = rotator.rotate().context("Rotation of old exports failed")?;
    Ok(BackupReport { export, rotation })
}

/// Returns the most advanced session reached so the caller can log it out.
fn export_vault<R: CommandRunner, C: Clock>(
    agent: &BitwardenAgent<R>,
    rotator: &FileRotator<C>,
    session: Session,
) -> (Session, Result<ExportSummary>) {
    let unlocked = match agent.unlock(&session) {
        Ok(unlocked) => unlocked,
        Err(e) => return (session, Err(e).context("Failed to unlock the vault")),
    };

    let target = match rotator.new_file_path() {
        Ok(target) => target,
        Err(e) => return (unlocked, Err(e).context("Unable to choose an export path")),
    };

    let exported = agent.export(&unlocked, &target).map_err(|e| {
        if e.is_validation_failure() {
            discard(&target);
        }
        anyhow::Error::new(e).context("Vault export failed")
    });

    (unlocked, exported)
}

// A rejected export must not count towards the minimum copies.
fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::warn!(path = %path.display(), "Removed invalid export"),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to remove invalid export"),
    }
}
