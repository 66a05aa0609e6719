use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ExportError, Result};
use crate::runner::{CommandRunner, Invocation, ProcessRunner};
use crate::session::{Session, SessionState};
use crate::validate::{ExportSummary, validate_export};

// `bw` expects BW_CLIENTID without an underscore between CLIENT and ID.
const ENV_CLIENT_ID: &str = "BW_CLIENTID";
const ENV_CLIENT_SECRET: &str = "BW_CLIENTSECRET";
const ENV_PASSWORD: &str = "BW_PASSWORD";
const ENV_SESSION: &str = "BW_SESSION";

/// API key and master password handed to `bw` through its environment.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Drives the `bw` CLI through login, unlock, export and logout.
#[derive(Debug)]
pub struct BitwardenAgent<R: CommandRunner = ProcessRunner> {
    cli_path: PathBuf,
    credentials: Credentials,
    file_mode: Option<u32>,
    runner: R,
}

impl BitwardenAgent<ProcessRunner> {
    pub fn new(cli_path: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self::with_runner(cli_path, credentials, ProcessRunner)
    }
}

impl<R: CommandRunner> BitwardenAgent<R> {
    pub fn with_runner(cli_path: impl Into<PathBuf>, credentials: Credentials, runner: R) -> Self {
        Self {
            cli_path: cli_path.into(),
            credentials,
            file_mode: None,
            runner,
        }
    }

    /// Permissions to apply to each export file once written.
    pub fn file_mode(mut self, mode: Option<u32>) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Log in with the API key.
    pub fn login(&self) -> Result<Session> {
        tracing::info!("Running bitwarden login command");
        let key = self.execute(self.invocation(None).arg("login").arg("--apikey").arg("--raw"))?;
        Session::new(&key, SessionState::Authenticated, "login")
    }

    /// Log in, clearing a stale login left behind by an earlier run first.
    pub fn safe_login(&self) -> Result<Session> {
        match self.login() {
            Err(e) if e.is_already_logged_in() => {
                tracing::warn!("bw reports an existing login; logging out and retrying");
                self.force_logout()?;
                self.login()
            }
            other => other,
        }
    }

    /// Unlock the vault, returning a session that can export.
    pub fn unlock(&self, session: &Session) -> Result<Session> {
        tracing::info!("Running bitwarden unlock command");
        let key = session.require("unlock", SessionState::Authenticated)?;
        let unlocked = self.execute(
            self.invocation(Some(key))
                .arg("unlock")
                .arg("--passwordenv")
                .arg(ENV_PASSWORD)
                .arg("--raw"),
        )?;
        Session::new(&unlocked, SessionState::Unlocked, "unlock")
    }

    /// Export the vault as JSON to `target` and validate the result.
    pub fn export(&self, session: &Session, target: &Path) -> Result<ExportSummary> {
        tracing::info!(path = %target.display(), "Running bitwarden export command");
        let key = session.require("export", SessionState::Unlocked)?;
        self.execute(
            self.invocation(Some(key))
                .arg("export")
                .arg("--format")
                .arg("json")
                .arg("--output")
                .arg(target.as_os_str()),
        )?;

        if let Some(mode) = self.file_mode {
            apply_file_mode(target, mode)?;
        }

        validate_export(target)
    }

    /// End the session.
    pub fn logout(&self, session: Session) -> Result<()> {
        tracing::info!("Running bitwarden logout command");
        let key = session.require("logout", SessionState::Authenticated)?;
        self.execute(self.invocation(Some(key)).arg("logout"))?;
        Ok(())
    }

    fn force_logout(&self) -> Result<()> {
        self.execute(self.invocation(None).arg("logout"))?;
        Ok(())
    }

    fn invocation(&self, session_key: Option<&str>) -> Invocation {
        let invocation = Invocation::new(&self.cli_path)
            .env(ENV_CLIENT_ID, &self.credentials.client_id)
            .env(ENV_CLIENT_SECRET, &self.credentials.client_secret)
            .env(ENV_PASSWORD, &self.credentials.password);

        match session_key {
            Some(key) => invocation.env(ENV_SESSION, key),
            None => invocation,
        }
    }

    /// Run to completion and return trimmed stdout.
    fn execute(&self, invocation: Invocation) -> Result<String> {
        let command = invocation.to_string();
        let output = self
            .runner
            .run(&invocation)
            .map_err(|source| ExportError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.success {
            let stderr = output.stderr.trim().to_string();
            tracing::error!(command = %command, code = ?output.code, stderr = %stderr, "Command failed");
            return Err(ExportError::CommandFailed {
                command,
                code: output.code,
                stderr,
            });
        }

        tracing::debug!(command = %command, "Command succeeded");
        Ok(output.stdout.trim().to_string())
    }
}

#[cfg(unix)]
fn apply_file_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|source| {
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn apply_file_mode(path: &Path, mode: u32) -> Result<()> {
    tracing::debug!(path = %path.display(), mode = format!("{mode:o}"), "File modes are not supported on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use std::cell::RefCell;
    use std::io;
    use tempfile::TempDir;

    type Responder = Box<dyn Fn(&Invocation) -> io::Result<CommandOutput>>;

    /// Records invocations and answers them from a closure.
    struct ScriptedRunner {
        calls: RefCell<Vec<Invocation>>,
        responder: Responder,
    }

    impl ScriptedRunner {
        fn new(responder: impl Fn(&Invocation) -> io::Result<CommandOutput> + 'static) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                responder: Box::new(responder),
            }
        }

        fn commands(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|i| i.arg_str(0).unwrap_or_default().to_string())
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
            self.calls.borrow_mut().push(invocation.clone());
            (self.responder)(invocation)
        }
    }

    /// A well-behaved `bw`: hands out keys and writes a small export.
    fn happy_bw(invocation: &Invocation) -> io::Result<CommandOutput> {
        match invocation.arg_str(0) {
            Some("login") => Ok(CommandOutput::ok("login-key\n")),
            Some("unlock") => Ok(CommandOutput::ok("unlock-key\n")),
            Some("export") => {
                let target = invocation.args.last().expect("output path");
                std::fs::write(target, r#"{"encrypted":false,"items":[{"id":"1"}]}"#)?;
                Ok(CommandOutput::ok("Saved"))
            }
            Some("logout") => Ok(CommandOutput::ok("You have logged out.")),
            _ => Ok(CommandOutput::failed(1, "unknown command")),
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            client_id: "user.abc".to_string(),
            client_secret: "client-secret".to_string(),
            password: "master-password".to_string(),
        }
    }

    fn agent(runner: ScriptedRunner) -> BitwardenAgent<ScriptedRunner> {
        BitwardenAgent::with_runner("/usr/bin/bw", credentials(), runner)
    }

    #[test]
    fn test_full_session_lifecycle() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("export.json");
        let agent = agent(ScriptedRunner::new(happy_bw));

        let session = agent.login().unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        let session = agent.unlock(&session).unwrap();
        assert_eq!(session.state(), SessionState::Unlocked);
        let summary = agent.export(&session, &target).unwrap();
        assert_eq!(summary.item_count, 1);
        agent.logout(session).unwrap();

        assert_eq!(
            agent.runner().commands(),
            vec!["login", "unlock", "export", "logout"]
        );

        let calls = agent.runner().calls.borrow();
        assert!(!calls[0].has_env(ENV_SESSION));
        assert!(calls[0].has_env(ENV_CLIENT_ID));
        assert!(
            calls[2]
                .envs
                .contains(&(ENV_SESSION.to_string(), "unlock-key".to_string()))
        );
    }

    #[test]
    fn test_export_requires_unlocked_session() {
        let dir = TempDir::new().unwrap();
        let agent = agent(ScriptedRunner::new(happy_bw));

        let session = agent.login().unwrap();
        let err = agent
            .export(&session, &dir.path().join("export.json"))
            .unwrap_err();

        assert!(matches!(
            err,
            ExportError::SessionRequired {
                command: "export",
                ..
            }
        ));
        // Fails closed: bw export never ran.
        assert_eq!(agent.runner().commands(), vec!["login"]);
    }

    #[test]
    fn test_safe_login_recovers_from_stale_login() {
        let attempts = RefCell::new(0);
        let runner = ScriptedRunner::new(move |invocation| match invocation.arg_str(0) {
            Some("login") => {
                let mut attempts = attempts.borrow_mut();
                *attempts += 1;
                if *attempts == 1 {
                    Ok(CommandOutput::failed(1, "You are already logged in as user@example.com."))
                } else {
                    Ok(CommandOutput::ok("fresh-key"))
                }
            }
            _ => happy_bw(invocation),
        });
        let agent = agent(runner);

        let session = agent.safe_login().unwrap();

        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(agent.runner().commands(), vec!["login", "logout", "login"]);
    }

    #[test]
    fn test_safe_login_propagates_other_failures() {
        let agent = agent(ScriptedRunner::new(|_| {
            Ok(CommandOutput::failed(1, "client_id or client_secret is incorrect"))
        }));

        let err = agent.safe_login().unwrap_err();
        assert!(matches!(err, ExportError::CommandFailed { code: Some(1), .. }));
        assert_eq!(agent.runner().commands(), vec!["login"]);
    }

    #[test]
    fn test_empty_login_output_is_rejected() {
        let agent = agent(ScriptedRunner::new(|_| Ok(CommandOutput::ok("\n"))));
        assert!(matches!(
            agent.login(),
            Err(ExportError::EmptySessionKey { command: "login" })
        ));
    }

    #[test]
    fn test_spawn_failure() {
        let agent = agent(ScriptedRunner::new(|_| {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }));
        assert!(matches!(agent.login(), Err(ExportError::Spawn { .. })));
    }

    #[test]
    fn test_failed_export_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let agent = agent(ScriptedRunner::new(|invocation| match invocation.arg_str(0) {
            Some("export") => Ok(CommandOutput::failed(2, "  Vault is locked.\n")),
            _ => happy_bw(invocation),
        }));

        let session = agent.unlock(&agent.login().unwrap()).unwrap();
        let err = agent
            .export(&session, &dir.path().join("export.json"))
            .unwrap_err();

        match err {
            ExportError::CommandFailed { stderr, code, .. } => {
                assert_eq!(stderr, "Vault is locked.");
                assert_eq!(code, Some(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_export_applies_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("export.json");
        let agent = agent(ScriptedRunner::new(happy_bw)).file_mode(Some(0o640));

        let session = agent.unlock(&agent.login().unwrap()).unwrap();
        agent.export(&session, &target).unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let debug = format!("{:?}", credentials());
        assert!(debug.contains("user.abc"));
        assert!(!debug.contains("client-secret"));
        assert!(!debug.contains("master-password"));
    }
}
