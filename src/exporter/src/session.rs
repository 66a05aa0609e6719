use std::fmt;

use crate::error::{ExportError, Result};

/// How far a `bw` session has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Logged in with the API key; the vault is still locked.
    Authenticated,
    /// Vault unlocked; exports are possible.
    Unlocked,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Authenticated => "authenticated",
            SessionState::Unlocked => "unlocked",
        };
        f.write_str(name)
    }
}

/// A `bw` session key and the state it grants.
///
/// The key is never printed; `Debug` shows the state only.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    key: String,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(key: &str, state: SessionState, command: &'static str) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ExportError::EmptySessionKey { command });
        }
        Ok(Self {
            key: key.to_string(),
            state,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Fail closed unless this session has reached `required`.
    pub fn require(&self, command: &'static str, required: SessionState) -> Result<&str> {
        if self.state < required || self.key.is_empty() {
            return Err(ExportError::SessionRequired {
                command,
                required,
                actual: self.state,
            });
        }
        Ok(&self.key)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
