//! Terminal connection parameters.

use serde::Deserialize;
use std::fmt;

/// Connection parameters supplied once per session.
///
/// Every field is optional; unset fields are left out of the terminal's
/// `initialize` call so that the terminal falls back to its own settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Path to the terminal executable.
    #[serde(default)]
    pub path: Option<String>,
    /// Trading account number.
    #[serde(default)]
    pub login: Option<i64>,
    /// Trading account password.
    #[serde(default)]
    pub password: Option<String>,
    /// Trade server name.
    #[serde(default)]
    pub server: Option<String>,
    /// Connection timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Start the terminal in portable mode.
    #[serde(default)]
    pub portable: Option<bool>,
}

impl ConnectionConfig {
    /// Summary of the supplied fields for error context. The password value
    /// is replaced by `***`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(path) = &self.path {
            parts.push(format!("path={path}"));
        }
        if let Some(login) = self.login {
            parts.push(format!("login={login}"));
        }
        if self.password.is_some() {
            parts.push("password=***".to_string());
        }
        if let Some(server) = &self.server {
            parts.push(format!("server={server}"));
        }
        if let Some(timeout) = self.timeout {
            parts.push(format!("timeout={timeout}"));
        }
        if let Some(portable) = self.portable {
            parts.push(format!("portable={portable}"));
        }
        parts.join(", ")
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("path", &self.path)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***REDACTED***"))
            .field("server", &self.server)
            .field("timeout", &self.timeout)
            .field("portable", &self.portable)
            .finish()
    }
}
