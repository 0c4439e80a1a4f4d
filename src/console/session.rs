//! Durable session storage for the console.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const SESSION_ENV: &str = "GBEXO_CONSOLE_SESSION";

#[derive(Serialize, Deserialize, Debug, Default)]
struct SessionFile {
    token: Option<String>,
}

/// In-memory token backed by a JSON file.
///
/// The default location is `~/.config/gbexo/session.json`; set
/// `GBEXO_CONSOLE_SESSION` to relocate it (tests do).
pub struct SessionStore {
    path: PathBuf,
    token: Option<String>,
}

impl SessionStore {
    /// # Errors
    /// Returns an error when no config directory can be resolved.
    pub fn new() -> Result<Self> {
        let path = match std::env::var(SESSION_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not resolve a configuration directory"))?
                .join("gbexo")
                .join("session.json"),
        };
        Ok(Self::with_path(path))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path, token: None }
    }

    /// Read the session file into memory. A missing file means logged out.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(&mut self) -> Result<()> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let file: SessionFile = serde_json::from_str(&contents)
                    .with_context(|| format!("Invalid session file: {}", self.path.display()))?;
                self.token = file.token;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.token = None;
                Ok(())
            }
            Err(err) => Err(err)
                .with_context(|| format!("Failed to read session file: {}", self.path.display())),
        }
    }

    /// Persist a token and keep it in memory.
    ///
    /// # Errors
    /// Returns an error when the file cannot be written.
    pub fn save(&mut self, token: String) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }
        let file = SessionFile {
            token: Some(token.clone()),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        self.token = Some(token);
        Ok(())
    }

    /// Drop the session from memory and disk. Missing file is fine.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be removed.
    pub fn clear(&mut self) -> Result<()> {
        self.token = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to remove session file: {}", self.path.display())),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn temp_store() -> SessionStore {
        let path = std::env::temp_dir()
            .join(format!("gbexo-console-{}", Ulid::new()))
            .join("session.json");
        SessionStore::with_path(path)
    }

    #[test]
    fn load_without_file_is_logged_out() -> Result<()> {
        let mut store = temp_store();
        store.load()?;
        assert!(store.token().is_none());
        Ok(())
    }

    #[test]
    fn save_then_load_round_trips() -> Result<()> {
        let mut store = temp_store();
        store.save("abc.def.ghi".to_string())?;
        assert_eq!(store.token(), Some("abc.def.ghi"));

        let mut reloaded = SessionStore::with_path(store.path.clone());
        reloaded.load()?;
        assert_eq!(reloaded.token(), Some("abc.def.ghi"));
        Ok(())
    }

    #[test]
    fn clear_removes_file_and_is_idempotent() -> Result<()> {
        let mut store = temp_store();
        store.save("abc.def.ghi".to_string())?;
        store.clear()?;
        assert!(store.token().is_none());
        assert!(!store.path.exists());

        // Clearing again must not error.
        store.clear()?;
        Ok(())
    }

    #[test]
    fn env_override_sets_path() -> Result<()> {
        let path = std::env::temp_dir().join(format!("gbexo-env-{}.json", Ulid::new()));
        temp_env::with_var(SESSION_ENV, Some(path.to_str().unwrap()), || {
            let store = SessionStore::new()?;
            assert_eq!(store.path, path);
            Ok(())
        })
    }

    #[test]
    fn corrupted_file_is_an_error() -> Result<()> {
        let mut store = temp_store();
        std::fs::create_dir_all(store.path.parent().unwrap())?;
        std::fs::write(&store.path, "not json")?;
        assert!(store.load().is_err());
        Ok(())
    }
}
