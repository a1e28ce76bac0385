//! Persisted session credential.
//!
//! One opaque token, kept across runs so `status`/`logout` can present it as
//! a bearer credential. Stored in a plain file readable only by the owner;
//! the value itself stays wrapped in [`SecretString`] in memory.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored credential, if any. A missing or empty file means "not
    /// signed in" rather than an error.
    #[must_use]
    pub fn load(&self) -> Option<SecretString> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let token = raw.trim();
        if token.is_empty() {
            return None;
        }
        Some(SecretString::from(token.to_string()))
    }

    pub fn save(&self, token: &SecretString) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        fs::write(&self.path, token.expose_secret())
            .with_context(|| format!("writing {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("restricting {}", self.path.display()))?;
        }

        debug!("session credential stored at {}", self.path.display());
        Ok(())
    }

    /// Remove the stored credential. Already-absent is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("removing {}", self.path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token"));
        (dir, store)
    }

    #[test]
    fn round_trips_a_credential() {
        let (_dir, store) = store();
        assert!(store.load().is_none());

        store.save(&SecretString::from("abc123".to_string())).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.expose_secret(), "abc123");
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, store) = store();
        store.clear().unwrap();

        store.save(&SecretString::from("abc".to_string())).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn empty_file_counts_as_absent() {
        let (_dir, store) = store();
        fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested/dir/token"));
        store.save(&SecretString::from("abc".to_string())).unwrap();
        assert!(store.load().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn credential_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save(&SecretString::from("abc".to_string())).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
