//! File-backed auth store so a step-up authorization survives between CLI runs

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::AuthorizationSession;
use crate::ports::AuthStore;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    #[serde(default)]
    session: Option<AuthorizationSession>,
}

/// Stores the session in `session.json` next to the settings
#[derive(Debug)]
pub struct FileAuthStore {
    path: PathBuf,
    account_id: Option<String>,
}

impl FileAuthStore {
    pub fn new(fundgate_dir: &Path, account_id: Option<String>) -> Self {
        Self {
            path: fundgate_dir.join("session.json"),
            account_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SessionFile> {
        if !self.path.exists() {
            return Ok(SessionFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        // A corrupt file just means "no session"; the user is prompted again
        Ok(serde_json::from_str(&content).unwrap_or_default())
    }

    /// Write the session file readable by the owner only
    fn write(&self, file: &SessionFile) -> Result<()> {
        let content = serde_json::to_string_pretty(file)?;
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut out = options.open(&self.path)?;
        // The mode above only applies when the file is created
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            out.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        out.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl AuthStore for FileAuthStore {
    fn session(&self) -> Result<Option<AuthorizationSession>> {
        Ok(self.read()?.session)
    }

    fn store_session(&self, session: AuthorizationSession) -> Result<()> {
        self.write(&SessionFile {
            session: Some(session),
        })
    }

    fn invalidate(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn current_account_id(&self) -> Option<String> {
        self.account_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_session_survives_new_store_instance() {
        let dir = tempdir().unwrap();
        let store = FileAuthStore::new(dir.path(), Some("acct".into()));
        store
            .store_session(AuthorizationSession::new("tok", 42, "acct"))
            .unwrap();

        let reopened = FileAuthStore::new(dir.path(), Some("acct".into()));
        let session = reopened.session().unwrap().unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.expires_at_epoch_ms, 42);
    }

    #[test]
    fn test_invalidate_removes_file() {
        let dir = tempdir().unwrap();
        let store = FileAuthStore::new(dir.path(), None);
        store
            .store_session(AuthorizationSession::new("tok", 42, "acct"))
            .unwrap();
        assert!(store.path().exists());
        store.invalidate().unwrap();
        assert!(!store.path().exists());
        // Second invalidate is a no-op
        store.invalidate().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileAuthStore::new(dir.path(), Some("acct".into()));
        store
            .store_session(AuthorizationSession::new("tok", 42, "acct"))
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        store.invalidate().unwrap();
        store
            .store_session(AuthorizationSession::new("tok", 42, "acct"))
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("session.json"), "not json").unwrap();
        let store = FileAuthStore::new(dir.path(), None);
        assert!(store.session().unwrap().is_none());
    }
}
