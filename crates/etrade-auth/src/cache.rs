//! Single-record credential cache
//!
//! Persists the last successful handshake so the next process start can skip
//! the verifier flow. The file holds one MessagePack-encoded `SessionRecord`;
//! its presence is the only validity signal. Anything that fails to decode,
//! or decodes to a record with an empty field, is treated as if the file were
//! missing.
//!
//! Writes go through a temp file + rename in the same directory, with 0600
//! permissions on unix since the record contains token secrets.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Credentials needed to rebuild a signed session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}

/// Everything persisted after a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub request_token: String,
    pub request_token_secret: String,
    pub authorize_url: String,
    pub verifier: String,
    pub session: SessionCredentials,
}

impl SessionRecord {
    /// All fields non-empty.
    pub fn is_complete(&self) -> bool {
        [
            &self.request_token,
            &self.request_token_secret,
            &self.authorize_url,
            &self.verifier,
            &self.session.consumer_key,
            &self.session.consumer_secret,
            &self.session.access_token,
            &self.session.access_token_secret,
        ]
        .iter()
        .all(|field| !field.is_empty())
    }
}

/// File-backed cache for one `SessionRecord`.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
}

impl CredentialCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached record. Never fails: a missing, unreadable, corrupt,
    /// or incomplete file all return `None`.
    pub async fn load(&self) -> Option<SessionRecord> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cached session");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache file unreadable, ignoring");
                return None;
            }
        };

        match rmp_serde::from_slice::<SessionRecord>(&bytes) {
            Ok(record) if record.is_complete() => {
                debug!(path = %self.path.display(), "loaded cached session");
                Some(record)
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "cached session incomplete, ignoring");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache file corrupt, ignoring");
                None
            }
        }
    }

    /// Overwrite the cache with `record`.
    pub async fn store(&self, record: &SessionRecord) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(record)
            .map_err(|e| Error::Encode(format!("serializing session record: {e}")))?;
        write_atomic(&self.path, &bytes).await?;
        info!(path = %self.path.display(), "cached session written");
        Ok(())
    }

    /// Delete the cache file. Clearing an absent cache is a no-op.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "cached session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(format!("removing cache file: {e}"))),
        }
    }
}

/// Write bytes to `path` via a sibling temp file and rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("cache path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("cache path has no file name".into()))?
        .to_string_lossy();

    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| Error::Io(format!("writing temp cache file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting cache file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp cache file: {e}")))?;

    debug!(path = %path.display(), "persisted cache file");
    Ok(())
}
