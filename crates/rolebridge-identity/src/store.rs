//! The identity store: a lock-guarded link table backed by a JSON file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rolebridge_protocol::{LocalUserId, RemoteAccountId};

use crate::IdentityError;
use crate::table::{LinkFile, LinkTable};

/// Bidirectional local ↔ remote identity links.
///
/// Reads take a shared lock, [`set_link`](Self::set_link) takes the
/// exclusive lock for both the table update and the file flush, so a reader
/// never sees half a pair and two flushes never race each other on disk.
/// The file is replaced with a write-then-rename, so a crash mid-flush
/// leaves the previous version intact.
///
/// All methods are synchronous and may touch the disk. Call them from the
/// worker pool, not from the authoritative context.
#[derive(Debug)]
pub struct IdentityStore {
    path: Option<PathBuf>,
    table: RwLock<LinkTable>,
}

impl IdentityStore {
    /// Opens the store at `path`, loading whatever links it holds.
    ///
    /// Never fails: a missing file starts empty, and an unreadable or
    /// malformed one is logged, set aside as `<path>.bak` when possible, and
    /// also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = match load(&path) {
            Ok(table) => {
                tracing::info!(path = %path.display(), links = table.len(), "identity links loaded");
                table
            }
            Err(e) => {
                tracing::error!(error = %e, "could not load identity links, starting empty");
                if matches!(e, IdentityError::Decode { .. }) {
                    set_aside(&path);
                }
                LinkTable::default()
            }
        };
        Self {
            path: Some(path),
            table: RwLock::new(table),
        }
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: RwLock::new(LinkTable::default()),
        }
    }

    /// Links `remote` ↔ `local`, replacing any earlier link on either side,
    /// then flushes to disk.
    ///
    /// # Errors
    /// Returns the flush error, if any. The in-memory link is updated
    /// regardless, so lookups reflect the new link even when persisting it
    /// failed.
    pub fn set_link(
        &self,
        remote: RemoteAccountId,
        local: LocalUserId,
    ) -> Result<(), IdentityError> {
        let mut table = self.write();
        table.insert(remote.clone(), local);
        tracing::info!(%local, account = %remote, "identity link stored");

        match &self.path {
            Some(path) => flush(path, &table),
            None => Ok(()),
        }
    }

    /// The local user linked to `remote`, if any.
    pub fn get_local_id(&self, remote: &RemoteAccountId) -> Option<LocalUserId> {
        self.read().local_of(remote)
    }

    /// The remote account linked to `local`, if any.
    pub fn get_remote_id(&self, local: LocalUserId) -> Option<RemoteAccountId> {
        self.read().remote_of(&local)
    }

    /// Visits every link.
    ///
    /// Iterates a snapshot taken at the start, so the visitor may call back
    /// into the store (even `set_link`) without deadlocking, and a write
    /// that lands mid-iteration is simply not seen.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(LocalUserId, &RemoteAccountId),
    {
        for (local, remote) in self.snapshot() {
            visitor(local, &remote);
        }
    }

    /// A copy of every link, ordered by local user id.
    pub fn snapshot(&self) -> Vec<(LocalUserId, RemoteAccountId)> {
        self.read().pairs()
    }

    /// Number of linked pairs.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing is linked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where the store persists, if anywhere.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // A panic while holding the lock can't leave the table half-updated
    // (insert never panics between its two map writes), so poison is ignored.
    fn read(&self) -> RwLockReadGuard<'_, LinkTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LinkTable> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn load(path: &Path) -> Result<LinkTable, IdentityError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LinkTable::default()),
        Err(source) => {
            return Err(IdentityError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(LinkTable::default());
    }
    let file: LinkFile =
        serde_json::from_slice(&bytes).map_err(|source| IdentityError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(LinkTable::from_file(file))
}

fn flush(path: &Path, table: &LinkTable) -> Result<(), IdentityError> {
    let io_err = |source| IdentityError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = serde_json::to_vec_pretty(&table.to_file()).map_err(IdentityError::Encode)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    tracing::debug!(path = %path.display(), links = table.len(), "identity links flushed");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn set_aside(path: &Path) {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    let backup = PathBuf::from(name);
    match fs::rename(path, &backup) {
        Ok(()) => tracing::warn!(backup = %backup.display(), "malformed identity file set aside"),
        Err(e) => tracing::warn!(error = %e, "could not set aside malformed identity file"),
    }
}
