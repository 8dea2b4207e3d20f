//! The in-memory link table and its on-disk shape.

use std::collections::{BTreeMap, HashMap};

use rolebridge_protocol::{LocalUserId, RemoteAccountId};
use serde::{Deserialize, Serialize};

/// Both directions of the mapping, always kept in step.
#[derive(Debug, Default, Clone)]
pub(crate) struct LinkTable {
    by_remote: HashMap<RemoteAccountId, LocalUserId>,
    by_local: HashMap<LocalUserId, RemoteAccountId>,
}

impl LinkTable {
    /// Links `remote` ↔ `local`, last writer wins on both sides.
    ///
    /// Any previous partner of either side is unlinked first, so the
    /// one-to-one invariant holds after every call.
    pub(crate) fn insert(&mut self, remote: RemoteAccountId, local: LocalUserId) {
        if let Some(old_local) = self.by_remote.remove(&remote) {
            if old_local != local {
                self.by_local.remove(&old_local);
                tracing::info!(account = %remote, previous = %old_local, "remote account relinked");
            }
        }
        if let Some(old_remote) = self.by_local.remove(&local) {
            if old_remote != remote {
                self.by_remote.remove(&old_remote);
                tracing::info!(%local, previous = %old_remote, "local user relinked");
            }
        }
        self.by_remote.insert(remote.clone(), local);
        self.by_local.insert(local, remote);
    }

    pub(crate) fn local_of(&self, remote: &RemoteAccountId) -> Option<LocalUserId> {
        self.by_remote.get(remote).copied()
    }

    pub(crate) fn remote_of(&self, local: &LocalUserId) -> Option<RemoteAccountId> {
        self.by_local.get(local).cloned()
    }

    /// All pairs, ordered by local user id.
    pub(crate) fn pairs(&self) -> Vec<(LocalUserId, RemoteAccountId)> {
        let mut pairs: Vec<_> = self
            .by_local
            .iter()
            .map(|(l, r)| (*l, r.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    pub(crate) fn len(&self) -> usize {
        self.by_local.len()
    }

    pub(crate) fn to_file(&self) -> LinkFile {
        LinkFile {
            by_remote_id: self
                .by_remote
                .iter()
                .map(|(r, l)| (r.clone(), *l))
                .collect(),
            by_local_id: self
                .by_local
                .iter()
                .map(|(l, r)| (*l, r.clone()))
                .collect(),
        }
    }

    /// Rebuilds a table from a loaded file.
    ///
    /// `by_local_id` is treated as the source of truth and the reverse
    /// index is derived from it, so a hand-edited file with mismatched
    /// halves still loads into a consistent table.
    pub(crate) fn from_file(file: LinkFile) -> Self {
        let mut table = Self::default();
        for (local, remote) in &file.by_local_id {
            table.insert(remote.clone(), *local);
        }
        let mismatched = file
            .by_remote_id
            .iter()
            .filter(|(r, l)| table.local_of(r) != Some(**l))
            .count();
        if mismatched > 0 {
            tracing::warn!(
                mismatched,
                "identity file indexes disagree; rebuilt from by_local_id"
            );
        }
        table
    }
}

/// Serialized form of the table.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct LinkFile {
    #[serde(default)]
    pub(crate) by_remote_id: BTreeMap<RemoteAccountId, LocalUserId>,
    #[serde(default)]
    pub(crate) by_local_id: BTreeMap<LocalUserId, RemoteAccountId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid() -> LocalUserId {
        LocalUserId::new_random()
    }

    #[test]
    fn test_insert_links_both_directions() {
        let mut t = LinkTable::default();
        let u = uid();
        t.insert("42".into(), u);
        assert_eq!(t.local_of(&"42".into()), Some(u));
        assert_eq!(t.remote_of(&u), Some("42".into()));
    }

    #[test]
    fn test_insert_relink_local_drops_old_remote() {
        let mut t = LinkTable::default();
        let u = uid();
        t.insert("old".into(), u);
        t.insert("new".into(), u);

        assert_eq!(t.remote_of(&u), Some("new".into()));
        assert_eq!(t.local_of(&"old".into()), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_insert_relink_remote_drops_old_local() {
        let mut t = LinkTable::default();
        let first = uid();
        let second = uid();
        t.insert("42".into(), first);
        t.insert("42".into(), second);

        assert_eq!(t.local_of(&"42".into()), Some(second));
        assert_eq!(t.remote_of(&first), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_from_file_rebuilds_reverse_index() {
        let u = uid();
        let mut file = LinkFile::default();
        file.by_local_id.insert(u, "42".into());
        file.by_remote_id.insert("stale".into(), u);

        let t = LinkTable::from_file(file);

        assert_eq!(t.local_of(&"42".into()), Some(u));
        assert_eq!(t.local_of(&"stale".into()), None);
    }
}
