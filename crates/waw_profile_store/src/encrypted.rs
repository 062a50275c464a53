//! Encrypted single-file profile store.
//!
//! File layout:
//!
//! ```text
//! magic "WAWP" (4) | version (1) | salt (16) | nonce (12) | ciphertext | tag (16)
//! ```
//!
//! The header (magic, version, salt) is authenticated as associated data.
//! The plaintext is the JSON encoding of a [`ProfileSnapshot`]. An absent
//! file means "no profile".

use crate::crypto::{random_salt, MasterKey, SALT_SIZE};
use crate::error::{StoreError, StoreResult};
use crate::snapshot::ProfileSnapshot;
use crate::store::ProfileStore;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const MAGIC: &[u8; 4] = b"WAWP";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1 + SALT_SIZE;

/// A profile store backed by one AES-256-GCM encrypted file.
///
/// # Durability
///
/// Writes go to a sibling temp file, are synced, renamed over the store
/// file and followed by a directory sync. Readers never see a half-written
/// record.
///
/// # Concurrency
///
/// Each operation holds an advisory lock on `<file>.lock` (shared for reads,
/// exclusive for writes) only for its own duration, so separate processes
/// such as the daemon and the CLI can use the same store.
///
/// # Example
///
/// ```no_run
/// use waw_profile_store::{EncryptedProfileStore, MasterKey, ProfileStore};
/// use std::path::Path;
///
/// let store = EncryptedProfileStore::open(Path::new("identity.db"), MasterKey::new("secret")).unwrap();
/// let profile = store.get_profile().unwrap();
/// ```
#[derive(Debug)]
pub struct EncryptedProfileStore {
    path: PathBuf,
    lock_path: PathBuf,
    temp_path: PathBuf,
    master: MasterKey,
}

impl EncryptedProfileStore {
    /// Opens a store at `path`, creating parent directories if needed.
    ///
    /// The store file itself is created on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: &Path, master: MasterKey) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_path: sibling(path, "lock"),
            temp_path: sibling(path, "tmp"),
            master,
        })
    }

    /// Returns the path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> StoreResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?)
    }

    fn read_unlocked(&self) -> StoreResult<Option<ProfileSnapshot>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if data.is_empty() {
            return Ok(None);
        }

        if data.len() < HEADER_LEN {
            return Err(StoreError::Corrupted(format!(
                "file too short: {} bytes",
                data.len()
            )));
        }

        let (header, sealed) = data.split_at(HEADER_LEN);
        if &header[..MAGIC.len()] != MAGIC {
            return Err(StoreError::Corrupted("bad magic".into()));
        }
        let version = header[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(StoreError::Corrupted(format!(
                "unsupported format version {version}"
            )));
        }

        let salt = &header[MAGIC.len() + 1..];
        let plaintext = self.master.derive(salt)?.open(sealed, header)?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    fn write_unlocked(&self, profile: &ProfileSnapshot) -> StoreResult<()> {
        let salt = random_salt();
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(MAGIC);
        header.push(FORMAT_VERSION);
        header.extend_from_slice(&salt);

        let plaintext = serde_json::to_vec(profile)?;
        let sealed = self.master.derive(&salt)?.seal(&plaintext, &header)?;

        let mut file = File::create(&self.temp_path)?;
        file.write_all(&header)?;
        file.write_all(&sealed)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_directory()?;
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced
        Ok(())
    }
}

impl ProfileStore for EncryptedProfileStore {
    fn get_profile(&self) -> StoreResult<Option<ProfileSnapshot>> {
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        self.read_unlocked()
    }

    fn put_profile(&self, profile: ProfileSnapshot) -> StoreResult<ProfileSnapshot> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let existing = self.read_unlocked()?;
        let merged = profile.merge_into(existing.as_ref())?;
        self.write_unlocked(&merged)?;
        debug!(id = %merged.id, updated_at = %merged.updated_at, "profile written");
        Ok(merged)
    }

    fn delete_profile(&self, id: &str) -> StoreResult<bool> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        match self.read_unlocked()? {
            Some(existing) if existing.id == id => {
                fs::remove_file(&self.path)?;
                self.sync_directory()?;
                debug!(id, "profile deleted");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Returns `path` with `.suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> ProfileSnapshot {
        ProfileSnapshot::new("1", "2025-01-01T00:00:00Z")
            .with_name("Alice")
            .with_email("alice@example.com")
            .with_phone("123")
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store =
            EncryptedProfileStore::open(&dir.path().join("identity.db"), MasterKey::new("k")).unwrap();
        assert!(store.get_profile().unwrap().is_none());
        assert!(!store.delete_profile("1").unwrap());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("identity.db");

        {
            let store = EncryptedProfileStore::open(&path, MasterKey::new("k")).unwrap();
            store.put_profile(sample()).unwrap();
        }

        let store = EncryptedProfileStore::open(&path, MasterKey::new("k")).unwrap();
        assert_eq!(store.get_profile().unwrap(), Some(sample()));
        assert!(!dir.path().join("nested").join("identity.db.tmp").exists());
    }

    #[test]
    fn file_is_not_plaintext() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.db");
        let store = EncryptedProfileStore::open(&path, MasterKey::new("k")).unwrap();
        store.put_profile(sample()).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..4], MAGIC);
        let text = String::from_utf8_lossy(&raw);
        assert!(!text.contains("alice@example.com"));
    }

    #[test]
    fn wrong_master_key_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.db");
        EncryptedProfileStore::open(&path, MasterKey::new("right"))
            .unwrap()
            .put_profile(sample())
            .unwrap();

        let store = EncryptedProfileStore::open(&path, MasterKey::new("wrong")).unwrap();
        assert!(matches!(store.get_profile(), Err(StoreError::Decryption(_))));
    }

    #[test]
    fn tampered_header_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.db");
        let store = EncryptedProfileStore::open(&path, MasterKey::new("k")).unwrap();
        store.put_profile(sample()).unwrap();

        let mut raw = fs::read(&path).unwrap();
        raw[MAGIC.len() + 1] ^= 0xFF;
        fs::write(&path, &raw).unwrap();
        assert!(matches!(store.get_profile(), Err(StoreError::Decryption(_))));

        raw[0] = b'X';
        fs::write(&path, &raw).unwrap();
        assert!(matches!(store.get_profile(), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn upsert_preserves_created_at_and_rejects_stale() {
        let dir = tempdir().unwrap();
        let store =
            EncryptedProfileStore::open(&dir.path().join("identity.db"), MasterKey::new("k")).unwrap();
        store.put_profile(sample()).unwrap();

        let edited = ProfileSnapshot::new("1", "2025-02-01T00:00:00Z").with_name("Alicia");
        let stored = store.put_profile(edited).unwrap();
        assert_eq!(stored.created_at, "2025-01-01T00:00:00Z");
        assert_eq!(stored.name.as_deref(), Some("Alicia"));

        let stale = ProfileSnapshot::new("1", "2024-12-01T00:00:00Z");
        assert!(matches!(
            store.put_profile(stale),
            Err(StoreError::StaleUpdate { .. })
        ));
        assert_eq!(store.get_profile().unwrap().unwrap().name.as_deref(), Some("Alicia"));
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.db");
        let store = EncryptedProfileStore::open(&path, MasterKey::new("k")).unwrap();
        store.put_profile(sample()).unwrap();

        assert!(!store.delete_profile("other").unwrap());
        assert!(store.delete_profile("1").unwrap());
        assert!(!path.exists());
        assert!(store.get_profile().unwrap().is_none());
    }

    #[test]
    fn sibling_paths() {
        let path = Path::new("/tmp/x/identity.db");
        assert_eq!(sibling(path, "lock"), Path::new("/tmp/x/identity.db.lock"));
    }
}
