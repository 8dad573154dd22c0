//! File-backed credential store.
//!
//! Two text files live under the data directory:
//!
//! ```text
//! master_uids.txt       one canonical identifier (or empty)
//! authorized_uids.txt   one canonical identifier per line
//! ```
//!
//! Every mutation is applied to a working copy, written out in full
//! (temp file, fsync, rename) and only then swapped into memory. The write
//! lock is held for the whole sequence, so readers never see a state that
//! is not on disk.

use std::path::{Path, PathBuf};

use keycard_core::constants::{AUTHORIZED_FILE_NAME, MASTER_FILE_NAME};
use keycard_core::{Identifier, Role};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::models::Credentials;

/// Durable allow-list of one master card and any number of authorized cards.
///
/// # Examples
///
/// ```no_run
/// use keycard_core::Identifier;
/// use keycard_storage::CredentialStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = CredentialStore::open("/data/keycard").await?;
///
/// if !store.has_master().await {
///     store.set_master(&Identifier::parse("AABBCCDD")?).await?;
/// }
///
/// let already_present = store.add_authorized(&Identifier::parse("11223344")?).await?;
/// assert!(!already_present);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CredentialStore {
    data_dir: PathBuf,
    state: RwLock<Credentials>,
}

impl CredentialStore {
    /// Open the store, creating the data directory if needed and loading
    /// whatever credentials are already persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// credential file cannot be read.
    pub async fn open(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|source| StorageError::DataDirectory {
                path: data_dir.clone(),
                source,
            })?;

        let master_records = read_records(&data_dir.join(MASTER_FILE_NAME)).await?;
        if master_records.len() > 1 {
            warn!(
                count = master_records.len(),
                "Multiple master records found, keeping the first"
            );
        }
        let master = master_records.into_iter().next();

        let authorized = read_records(&data_dir.join(AUTHORIZED_FILE_NAME)).await?;
        let credentials = Credentials::from_records(master, authorized);

        info!(
            data_dir = %data_dir.display(),
            has_master = credentials.has_master(),
            authorized = credentials.authorized().len(),
            "Credential store loaded"
        );

        Ok(Self {
            data_dir,
            state: RwLock::new(credentials),
        })
    }

    /// Directory holding the credential files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub async fn has_master(&self) -> bool {
        self.state.read().await.has_master()
    }

    /// Resolve the role of a presented card.
    pub async fn role_of(&self, id: &Identifier) -> Role {
        self.state.read().await.role_of(id)
    }

    pub async fn authorized_count(&self) -> usize {
        self.state.read().await.authorized().len()
    }

    pub async fn master(&self) -> Option<Identifier> {
        self.state.read().await.master().cloned()
    }

    /// Authorized cards in insertion order.
    pub async fn authorized(&self) -> Vec<Identifier> {
        self.state.read().await.authorized().to_vec()
    }

    /// Consistent copy of the current credentials.
    pub async fn snapshot(&self) -> Credentials {
        self.state.read().await.clone()
    }

    /// Enroll `id` as the master card, revoking every authorized card.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persistence`] if either file cannot be
    /// rewritten; the in-memory credentials are left as they were.
    pub async fn set_master(&self, id: &Identifier) -> StorageResult<()> {
        let mut state = self.state.write().await;

        let mut working = state.clone();
        working.replace_master(id.clone());

        let master_path = self.master_path();
        write_records(&master_path, working.master()).await?;

        if let Err(err) = write_records(&self.authorized_path(), working.authorized()).await {
            // Put the old master back so the two files stay consistent.
            if let Err(rollback) = write_records(&master_path, state.master()).await {
                warn!(error = %rollback, "Failed to roll back master record");
            }
            return Err(err);
        }

        *state = working;
        debug!(uid = %id, "Master record persisted");
        Ok(())
    }

    /// Add `id` to the authorized set.
    ///
    /// Returns `Ok(true)` when the card was already present (it is the
    /// master or already authorized) and nothing was written, and
    /// `Ok(false)` when it was newly added and persisted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persistence`] if the authorized file cannot be
    /// rewritten; the card is then not added.
    pub async fn add_authorized(&self, id: &Identifier) -> StorageResult<bool> {
        let mut state = self.state.write().await;

        let mut working = state.clone();
        if working.insert_authorized(id.clone()) {
            return Ok(true);
        }

        write_records(&self.authorized_path(), working.authorized()).await?;

        *state = working;
        debug!(uid = %id, "Authorized record persisted");
        Ok(false)
    }

    fn master_path(&self) -> PathBuf {
        self.data_dir.join(MASTER_FILE_NAME)
    }

    fn authorized_path(&self) -> PathBuf {
        self.data_dir.join(AUTHORIZED_FILE_NAME)
    }
}

async fn read_records(path: &Path) -> StorageResult<Vec<Identifier>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Load {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut records = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Identifier::parse(line) {
            Ok(id) => records.push(id),
            Err(err) => warn!(path = %path.display(), record = line, error = %err, "Skipping invalid record"),
        }
    }
    Ok(records)
}

async fn write_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a Identifier>,
) -> StorageResult<()> {
    let mut contents = String::new();
    for id in records {
        contents.push_str(id.as_str());
        contents.push('\n');
    }

    let tmp_path = path.with_extension("txt.tmp");
    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(source) = result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(StorageError::Persistence {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.txt");
        let ids = vec![
            Identifier::parse("AABBCCDD").unwrap(),
            Identifier::parse("11223344").unwrap(),
        ];

        write_records(&path, &ids).await.unwrap();

        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "AABBCCDD\n11223344\n"
        );
        assert_eq!(read_records(&path).await.unwrap(), ids);
        assert!(!path.with_extension("txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = read_records(&dir.path().join("missing.txt")).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_read_skips_blank_and_invalid_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.txt");
        tokio::fs::write(&path, "\n  aabbccdd  \n\nnot-hex!\n11 22 33 44\n")
            .await
            .unwrap();

        let records = read_records(&path).await.unwrap();
        assert_eq!(
            records,
            vec![
                Identifier::parse("AABBCCDD").unwrap(),
                Identifier::parse("11223344").unwrap()
            ]
        );
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("records.txt");

        let err = write_records(&path, &Vec::<Identifier>::new())
            .await
            .unwrap_err();
        assert!(err.is_persistence());
    }
}
