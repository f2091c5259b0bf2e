//! Filesystem-backed [`AtomicBlobStore`].

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::error::{StorageError, StorageResult};
use super::traits::AtomicBlobStore;

/// Blob store keeping one file per blob under a root directory.
///
/// Writes go to a uniquely named temporary file that is synced and then
/// renamed over the target, so readers see either the old or the new blob.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Uses `root` as the blob directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|err| map_io_err("create root", &err))?;
        Ok(Self { root })
    }

    fn blob_path(&self, name: &str) -> StorageResult<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(StorageError::BlobStore(format!("invalid blob name {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

impl AtomicBlobStore for FsBlobStore {
    fn read(&self, name: String) -> StorageResult<Option<Vec<u8>>> {
        let path = self.blob_path(&name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io_err("read", &err)),
        }
    }

    fn write_atomic(&self, name: String, bytes: Vec<u8>) -> StorageResult<()> {
        let path = self.blob_path(&name)?;
        let temp_path = self.root.join(format!(".{name}.{}.tmp", Uuid::new_v4()));

        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|()| fs::rename(&temp_path, &path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(map_io_err("write", &err));
        }
        Ok(())
    }

    fn delete(&self, name: String) -> StorageResult<()> {
        let path = self.blob_path(&name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io_err("delete", &err)),
        }
    }
}

fn map_io_err(operation: &str, err: &std::io::Error) -> StorageError {
    StorageError::BlobStore(format!("{operation} failed: {err}"))
}
