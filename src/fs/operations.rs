use std::path::{Path, PathBuf};

use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};
use tracing::warn;

/// Replaces the content of `path` in one step. The data is written and synced into a sibling
/// temporary file which is then renamed over the target, so readers see either the old or the
/// new content, never a partial write.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let temporary = temporary_path(path);
    let mut file = File::create(&temporary).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&temporary, path).await {
        if let Err(cleanup) = fs::remove_file(&temporary).await {
            warn!("Failed to remove {temporary:?}: {cleanup:?}");
        }
        return Err(e);
    }
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|v| v.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Advisory lock over a whole directory of records, held through a dedicated lock file.
/// Dropping the guard closes the file, which also releases the lock.
pub struct DirLock {
    file: File,
}

impl DirLock {
    /// Blocks until no other reader or writer holds the lock.
    pub async fn exclusive(path: &Path) -> Result<Self, io::Error> {
        let file = Self::open(path).await?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Blocks until no writer holds the lock. Readers share it.
    pub async fn shared(path: &Path) -> Result<Self, io::Error> {
        let file = Self::open(path).await?;
        file.lock_shared()?;
        Ok(Self { file })
    }

    pub async fn release(self) -> Result<(), io::Error> {
        self.file.unlock_async().await
    }

    async fn open(path: &Path) -> Result<File, io::Error> {
        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::fs::operations::{write_atomically, DirLock};

    #[tokio::test]
    async fn test_write_atomically_creates_and_replaces() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("2014-01-01");

        write_atomically(&path, b"first version, quite long").await?;
        assert_eq!(tokio::fs::read_to_string(&path).await?, "first version, quite long");

        write_atomically(&path, b"second").await?;
        assert_eq!(tokio::fs::read_to_string(&path).await?, "second");

        let entries = std::fs::read_dir(dir.path())?.count();
        assert_eq!(entries, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_atomically_missing_directory() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("missing").join("2014-01-01");
        assert!(write_atomically(&path, b"data").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_shared_locks_coexist() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(".lock");

        let first = DirLock::shared(&path).await?;
        let second = DirLock::shared(&path).await?;
        first.release().await?;
        second.release().await?;

        let exclusive = DirLock::exclusive(&path).await?;
        exclusive.release().await?;
        Ok(())
    }
}
