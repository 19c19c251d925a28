//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::InstallerError;
use crate::filesys::exists;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), InstallerError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), InstallerError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// Delete the contents, keeping the directory itself
    pub async fn empty(&self) -> Result<(), InstallerError> {
        if !self.exists().await {
            return self.create().await;
        }
        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let meta = fs::symlink_metadata(&path).await?;
            if meta.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                remove_link_or_file(&path).await?;
            }
        }
        Ok(())
    }

    /// List files in the directory
    pub async fn list_files(&self) -> Result<Vec<PathBuf>, InstallerError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// List subdirectories
    pub async fn list_dirs(&self) -> Result<Vec<PathBuf>, InstallerError> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    /// Entries whose name contains `term`
    pub async fn search(&self, term: &str) -> Vec<PathBuf> {
        exists::search_for(&self.path, term).await
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: impl AsRef<Path>) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Move the directory to `dest`, replacing nothing
    ///
    /// Falls back to copy + delete when a rename crosses filesystems.
    pub async fn move_to(&self, dest: &Path) -> Result<Dir, InstallerError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        if fs::rename(&self.path, dest).await.is_err() {
            debug!("Rename failed, copying {} to {}", self.path.display(), dest.display());
            self.copy_to(dest).await?;
            self.delete().await?;
        }
        Ok(Dir::new(dest))
    }

    /// Recursively copy the contents into `dest`, overwriting files
    pub async fn copy_to(&self, dest: &Path) -> Result<(), InstallerError> {
        let src = self.path.clone();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
            .await
            .map_err(|e| InstallerError::Internal(e.to_string()))?
    }

    /// Copy the files directly inside this directory with the given extension into `dest`
    pub async fn copy_matching(&self, dest: &Path, extension: &str) -> Result<usize, InstallerError> {
        fs::create_dir_all(dest).await?;
        let mut copied = 0;
        for file in self.list_files().await? {
            let matches = file
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
            if let (true, Some(name)) = (matches, file.file_name()) {
                fs::copy(&file, dest.join(name)).await?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Make `link` point at this directory, replacing whatever is at `link`
    pub async fn link_from(&self, link: &Path) -> Result<(), InstallerError> {
        if let Ok(meta) = fs::symlink_metadata(link).await {
            if meta.file_type().is_symlink() || meta.is_file() {
                remove_link_or_file(link).await?;
            } else {
                fs::remove_dir_all(link).await?;
            }
        }
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent).await?;
        }

        #[cfg(unix)]
        fs::symlink(&self.path, link).await?;

        #[cfg(windows)]
        fs::symlink_dir(&self.path, link).await?;

        Ok(())
    }

    /// Create a temporary directory
    pub async fn create_temp_dir(parent: &Path, prefix: &str) -> Result<Dir, InstallerError> {
        let temp_dir = parent.join(format!("{}-{}", prefix, crate::utils::generate_uuid()));
        fs::create_dir_all(&temp_dir).await?;
        Ok(Dir::new(temp_dir))
    }
}

async fn remove_link_or_file(path: &Path) -> Result<(), InstallerError> {
    // Directory symlinks on Windows are removed as directories
    #[cfg(windows)]
    if fs::remove_dir(path).await.is_ok() {
        return Ok(());
    }
    fs::remove_file(path).await?;
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), InstallerError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| InstallerError::IoError(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| InstallerError::Internal(e.to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_and_move() {
        let tmp = tempfile::tempdir().unwrap();
        let src = Dir::new(tmp.path().join("src"));
        src.subdir("nested").create().await.unwrap();
        std::fs::write(src.path().join("nested/a.json"), b"{}").unwrap();
        std::fs::write(src.path().join("b.safetensors"), b"w").unwrap();
        std::fs::write(src.path().join("c.txt"), b"t").unwrap();

        let copy = tmp.path().join("copy");
        src.copy_to(&copy).await.unwrap();
        assert!(copy.join("nested/a.json").exists());

        let only = tmp.path().join("only");
        assert_eq!(src.copy_matching(&only, "safetensors").await.unwrap(), 1);
        assert!(only.join("b.safetensors").exists());
        assert!(!only.join("c.txt").exists());

        let moved = src.move_to(&tmp.path().join("moved/here")).await.unwrap();
        assert!(moved.path().join("c.txt").exists());
        assert!(!src.exists().await);
    }

    #[tokio::test]
    async fn test_empty_keeps_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Dir::new(tmp.path().join("nodes"));
        dir.subdir("one").create().await.unwrap();
        std::fs::write(dir.path().join("two.py"), b"").unwrap();

        dir.empty().await.unwrap();
        assert!(dir.exists().await);
        assert!(dir.list_dirs().await.unwrap().is_empty());
        assert!(dir.list_files().await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_link_replaces_existing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let target = Dir::new(tmp.path().join("data/models"));
        target.create().await.unwrap();
        std::fs::write(target.path().join("m.bin"), b"").unwrap();

        let link = tmp.path().join("app/models");
        std::fs::create_dir_all(&link).unwrap();
        target.link_from(&link).await.unwrap();
        assert!(link.join("m.bin").exists());

        // Relinking over an existing link
        target.link_from(&link).await.unwrap();
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }
}
