//! Local filesystem capability with backup-before-overwrite.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use paperclip_core::Timestamp;

use super::{CapabilityResult, FileReadOutput, FileWriteOutput, FilesystemCapability};
use crate::error::CapabilityError;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];

pub struct LocalFilesystem {
    backup_dir_name: String,
}

impl LocalFilesystem {
    pub fn new(backup_dir_name: impl Into<String>) -> Self {
        Self {
            backup_dir_name: backup_dir_name.into(),
        }
    }

    fn absolute(path: &Path) -> CapabilityResult<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let cwd = std::env::current_dir().map_err(|e| CapabilityError::io(path, e))?;
        Ok(cwd.join(path))
    }

    /// `<parent>/<backup_dir_name>/<file>.<millis>.<id>.bak`
    fn backup_path_for(&self, path: &Path) -> PathBuf {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let id = Uuid::new_v4().simple().to_string();
        parent.join(&self.backup_dir_name).join(format!(
            "{}.{}.{}.bak",
            name,
            Timestamp::now().0,
            &id[..8]
        ))
    }
}

/// Detect the encoding from a byte-order mark and decode the remainder.
fn decode(bytes: &[u8]) -> (String, &'static str) {
    if let Some(rest) = bytes.strip_prefix(&UTF8_BOM) {
        return (String::from_utf8_lossy(rest).into_owned(), "utf-8");
    }
    if let Some(rest) = bytes.strip_prefix(&UTF16_LE_BOM) {
        return (decode_utf16(rest, u16::from_le_bytes), "utf-16le");
    }
    if let Some(rest) = bytes.strip_prefix(&UTF16_BE_BOM) {
        return (decode_utf16(rest, u16::from_be_bytes), "utf-16be");
    }
    (String::from_utf8_lossy(bytes).into_owned(), "utf-8")
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[async_trait]
impl FilesystemCapability for LocalFilesystem {
    async fn read(&self, path: &Path) -> CapabilityResult<FileReadOutput> {
        let path = Self::absolute(path)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CapabilityError::NotFound(path));
            }
            Err(e) => return Err(CapabilityError::io(path, e)),
        };
        let (content, encoding) = decode(&bytes);
        Ok(FileReadOutput {
            content,
            encoding: encoding.to_string(),
            path,
        })
    }

    async fn write(&self, path: &Path, content: &str) -> CapabilityResult<FileWriteOutput> {
        let path = Self::absolute(path)?;

        let backup_path = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let backup = self.backup_path_for(&path);
            if let Some(dir) = backup.parent() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| CapabilityError::io(dir, e))?;
            }
            tokio::fs::copy(&path, &backup)
                .await
                .map_err(|e| CapabilityError::io(&path, e))?;
            debug!(path = %path.display(), backup = %backup.display(), "Backed up file before write");
            Some(backup)
        } else {
            None
        };

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CapabilityError::io(dir, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| CapabilityError::io(&path, e))?;

        Ok(FileWriteOutput {
            success: true,
            backup_path,
            path,
        })
    }

    async fn restore(&self, backup: &Path, target: &Path) -> CapabilityResult<bool> {
        if !tokio::fs::try_exists(backup).await.unwrap_or(false) {
            return Ok(false);
        }
        tokio::fs::copy(backup, target)
            .await
            .map_err(|e| CapabilityError::io(target, e))?;
        Ok(true)
    }

    async fn list_directory(&self, path: &Path) -> CapabilityResult<Vec<String>> {
        let path = Self::absolute(path)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CapabilityError::NotFound(path));
            }
            Err(e) => return Err(CapabilityError::io(path, e)),
        };
        if !metadata.is_dir() {
            return Err(CapabilityError::NotADirectory(path));
        }

        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| CapabilityError::io(&path, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CapabilityError::io(&path, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs() -> LocalFilesystem {
        LocalFilesystem::new(".paperclip-backups")
    }

    #[test]
    fn test_decode_boms() {
        assert_eq!(decode(b"plain"), ("plain".to_string(), "utf-8"));
        assert_eq!(decode(&[0xEF, 0xBB, 0xBF, b'h', b'i']), ("hi".to_string(), "utf-8"));
        assert_eq!(decode(&[0xFF, 0xFE, b'h', 0, b'i', 0]), ("hi".to_string(), "utf-16le"));
        assert_eq!(decode(&[0xFE, 0xFF, 0, b'h', 0, b'i']), ("hi".to_string(), "utf-16be"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = fs().read(&dir.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_write_new_file_has_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("new.txt");
        let out = fs().write(&path, "hello").await.unwrap();
        assert!(out.success);
        assert!(out.backup_path.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_write_existing_file_backs_up_then_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "before").unwrap();

        let out = fs().write(&path, "after").await.unwrap();
        let backup = out.backup_path.expect("backup expected");
        assert!(backup.starts_with(dir.path().join(".paperclip-backups")));
        assert!(backup.to_string_lossy().ends_with(".bak"));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "before");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "after");

        assert!(fs().restore(&backup, &path).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "before");
    }

    #[tokio::test]
    async fn test_restore_missing_backup_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let restored = fs()
            .restore(&dir.path().join("gone.bak"), &dir.path().join("t.txt"))
            .await
            .unwrap();
        assert!(!restored);
    }

    #[tokio::test]
    async fn test_list_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let names = fs().list_directory(dir.path()).await.unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);

        let err = fs()
            .list_directory(&dir.path().join("a.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::NotADirectory(_)));
    }
}
