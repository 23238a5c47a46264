//! Persistence for the generated document.
//!
//! The profile is shared with the running engine, so two rules hold: the
//! whole fetch-through-write sequence is guarded by a lock file, and the
//! target path is only ever replaced by a rename, never written in place.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::ConfigDocument;
use crate::error::ImportError;

/// Exclusive lock over one profile path, held for the duration of an import.
/// Backed by an `O_EXCL` lock file next to the profile; removed on drop.
#[derive(Debug)]
pub struct ImportLock {
    path: PathBuf,
}

impl ImportLock {
    pub fn acquire(profile_path: &Path) -> Result<Self, ImportError> {
        let path = lock_path(profile_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ImportError::Locked(path))
            }
            Err(err) => Err(ImportError::Write(err)),
        }
    }
}

impl Drop for ImportLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(%err, path = %self.path.display(), "failed to remove import lock");
        }
    }
}

fn lock_path(profile_path: &Path) -> PathBuf {
    let mut name = profile_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "profile.yaml".into());
    name.push(".lock");
    profile_path.with_file_name(name)
}

fn backup_path(profile_path: &Path) -> PathBuf {
    let mut name = profile_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "profile.yaml".into());
    name.push(".bak");
    profile_path.with_file_name(name)
}

/// Serialize the document once and replace `path` atomically (temp file +
/// rename). The previous document, if any, is kept as a `.bak` sibling;
/// its path is returned so activation failures can roll back.
pub fn write_atomic(doc: &ConfigDocument, path: &Path) -> Result<Option<PathBuf>, ImportError> {
    let yaml = serde_yaml::to_string(doc)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let backup = if path.is_file() {
        let bak = backup_path(path);
        fs::copy(path, &bak)?;
        Some(bak)
    } else {
        None
    };

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "profile.yaml".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, yaml)?;
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), "wrote configuration document");
    Ok(backup)
}

/// Put the previous document back after a failed activation.
pub fn restore_backup(path: &Path, backup: &Path) -> Result<(), ImportError> {
    fs::copy(backup, path)?;
    info!(path = %path.display(), "restored previous configuration document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeRegistry, decode_line};
    use crate::profile::{synthesize, Mode};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("clashsub-writer-{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_doc() -> ConfigDocument {
        let mut registry = NodeRegistry::new();
        registry.push(decode_line("trojan://p@a.com:443#A").unwrap());
        synthesize(&registry, Mode::Proxy).unwrap()
    }

    #[test]
    fn test_write_atomic_creates_parseable_file() {
        let dir = test_dir("create");
        let path = dir.join("profile.yaml");

        let backup = write_atomic(&sample_doc(), &path).unwrap();
        assert!(backup.is_none());
        assert!(path.is_file());
        assert!(!dir.join("profile.yaml.tmp").exists());

        let content = fs::read_to_string(&path).unwrap();
        let parsed: ConfigDocument = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed, sample_doc());
    }

    #[test]
    fn test_write_atomic_backs_up_previous() {
        let dir = test_dir("backup");
        let path = dir.join("profile.yaml");
        fs::write(&path, "previous: document\n").unwrap();

        let backup = write_atomic(&sample_doc(), &path).unwrap();
        let backup = backup.unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "previous: document\n");

        restore_backup(&path, &backup).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous: document\n");
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let dir = test_dir("lock");
        let path = dir.join("profile.yaml");

        let lock = ImportLock::acquire(&path).unwrap();
        assert!(matches!(
            ImportLock::acquire(&path),
            Err(ImportError::Locked(_))
        ));
        drop(lock);
        let again = ImportLock::acquire(&path);
        assert!(again.is_ok());
    }
}
