//! The replica's mount directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use replfs_types::MAX_FILE_NAME_LENGTH;
use tracing::info;

use crate::error::{ServerError, ServerResult};

/// Directory holding every file a replica writes.
///
/// Creating it doubles as a per-host lock: a second replica pointed at the
/// same path refuses to start.
#[derive(Debug, Clone)]
pub struct MountDir {
    path: PathBuf,
}

impl MountDir {
    /// Creates the directory (and missing parents). Fails with
    /// [`ServerError::MountInUse`] if it already exists.
    pub fn create(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ServerError::MountInUse { path });
            }
            Err(e) => return Err(e.into()),
        }
        info!(mount = %path.display(), "created mount directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maps a remote file name to its local path.
    ///
    /// Only plain names are accepted: no separators, no `.`/`..`, nothing
    /// that would escape the mount directory.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        if file_name.is_empty() || file_name.len() > MAX_FILE_NAME_LENGTH {
            return None;
        }
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == file_name => {
                Some(self.path.join(name))
            }
            _ => None,
        }
    }
}
