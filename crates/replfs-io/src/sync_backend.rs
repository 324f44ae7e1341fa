//! Synchronous I/O backend using `std::fs`.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::trace;

use crate::IoResult;
use crate::backend::{FileHandle, IoBackend, OpenFlags};
use crate::error::IoError;

/// Blocking backend over `std::fs::File`.
#[derive(Debug)]
pub struct SyncBackend {
    next_handle_id: AtomicU64,
}

impl SyncBackend {
    pub fn new() -> Self {
        Self {
            next_handle_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_handle_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SyncBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for SyncBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> IoResult<FileHandle> {
        let file = OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .create(flags.create)
            .truncate(flags.truncate)
            .open(path)
            .map_err(|source| IoError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let id = self.next_id();
        trace!(handle = id, path = %path.display(), "opened file");
        Ok(FileHandle::from_file(id, file))
    }

    fn write_at(&self, handle: &FileHandle, offset: u64, buf: &[u8]) -> IoResult<()> {
        let file = handle.file()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            file.write_all_at(buf, offset)?;
        }

        #[cfg(not(unix))]
        {
            use std::os::windows::fs::FileExt;
            let mut written = 0;
            while written < buf.len() {
                written += file.seek_write(&buf[written..], offset + written as u64)?;
            }
        }

        Ok(())
    }

    fn fsync(&self, handle: &FileHandle) -> IoResult<()> {
        handle.file()?.sync_all()?;
        Ok(())
    }

    fn close(&self, mut handle: FileHandle) -> IoResult<()> {
        handle.file = None;
        Ok(())
    }

    fn read_all(&self, path: &Path) -> IoResult<Bytes> {
        let data = fs::read(path)?;
        Ok(Bytes::from(data))
    }

    fn file_size(&self, handle: &FileHandle) -> IoResult<u64> {
        let metadata = handle.file()?.metadata()?;
        Ok(metadata.len())
    }
}
