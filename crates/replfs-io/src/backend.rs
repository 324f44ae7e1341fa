//! I/O backend trait.
//!
//! A replica only ever needs three things from the file system: open a file
//! under its mount directory without truncating it, write a block at an
//! absolute offset, and make the result durable.

use std::path::Path;

use bytes::Bytes;

use crate::IoResult;
use crate::error::IoError;

/// Flags for opening files.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the file if it doesn't exist.
    pub create: bool,
    /// Truncate an existing file to zero length.
    pub truncate: bool,
}

impl OpenFlags {
    /// Flags for reading an existing file.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Flags for positioned writes: create if missing, keep existing bytes.
    pub fn write_create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: false,
        }
    }
}

/// Opaque handle to an open file.
///
/// The handle must be closed via [`IoBackend::close`].
#[derive(Debug)]
pub struct FileHandle {
    pub(crate) id: u64,
    pub(crate) file: Option<std::fs::File>,
}

impl FileHandle {
    pub(crate) fn from_file(id: u64, file: std::fs::File) -> Self {
        Self {
            id,
            file: Some(file),
        }
    }

    /// Backend-assigned handle id, for logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn file(&self) -> IoResult<&std::fs::File> {
        self.file
            .as_ref()
            .ok_or(IoError::InvalidHandle { handle: self.id })
    }
}

/// Abstraction over the file operations a replica performs.
pub trait IoBackend: Send + Sync {
    /// Opens a file with the given flags.
    fn open(&self, path: &Path, flags: OpenFlags) -> IoResult<FileHandle>;

    /// Writes all of `buf` at the absolute byte `offset`, extending the file
    /// (zero filled) if needed. The file position is not used.
    fn write_at(&self, handle: &FileHandle, offset: u64, buf: &[u8]) -> IoResult<()>;

    /// Syncs file data and metadata to disk.
    fn fsync(&self, handle: &FileHandle) -> IoResult<()>;

    /// Closes a file handle.
    fn close(&self, handle: FileHandle) -> IoResult<()>;

    /// Reads an entire file into memory.
    fn read_all(&self, path: &Path) -> IoResult<Bytes>;

    /// Returns the file size in bytes.
    fn file_size(&self, handle: &FileHandle) -> IoResult<u64>;
}
