//! Per-file session state held by a replica.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use replfs_io::{FileHandle, IoBackend, IoResult, OpenFlags};
use replfs_types::{BlockId, BlockRange, FileDescriptor, MAX_WRITES, TransactionId};
use replfs_wire::WriteBlock;
use tracing::trace;

/// A transaction this replica voted yes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Prepared {
    pub transaction: TransactionId,
    pub blocks: Option<BlockRange>,
}

#[derive(Debug)]
pub(crate) struct FileSession {
    descriptor: FileDescriptor,
    file_name: String,
    path: PathBuf,
    open: bool,
    /// Opened on the first commit.
    local: Option<FileHandle>,
    prepared: Option<Prepared>,
    staged: BTreeMap<BlockId, WriteBlock>,
}

impl FileSession {
    pub fn open(descriptor: FileDescriptor, file_name: &str, path: PathBuf) -> Self {
        Self {
            descriptor,
            file_name: file_name.to_owned(),
            path,
            open: true,
            local: None,
            prepared: None,
            staged: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> FileDescriptor {
        self.descriptor
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn prepared(&self) -> Option<Prepared> {
        self.prepared
    }

    /// Stages a block. Returns false if the id was already staged.
    pub fn stage(&mut self, block: WriteBlock) -> bool {
        if self.staged.contains_key(&block.block_id) {
            return false;
        }
        self.staged.insert(block.block_id, block);
        true
    }

    /// Ids in `range` that are not staged, ascending, at most
    /// [`MAX_WRITES`] of them.
    pub fn missing(&self, range: BlockRange) -> Vec<BlockId> {
        range
            .ids()
            .filter(|id| !self.staged.contains_key(id))
            .take(MAX_WRITES)
            .collect()
    }

    pub fn record(&mut self, prepared: Prepared) {
        self.prepared = Some(prepared);
    }

    /// Drops every staged block and forgets the prepared transaction.
    pub fn abort(&mut self) {
        self.staged.clear();
        self.prepared = None;
    }

    /// Applies the prepared transaction's blocks in ascending id order.
    ///
    /// Blocks older than the range are stale leftovers and are discarded;
    /// blocks newer than the range stay staged. Returns the number of
    /// blocks written. A repeated call writes nothing.
    pub fn commit(&mut self, backend: &impl IoBackend) -> IoResult<usize> {
        let Some(range) = self.prepared.and_then(|p| p.blocks) else {
            return Ok(0);
        };

        let newer = self.staged.split_off(&range.last().next());
        let batch = std::mem::replace(&mut self.staged, newer);
        let mut written = 0;

        for (id, block) in batch.range(range.first()..) {
            let handle = self.local_handle(backend)?;
            backend.write_at(handle, u64::from(block.offset), &block.data)?;
            trace!(block = %id, offset = block.offset, len = block.data.len(), "applied block");
            written += 1;
        }

        if let Some(handle) = &self.local {
            if written > 0 {
                backend.fsync(handle)?;
            }
        }
        Ok(written)
    }

    /// Closes the local file and marks the session closed.
    pub fn close(&mut self, backend: &impl IoBackend) -> IoResult<()> {
        self.open = false;
        self.staged.clear();
        self.prepared = None;
        if let Some(handle) = self.local.take() {
            backend.close(handle)?;
        }
        Ok(())
    }

    fn local_handle(&mut self, backend: &impl IoBackend) -> IoResult<&FileHandle> {
        let handle = match self.local.take() {
            Some(handle) => handle,
            None => backend.open(&self.path, OpenFlags::write_create())?,
        };
        Ok(self.local.insert(handle))
    }
}
