//! Staging and two-phase commit handlers.

use replfs_io::IoBackend;
use replfs_types::{FileDescriptor, Identity, MAX_FILE_LENGTH, TransactionId};
use replfs_wire::{Message, PrepareRequest, PrepareResponse, Status, Vote, WriteBlock};
use tracing::{debug, info, warn};

use super::session::Prepared;
use super::{Replica, ReplicaOutput};
use crate::error::ServerResult;

impl<B: IoBackend> Replica<B> {
    // ========================================================================
    // Write Block
    // ========================================================================

    /// Stages a block. Never replies.
    pub(super) fn on_write_block(&mut self, block: &WriteBlock) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.is_open() && s.descriptor() == block.descriptor)
        else {
            debug!(fd = %block.descriptor, block = %block.block_id, "write for unknown descriptor");
            return;
        };

        let end = u64::from(block.offset) + block.data.len() as u64;
        if end > MAX_FILE_LENGTH {
            debug!(block = %block.block_id, end, "write past maximum file length");
            return;
        }

        if !session.stage(block.clone()) {
            debug!(block = %block.block_id, "duplicate block");
        }
    }

    // ========================================================================
    // Prepare
    // ========================================================================

    pub(super) fn on_prepare(&mut self, from: Identity, request: &PrepareRequest) -> ReplicaOutput {
        let vote = match self
            .session
            .as_mut()
            .filter(|s| s.is_open() && s.descriptor() == request.descriptor)
        {
            None => Vote::InvalidDescriptor,
            Some(session) => {
                let missing = request
                    .blocks
                    .map(|range| session.missing(range))
                    .unwrap_or_default();
                if missing.is_empty() {
                    session.record(Prepared {
                        transaction: request.transaction,
                        blocks: request.blocks,
                    });
                    Vote::Yes
                } else {
                    Vote::MissingBlocks(missing)
                }
            }
        };

        debug!(txn = %request.transaction, ?vote, "voting");
        ReplicaOutput::reply(
            from,
            Message::PrepareResponse(PrepareResponse {
                transaction: request.transaction,
                vote,
            }),
        )
    }

    // ========================================================================
    // Commit
    // ========================================================================

    pub(super) fn on_commit(
        &mut self,
        from: Identity,
        transaction: TransactionId,
    ) -> ServerResult<ReplicaOutput> {
        let Some(session) = self.session.as_mut().filter(|s| s.is_open()) else {
            warn!(txn = %transaction, "commit without an open file");
            return Ok(ReplicaOutput::empty());
        };

        let recorded = session.prepared().map(|p| p.transaction);
        if recorded != Some(transaction) {
            warn!(txn = %transaction, recorded = ?recorded, "ignoring commit for unprepared transaction");
            return Ok(ReplicaOutput::empty());
        }

        let written = session.commit(&self.backend)?;
        if written > 0 {
            info!(
                replica = %self.identity,
                txn = %transaction,
                blocks = written,
                file = %session.path().display(),
                "committed"
            );
        }
        Ok(ReplicaOutput::reply(from, Message::CommitResponse { transaction }))
    }

    // ========================================================================
    // Abort
    // ========================================================================

    pub(super) fn on_abort(&mut self, from: Identity, descriptor: FileDescriptor) -> ReplicaOutput {
        let status = match self.session.as_mut() {
            Some(session) if session.descriptor() == descriptor => {
                session.abort();
                debug!(fd = %descriptor, "aborted staged blocks");
                Status::Success
            }
            _ => Status::Failure,
        };
        ReplicaOutput::reply(from, Message::AbortResponse { status })
    }
}
