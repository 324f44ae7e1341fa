//! Commit, abort and close.

use std::collections::BTreeSet;

use replfs_net::Channel;
use replfs_types::{BlockId, BlockRange, FileDescriptor, TransactionId};
use replfs_wire::{Message, PrepareRequest, PrepareResponse, Status, Vote};
use tracing::{debug, info, warn};

use super::Coordinator;
use crate::engine::{NextAttempt, drive};
use crate::error::{ClientError, ClientResult};
use crate::replica_set::ReplicaSet;

/// Replies collected during phase one.
struct Voting<'a> {
    replicas: &'a mut ReplicaSet,
    missing: BTreeSet<BlockId>,
}

impl<C: Channel> Coordinator<C> {
    // ========================================================================
    // Commit
    // ========================================================================

    /// Makes every staged write durable on every replica, or on none.
    ///
    /// Phase one asks each replica to vote on the staged block range,
    /// retransmitting whatever blocks a replica reports missing. Unless
    /// every replica votes yes the transaction is aborted everywhere and
    /// [`ClientError::VoteFailed`] is returned. Phase two tells the
    /// replicas to apply the blocks.
    pub fn commit(&mut self, fd: FileDescriptor) -> ClientResult<()> {
        self.check_descriptor(fd)?;

        let transaction = self.next_transaction;
        self.next_transaction = transaction.next();

        if !self.prepare(transaction, fd)? {
            self.staged.clear();
            warn!(txn = %transaction, "vote failed, aborting");
            // Best effort: the vote already failed.
            self.abort_staged(fd)?;
            return Err(ClientError::VoteFailed { transaction });
        }

        let acknowledged = self.commit_prepared(transaction)?;
        self.staged.clear();

        let expected = self.replicas.len();
        if acknowledged < expected {
            warn!(txn = %transaction, acknowledged, expected, "commit incomplete");
            return Err(ClientError::CommitIncomplete {
                transaction,
                acknowledged,
                expected,
            });
        }
        info!(txn = %transaction, fd = %fd, "committed");
        Ok(())
    }

    /// Phase one. Returns true if every replica voted yes.
    fn prepare(&mut self, transaction: TransactionId, fd: FileDescriptor) -> ClientResult<bool> {
        let blocks = match (
            self.staged.first_key_value(),
            self.staged.last_key_value(),
        ) {
            (Some((&first, _)), Some((&last, _))) => BlockRange::new(first, last),
            _ => None,
        };
        let request = Message::PrepareRequest(PrepareRequest {
            transaction,
            descriptor: fd,
            blocks,
        });

        for handle in self.replicas.iter_mut() {
            handle.vote = None;
        }
        let mut voting = Voting {
            replicas: &mut self.replicas,
            missing: BTreeSet::new(),
        };
        let staged = &self.staged;

        drive(
            &mut self.endpoint,
            &self.policy,
            &request,
            &mut voting,
            |voting, inbound| {
                let Message::PrepareResponse(PrepareResponse { transaction: txn, vote }) =
                    &inbound.packet.message
                else {
                    return;
                };
                if *txn != transaction {
                    return;
                }
                let Some(handle) = voting.replicas.get_mut(inbound.packet.header.source) else {
                    return;
                };
                match vote {
                    // Not a final vote: the replica wants blocks first.
                    Vote::MissingBlocks(ids) => voting.missing.extend(ids.iter().copied()),
                    final_vote => handle.vote = Some(final_vote.clone()),
                }
            },
            |voting| voting.replicas.all(|h| h.vote.is_some()),
            |voting| {
                if voting.missing.is_empty() {
                    return NextAttempt::Retry;
                }
                let mut messages: Vec<Message> = std::mem::take(&mut voting.missing)
                    .into_iter()
                    .filter_map(|id| staged.get(&id))
                    .map(|block| Message::WriteBlock(block.clone()))
                    .collect();
                if messages.is_empty() {
                    return NextAttempt::Retry;
                }
                debug!(txn = %transaction, blocks = messages.len(), "resending missing blocks");
                messages.push(request.clone());
                NextAttempt::Restart(messages)
            },
        )?;

        Ok(self
            .replicas
            .all(|h| h.vote.as_ref().is_some_and(Vote::is_yes)))
    }

    /// Phase two. Returns how many replicas acknowledged.
    fn commit_prepared(&mut self, transaction: TransactionId) -> ClientResult<usize> {
        for handle in self.replicas.iter_mut() {
            handle.committed = false;
        }

        drive(
            &mut self.endpoint,
            &self.policy,
            &Message::CommitRequest { transaction },
            &mut self.replicas,
            |replicas, inbound| {
                if inbound.packet.message == (Message::CommitResponse { transaction }) {
                    if let Some(handle) = replicas.get_mut(inbound.packet.header.source) {
                        handle.committed = true;
                    }
                }
            },
            |replicas| replicas.all(|h| h.committed),
            |_| NextAttempt::Retry,
        )?;

        Ok(self.replicas.count(|h| h.committed))
    }

    // ========================================================================
    // Abort
    // ========================================================================

    /// Discards every staged write on every replica.
    pub fn abort(&mut self, fd: FileDescriptor) -> ClientResult<()> {
        self.check_descriptor(fd)?;
        if self.staged.is_empty() {
            return Ok(());
        }
        self.staged.clear();

        let confirmed = self.abort_staged(fd)?;
        let expected = self.replicas.len();
        if confirmed < expected {
            warn!(fd = %fd, confirmed, expected, "abort incomplete");
            return Err(ClientError::AbortIncomplete {
                confirmed,
                expected,
            });
        }
        info!(fd = %fd, "aborted");
        Ok(())
    }

    /// Runs the abort exchange. Returns how many replicas confirmed success.
    fn abort_staged(&mut self, fd: FileDescriptor) -> ClientResult<usize> {
        self.status_exchange(Message::AbortRequest { descriptor: fd }, |message| {
            match message {
                Message::AbortResponse { status } => Some(*status),
                _ => None,
            }
        })?;
        Ok(self.replicas.count(|h| h.status == Some(Status::Success)))
    }

    // ========================================================================
    // Close
    // ========================================================================

    /// Commits any staged writes, then closes the file on every replica.
    ///
    /// If the implicit commit fails the file stays open.
    pub fn close(&mut self, fd: FileDescriptor) -> ClientResult<()> {
        self.check_descriptor(fd)?;
        if !self.staged.is_empty() {
            self.commit(fd)?;
        }

        self.open = None;
        self.status_exchange(Message::CloseFileRequest { descriptor: fd }, |message| {
            match message {
                Message::CloseFileResponse { status } => Some(*status),
                _ => None,
            }
        })?;
        for handle in self.replicas.iter_mut() {
            handle.open = false;
            handle.descriptor = None;
        }

        let confirmed = self.replicas.count(|h| h.status.is_some());
        let expected = self.replicas.len();
        if confirmed < expected {
            warn!(fd = %fd, confirmed, expected, "close incomplete");
            return Err(ClientError::CloseIncomplete {
                confirmed,
                expected,
            });
        }
        info!(fd = %fd, "closed");
        Ok(())
    }

    /// Closes every session a failed open left behind, one exchange per
    /// descriptor the replicas reported.
    pub(super) fn close_partial_open(&mut self) -> ClientResult<()> {
        let descriptors: BTreeSet<FileDescriptor> =
            self.replicas.iter().filter_map(|h| h.descriptor).collect();
        for fd in descriptors {
            self.status_exchange(Message::CloseFileRequest { descriptor: fd }, |message| {
                match message {
                    Message::CloseFileResponse { status } => Some(*status),
                    _ => None,
                }
            })?;
            let closed = self.replicas.count(|h| h.status == Some(Status::Success));
            debug!(fd = %fd, closed, "closed partially opened file");
        }
        for handle in self.replicas.iter_mut() {
            handle.descriptor = None;
        }
        Ok(())
    }

    /// Runs an exchange whose replies carry a [`Status`] and completes once
    /// every replica has answered.
    fn status_exchange(
        &mut self,
        request: Message,
        status_of: impl Fn(&Message) -> Option<Status>,
    ) -> ClientResult<()> {
        for handle in self.replicas.iter_mut() {
            handle.status = None;
        }
        drive(
            &mut self.endpoint,
            &self.policy,
            &request,
            &mut self.replicas,
            |replicas, inbound| {
                if let Some(status) = status_of(&inbound.packet.message) {
                    if let Some(handle) = replicas.get_mut(inbound.packet.header.source) {
                        handle.status = Some(status);
                    }
                }
            },
            |replicas| replicas.all(|h| h.status.is_some()),
            |_| NextAttempt::Retry,
        )?;
        Ok(())
    }
}
