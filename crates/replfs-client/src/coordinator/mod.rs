//! Coordinator transaction manager.
//!
//! The coordinator owns one file session at a time. Writes are staged
//! locally and multicast once; a commit runs a two-phase exchange in which
//! every replica must vote yes. Every operation either succeeds or returns
//! an error without changing the session.

use std::collections::BTreeMap;

use bytes::Bytes;
use replfs_net::{Channel, Endpoint, Lossy, MulticastChannel, PacketLoss};
use replfs_types::{
    BlockId, FileDescriptor, Identity, IdentityGenerator, MAX_BLOCK_LENGTH, MAX_FILE_LENGTH,
    MAX_FILE_NAME_LENGTH, MAX_WRITES, TransactionId,
};
use replfs_wire::{Message, Status, WriteBlock};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::engine::{NextAttempt, RetryPolicy, ask, drive};
use crate::error::{ClientError, ClientResult};
use crate::membership;
use crate::replica_set::ReplicaSet;

mod transaction;


/// The file currently open on every replica.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenFile {
    descriptor: FileDescriptor,
    file_name: String,
}

/// Client side of the replicated file protocol.
#[derive(Debug)]
pub struct Coordinator<C> {
    endpoint: Endpoint<C>,
    policy: RetryPolicy,
    replicas: ReplicaSet,
    open: Option<OpenFile>,
    staged: BTreeMap<BlockId, WriteBlock>,
    next_block: BlockId,
    next_transaction: TransactionId,
}

impl Coordinator<Lossy<MulticastChannel>> {
    /// Binds the multicast group and joins `config.replicas` replicas.
    pub fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let channel = MulticastChannel::bind(config.multicast)?;
        let channel = Lossy::new(channel, PacketLoss::from_entropy(config.loss_percent));
        Self::init(channel, config, IdentityGenerator::from_entropy())
    }
}

impl<C: Channel> Coordinator<C> {
    /// Draws an identity and joins exactly `config.replicas` replicas over
    /// `channel`.
    pub fn init(channel: C, config: &ClientConfig, mut ids: IdentityGenerator) -> ClientResult<Self> {
        let identity = ids.generate();
        let mut endpoint = Endpoint::new(channel, identity);
        info!(coordinator = %identity, replicas = config.replicas, "joining");

        let replicas = membership::join(&mut endpoint, &config.retry, config.replicas)?;

        Ok(Self {
            endpoint,
            policy: config.retry,
            replicas,
            open: None,
            staged: BTreeMap::new(),
            next_block: BlockId::FIRST,
            next_transaction: TransactionId::FIRST,
        })
    }

    pub fn identity(&self) -> Identity {
        self.endpoint.identity()
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    pub fn channel(&self) -> &C {
        self.endpoint.channel()
    }

    pub fn channel_mut(&mut self) -> &mut C {
        self.endpoint.channel_mut()
    }

    /// Descriptor of the open file, if any.
    pub fn open_descriptor(&self) -> Option<FileDescriptor> {
        self.open.as_ref().map(|f| f.descriptor)
    }

    /// Number of blocks written since the last commit or abort.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    // ========================================================================
    // Open
    // ========================================================================

    /// Opens `file_name` on every replica and returns the agreed descriptor.
    ///
    /// If the replicas do not agree, every session the exchange opened is
    /// closed again before [`ClientError::OpenNotAgreed`] is returned. When
    /// every replica answered with a different valid descriptor, the lagging
    /// counters are advanced and the open is tried once more.
    pub fn open(&mut self, file_name: &str) -> ClientResult<FileDescriptor> {
        if self.open.is_some() {
            return Err(ClientError::FileAlreadyOpen);
        }
        if file_name.len() > MAX_FILE_NAME_LENGTH {
            return Err(ClientError::PathTooLong {
                len: file_name.len(),
            });
        }
        if file_name.contains('\0') {
            return Err(ClientError::NulInFileName {
                file_name: file_name.to_owned(),
            });
        }

        let mut aligned = false;
        loop {
            if let Some(descriptor) = self.open_exchange(file_name)? {
                for handle in self.replicas.iter_mut() {
                    handle.open = true;
                }
                self.open = Some(OpenFile {
                    descriptor,
                    file_name: file_name.to_owned(),
                });
                info!(file = file_name, fd = %descriptor, "opened");
                return Ok(descriptor);
            }

            warn!(file = file_name, "replicas did not agree on a descriptor");
            let reported: Vec<(Identity, FileDescriptor)> = self
                .replicas
                .iter()
                .filter_map(|h| h.descriptor.map(|fd| (h.identity, fd)))
                .collect();
            let everyone_answered = reported.len() == self.replicas.len();
            self.close_partial_open()?;

            // Retry once if the only problem was diverged descriptor counters.
            if aligned || !everyone_answered || !self.align_descriptors(file_name, &reported)? {
                return Err(ClientError::OpenNotAgreed {
                    file_name: file_name.to_owned(),
                });
            }
            aligned = true;
        }
    }

    /// Runs one open exchange. Returns the descriptor every replica agreed on.
    fn open_exchange(&mut self, file_name: &str) -> ClientResult<Option<FileDescriptor>> {
        for handle in self.replicas.iter_mut() {
            handle.descriptor = None;
        }

        let agreed = drive(
            &mut self.endpoint,
            &self.policy,
            &Message::OpenFileRequest {
                file_name: file_name.to_owned(),
            },
            &mut self.replicas,
            |replicas, inbound| {
                if let Message::OpenFileResponse { descriptor } = inbound.packet.message {
                    if let Some(handle) = replicas.get_mut(inbound.packet.header.source) {
                        handle.descriptor = descriptor;
                    }
                }
            },
            |replicas| replicas.agreed_descriptor().is_some(),
            |_| NextAttempt::Retry,
        )?;

        Ok(self.replicas.agreed_descriptor().filter(|_| agreed))
    }

    /// Brings every replica's descriptor counter up to the highest descriptor
    /// in `reported` by opening and closing `file_name` on the lagging
    /// replicas alone.
    ///
    /// Returns false if a replica stopped answering or did not advance.
    fn align_descriptors(
        &mut self,
        file_name: &str,
        reported: &[(Identity, FileDescriptor)],
    ) -> ClientResult<bool> {
        let Some(target) = reported.iter().map(|&(_, fd)| fd).max() else {
            return Ok(false);
        };
        let request = Message::OpenFileRequest {
            file_name: file_name.to_owned(),
        };

        for &(replica, mut current) in reported {
            while current < target {
                let opened = ask(&mut self.endpoint, &self.policy, replica, &request, |m| {
                    match m {
                        Message::OpenFileResponse { descriptor } => Some(*descriptor),
                        _ => None,
                    }
                })?;
                let Some(Some(opened)) = opened else {
                    return Ok(false);
                };

                let close = Message::CloseFileRequest { descriptor: opened };
                let status = ask(&mut self.endpoint, &self.policy, replica, &close, |m| match m {
                    Message::CloseFileResponse { status } => Some(*status),
                    _ => None,
                })?;
                if status != Some(Status::Success) || opened <= current {
                    return Ok(false);
                }
                debug!(replica = %replica, fd = %opened, "advanced descriptor counter");
                current = opened;
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Write
    // ========================================================================

    /// Stages `buffer` at `offset` and multicasts it once. Returns the number
    /// of bytes accepted.
    ///
    /// Nothing reaches a file until [`commit`](Self::commit); a block lost on
    /// the way is retransmitted during the commit.
    pub fn write(&mut self, fd: FileDescriptor, buffer: &[u8], offset: u32) -> ClientResult<usize> {
        self.check_descriptor(fd)?;
        if self.staged.len() >= MAX_WRITES {
            return Err(ClientError::TooManyWrites);
        }
        if buffer.len() > MAX_BLOCK_LENGTH {
            return Err(ClientError::BlockTooLarge { len: buffer.len() });
        }
        let end = u64::from(offset) + buffer.len() as u64;
        if end > MAX_FILE_LENGTH {
            return Err(ClientError::FileTooLarge { end });
        }

        let block_id = self.next_block;
        self.next_block = block_id.next();
        let block = WriteBlock {
            block_id,
            descriptor: fd,
            offset,
            data: Bytes::copy_from_slice(buffer),
        };

        self.endpoint.broadcast(Message::WriteBlock(block.clone()))?;
        self.staged.insert(block_id, block);
        debug!(block = %block_id, offset, len = buffer.len(), "staged block");
        Ok(buffer.len())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_descriptor(&self, fd: FileDescriptor) -> ClientResult<()> {
        match &self.open {
            None => Err(ClientError::NoFileOpen),
            Some(open) if open.descriptor != fd => Err(ClientError::BadDescriptor {
                given: fd,
                open: open.descriptor,
            }),
            Some(_) => Ok(()),
        }
    }
}
