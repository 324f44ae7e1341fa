//! Replica state machine.
//!
//! A replica holds at most one file session. Requests are handled one at a
//! time and each produces at most one reply, addressed to the requester.
//! Every handler is idempotent: a retransmitted request yields the same
//! reply and no further state change.
//!
//! ```text
//!            OpenFile                   CloseFile
//!   Closed ───────────► Open ◄──────┐ ───────────► Closed
//!                        │          │
//!              WriteBlock│          │Commit / Abort
//!                        ▼          │
//!                      Staged ──────┘
//! ```

use std::path::PathBuf;

use replfs_io::IoBackend;
use replfs_types::{FileDescriptor, Identity, IdentityGenerator};
use replfs_wire::{JoinMode, Message, Packet, Status};
use tracing::{debug, info};

use crate::error::ServerResult;
use crate::mount::MountDir;

mod session;
mod transaction;

use session::FileSession;


// ============================================================================
// Output
// ============================================================================

/// A message to send in response to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub to: Identity,
    pub message: Message,
}

/// What the event loop must do after one packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaOutput {
    /// At most one reply per request.
    pub reply: Option<Reply>,
}

impl ReplicaOutput {
    /// Nothing to send.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn reply(to: Identity, message: Message) -> Self {
        Self {
            reply: Some(Reply { to, message }),
        }
    }
}

// ============================================================================
// Replica
// ============================================================================

/// One replica's protocol state.
#[derive(Debug)]
pub struct Replica<B> {
    identity: Identity,
    ids: IdentityGenerator,
    mount: MountDir,
    backend: B,
    /// Descriptor handed out by the next successful open.
    next_descriptor: FileDescriptor,
    session: Option<FileSession>,
}

impl<B: IoBackend> Replica<B> {
    /// Creates a replica with a fresh identity drawn from `ids`.
    pub fn new(mount: MountDir, backend: B, mut ids: IdentityGenerator) -> Self {
        let identity = ids.generate();
        Self::with_identity(identity, mount, backend, ids)
    }

    /// Creates a replica with a fixed identity.
    pub fn with_identity(
        identity: Identity,
        mount: MountDir,
        backend: B,
        ids: IdentityGenerator,
    ) -> Self {
        info!(replica = %identity, mount = %mount.path().display(), "replica started");
        Self {
            identity,
            ids,
            mount,
            backend,
            next_descriptor: FileDescriptor::first(),
            session: None,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn mount(&self) -> &MountDir {
        &self.mount
    }

    /// Descriptor of the currently open file, if any.
    pub fn open_descriptor(&self) -> Option<FileDescriptor> {
        self.session
            .as_ref()
            .filter(|s| s.is_open())
            .map(FileSession::descriptor)
    }

    /// Number of blocks staged and not yet committed or aborted.
    pub fn staged_len(&self) -> usize {
        self.session.as_ref().map_or(0, FileSession::staged_len)
    }

    /// Handles one valid inbound packet.
    ///
    /// Packets addressed to another identity and responses (which only a
    /// coordinator consumes) are ignored.
    pub fn on_packet(&mut self, packet: &Packet) -> ServerResult<ReplicaOutput> {
        let header = &packet.header;
        let kind = packet.message.message_type();
        if !header.is_for(self.identity) || !kind.is_request() {
            return Ok(ReplicaOutput::empty());
        }

        debug!(
            replica = %self.identity,
            from = %header.source,
            seq = header.sequence.as_u32(),
            message = kind.name(),
            "dispatching request"
        );

        let from = header.source;
        let output = match &packet.message {
            Message::JoinRequest { mode } => self.on_join(from, *mode),
            Message::OpenFileRequest { file_name } => self.on_open(from, file_name),
            Message::WriteBlock(block) => {
                self.on_write_block(block);
                ReplicaOutput::empty()
            }
            Message::PrepareRequest(request) => self.on_prepare(from, request),
            Message::CommitRequest { transaction } => self.on_commit(from, *transaction)?,
            Message::AbortRequest { descriptor } => self.on_abort(from, *descriptor),
            Message::CloseFileRequest { descriptor } => self.on_close(from, *descriptor)?,
            _ => ReplicaOutput::empty(),
        };
        Ok(output)
    }

    // ========================================================================
    // Membership
    // ========================================================================

    fn on_join(&mut self, from: Identity, mode: JoinMode) -> ReplicaOutput {
        if mode == JoinMode::RegenerateIdentity {
            let old = self.identity;
            self.identity = self.ids.generate();
            info!(old = %old, new = %self.identity, "regenerated identity");
        }
        ReplicaOutput::reply(from, Message::JoinResponse)
    }

    // ========================================================================
    // Open / Close
    // ========================================================================

    fn on_open(&mut self, from: Identity, file_name: &str) -> ReplicaOutput {
        let descriptor = match self.session.as_ref().filter(|s| s.is_open()) {
            Some(session) if session.file_name() == file_name => Some(session.descriptor()),
            Some(_) => None,
            None => self.open_session(file_name),
        };
        ReplicaOutput::reply(from, Message::OpenFileResponse { descriptor })
    }

    fn open_session(&mut self, file_name: &str) -> Option<FileDescriptor> {
        let path: PathBuf = self.mount.resolve(file_name)?;
        let descriptor = self.next_descriptor;
        self.next_descriptor = descriptor.next();
        info!(replica = %self.identity, fd = %descriptor, file = file_name, "opened file");
        self.session = Some(FileSession::open(descriptor, file_name, path));
        Some(descriptor)
    }

    fn on_close(&mut self, from: Identity, descriptor: FileDescriptor) -> ServerResult<ReplicaOutput> {
        let status = match self.session.as_mut() {
            Some(session) if session.descriptor() == descriptor => {
                if session.is_open() {
                    session.close(&self.backend)?;
                    info!(replica = %self.identity, fd = %descriptor, "closed file");
                }
                Status::Success
            }
            _ => Status::Failure,
        };
        Ok(ReplicaOutput::reply(from, Message::CloseFileResponse { status }))
    }
}
