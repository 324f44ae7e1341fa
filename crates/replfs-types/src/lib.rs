//! # replfs-types: Core types for `replfs`
//!
//! This crate contains the small value types shared by every `replfs`
//! component:
//! - Process identities ([`Identity`], [`IdentityGenerator`])
//! - Protocol counters ([`BlockId`], [`TransactionId`], [`SequenceNumber`])
//! - Remote file descriptors ([`FileDescriptor`])
//! - Block ranges for prepare-to-commit ([`BlockRange`])
//! - Protocol limits ([`MAX_WRITES`], [`MAX_BLOCK_LENGTH`], ...)

use std::fmt::{self, Display};
use std::ops::RangeInclusive;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Protocol Limits
// ============================================================================

/// Maximum number of staged blocks between two commits.
pub const MAX_WRITES: usize = 128;

/// Maximum payload carried by a single write block.
pub const MAX_BLOCK_LENGTH: usize = 512;

/// Maximum length of a file name, in bytes.
pub const MAX_FILE_NAME_LENGTH: usize = 127;

/// Maximum size of a replicated file (1 MiB).
pub const MAX_FILE_LENGTH: u64 = 1024 * 1024;

/// Retry ceiling for every multi-party exchange.
pub const MAX_ATTEMPTS: u32 = 10;

/// Default UDP port of the replication group.
pub const DEFAULT_PORT: u16 = 44022;

// ============================================================================
// Identity
// ============================================================================

/// Random 32-bit identity of a live process (coordinator or replica).
///
/// Identity `0` is reserved as the broadcast destination and is never
/// assigned to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(u32);

impl Identity {
    /// Destination identity addressing every replica.
    pub const BROADCAST: Identity = Identity(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns true for the broadcast identity.
    pub fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<u32> for Identity {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Identity> for u32 {
    fn from(id: Identity) -> Self {
        id.0
    }
}

/// Seeded source of process identities.
///
/// One generator is created at process start and shared by `&mut` with
/// whatever needs a fresh identity (initial join, collision regeneration).
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    rng: SmallRng,
}

impl IdentityGenerator {
    /// Creates a deterministic generator, used by tests and the simulator.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Creates a generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Returns a fresh non-zero identity.
    pub fn generate(&mut self) -> Identity {
        Identity(self.rng.gen_range(1..=u32::MAX))
    }
}

// ============================================================================
// File Descriptor
// ============================================================================

/// Remote file descriptor agreed upon by every replica for one opened path.
///
/// This is a protocol-level handle, unrelated to any OS file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileDescriptor(u32);

impl FileDescriptor {
    /// Wire value of a rejected open (`-1` as a 32-bit integer).
    pub const INVALID_RAW: u32 = u32::MAX;

    pub fn new(fd: u32) -> Self {
        Self(fd)
    }

    /// The first descriptor a replica hands out.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the descriptor following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Process-local, strictly increasing block identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    pub const FIRST: BlockId = BlockId(1);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identifier of one commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u32);

impl TransactionId {
    pub const FIRST: TransactionId = TransactionId(1);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-sender packet sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Advances the counter and returns the new value (the first call on a
    /// default counter yields 1).
    pub fn advance(&mut self) -> SequenceNumber {
        self.0 = self.0.wrapping_add(1);
        *self
    }
}

// ============================================================================
// Block Range
// ============================================================================

/// Inclusive range of block ids named by a prepare-to-commit request.
///
/// A transaction with no staged blocks carries no range at all; see
/// `Option<BlockRange>` in the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    first: BlockId,
    last: BlockId,
}

impl BlockRange {
    /// Creates a range. Returns `None` when `last < first`.
    pub fn new(first: BlockId, last: BlockId) -> Option<Self> {
        (first <= last).then_some(Self { first, last })
    }

    pub fn first(&self) -> BlockId {
        self.first
    }

    pub fn last(&self) -> BlockId {
        self.last
    }

    /// Number of block ids in the range.
    pub fn len(&self) -> usize {
        (self.last.0 - self.first.0) as usize + 1
    }

    /// A range always names at least one block.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.first <= id && id <= self.last
    }

    /// Iterates over every id in the range, ascending.
    pub fn ids(&self) -> impl Iterator<Item = BlockId> {
        let raw: RangeInclusive<u32> = self.first.0..=self.last.0;
        raw.map(BlockId)
    }
}
