//! The coordinator's view of the replicas.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use replfs_types::{FileDescriptor, Identity};
use replfs_wire::{Status, Vote};

/// What the coordinator knows about one replica.
///
/// The response fields hold the replica's answer to the exchange in
/// progress and are reset before each exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaHandle {
    pub identity: Identity,
    pub address: SocketAddr,
    /// The replica agreed to the currently open file.
    pub open: bool,
    /// Descriptor reported by the last open response (`None` if rejected
    /// or not yet answered).
    pub descriptor: Option<FileDescriptor>,
    /// Final vote for the transaction being prepared.
    pub vote: Option<Vote>,
    /// Status reported by the last abort or close response.
    pub status: Option<Status>,
    /// The replica acknowledged the transaction being committed.
    pub committed: bool,
}

impl ReplicaHandle {
    pub fn new(identity: Identity, address: SocketAddr) -> Self {
        Self {
            identity,
            address,
            open: false,
            descriptor: None,
            vote: None,
            status: None,
            committed: false,
        }
    }
}

/// Live replicas keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct ReplicaSet {
    handles: BTreeMap<Identity, ReplicaHandle>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.handles.contains_key(&identity)
    }

    pub fn get(&self, identity: Identity) -> Option<&ReplicaHandle> {
        self.handles.get(&identity)
    }

    pub fn get_mut(&mut self, identity: Identity) -> Option<&mut ReplicaHandle> {
        self.handles.get_mut(&identity)
    }

    pub fn insert(&mut self, handle: ReplicaHandle) {
        self.handles.insert(handle.identity, handle);
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicaHandle> {
        self.handles.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ReplicaHandle> {
        self.handles.values_mut()
    }

    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.handles.keys().copied()
    }

    /// True if every replica satisfies `predicate`.
    pub fn all(&self, predicate: impl Fn(&ReplicaHandle) -> bool) -> bool {
        self.handles.values().all(predicate)
    }

    /// Number of replicas satisfying `predicate`.
    pub fn count(&self, predicate: impl Fn(&ReplicaHandle) -> bool) -> usize {
        self.handles.values().filter(|h| predicate(h)).count()
    }

    /// The descriptor every replica reported, if they all reported the same
    /// valid one.
    pub fn agreed_descriptor(&self) -> Option<FileDescriptor> {
        let mut descriptors = self.handles.values().map(|h| h.descriptor);
        let first = descriptors.next()??;
        descriptors
            .all(|d| d == Some(first))
            .then_some(first)
    }
}
