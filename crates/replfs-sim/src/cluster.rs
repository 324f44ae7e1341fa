//! The simulated replica group.

use std::collections::{HashSet, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use replfs_client::{ClientConfig, Coordinator};
use replfs_io::SyncBackend;
use replfs_net::{Channel, NetResult, PacketLoss, Received};
use replfs_server::{MountDir, Replica};
use replfs_types::{BlockId, DEFAULT_PORT, Identity, IdentityGenerator, SequenceNumber};
use replfs_wire::{Message, Packet};
use tempfile::TempDir;
use tracing::{debug, trace, warn};

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};

/// Seed offset of the coordinator's identity generator.
const COORDINATOR_STREAM: u64 = 0xC0;

// ============================================================================
// Statistics
// ============================================================================

/// Delivery counters, summed over every replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Datagrams sent by the coordinator.
    pub sent: u64,
    /// Datagrams handed to a replica.
    pub delivered: u64,
    /// Datagrams lost in either direction.
    pub dropped: u64,
    /// Replies queued for the coordinator.
    pub replies: u64,
}

// ============================================================================
// Node
// ============================================================================

#[derive(Debug)]
struct SimNode {
    replica: Replica<SyncBackend>,
    address: SocketAddr,
    sequence: SequenceNumber,
    isolated: bool,
    /// Lose the first copy of every write block.
    drop_fresh_writes: bool,
    seen_writes: HashSet<BlockId>,
    /// Set once the replica hit a fatal error; the node stops receiving.
    crashed: Option<String>,
}

// ============================================================================
// Cluster
// ============================================================================

/// In-process replica group with deterministic fault injection.
#[derive(Debug)]
pub struct SimCluster {
    nodes: Vec<SimNode>,
    inbox: VecDeque<(Bytes, SocketAddr)>,
    held: Vec<(usize, Bytes)>,
    hold_writes: bool,
    loss: PacketLoss,
    stats: SimStats,
    config: SimConfig,
    // Dropped last so mounts outlive the replicas.
    root: TempDir,
}

impl SimCluster {
    /// Creates `config.replicas` replicas, each with a fresh mount directory
    /// under one temporary root.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        let root = tempfile::tempdir()?;
        let mut ids = IdentityGenerator::from_seed(config.seed);
        let mut nodes = Vec::with_capacity(config.replicas);

        for index in 0..config.replicas {
            let mount = MountDir::create(root.path().join(format!("replica-{index}")))?;
            let identity = match config.identities.as_ref().and_then(|fixed| fixed.get(index)) {
                Some(&identity) => identity,
                None => ids.generate(),
            };
            // Independent regeneration streams, even for equal identities.
            let regenerate = IdentityGenerator::from_seed(
                config.seed.wrapping_mul(31).wrapping_add(index as u64 + 1),
            );
            let replica = Replica::with_identity(identity, mount, SyncBackend::new(), regenerate);
            nodes.push(SimNode {
                replica,
                address: SocketAddr::from((Ipv4Addr::new(10, 0, 0, index as u8 + 1), DEFAULT_PORT)),
                sequence: SequenceNumber::default(),
                isolated: false,
                drop_fresh_writes: false,
                seen_writes: HashSet::new(),
                crashed: None,
            });
        }

        debug!(replicas = nodes.len(), seed = config.seed, loss = config.loss_percent, "cluster created");
        Ok(Self {
            nodes,
            inbox: VecDeque::new(),
            held: Vec::new(),
            hold_writes: false,
            loss: PacketLoss::new(config.loss_percent, config.seed),
            stats: SimStats::default(),
            config,
            root,
        })
    }

    /// Hands the cluster to a coordinator that joins every replica.
    pub fn connect(self) -> SimResult<Coordinator<SimCluster>> {
        let client = ClientConfig {
            replicas: self.nodes.len(),
            retry: self.config.retry,
            ..ClientConfig::default()
        };
        let ids = IdentityGenerator::from_seed(self.config.seed ^ COORDINATOR_STREAM);
        Ok(Coordinator::init(self, &client, ids)?)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn replica(&self, index: usize) -> SimResult<&Replica<SyncBackend>> {
        self.node(index).map(|node| &node.replica)
    }

    /// Current identities, in replica order.
    pub fn identities(&self) -> Vec<Identity> {
        self.nodes.iter().map(|node| node.replica.identity()).collect()
    }

    /// Path of `file_name` in replica `index`'s mount directory.
    pub fn path(&self, index: usize, file_name: &str) -> SimResult<PathBuf> {
        Ok(self.replica(index)?.mount().path().join(file_name))
    }

    /// Contents of `file_name` on replica `index`, if the file exists.
    pub fn file(&self, index: usize, file_name: &str) -> Option<Vec<u8>> {
        self.path(index, file_name).ok().and_then(|path| std::fs::read(path).ok())
    }

    /// Fatal replica errors so far, as `(index, message)`.
    pub fn crashes(&self) -> Vec<(usize, String)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.crashed.clone().map(|reason| (index, reason)))
            .collect()
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    // ========================================================================
    // Faults
    // ========================================================================

    /// Cuts replica `index` off: it neither receives nor answers.
    pub fn isolate(&mut self, index: usize) -> SimResult<()> {
        self.node_mut(index)?.isolated = true;
        Ok(())
    }

    pub fn heal(&mut self, index: usize) -> SimResult<()> {
        self.node_mut(index)?.isolated = false;
        Ok(())
    }

    /// Replica `index` loses the first copy of every write block it is sent;
    /// retransmissions get through.
    pub fn drop_fresh_writes(&mut self, index: usize) -> SimResult<()> {
        self.node_mut(index)?.drop_fresh_writes = true;
        Ok(())
    }

    /// While set, write blocks are held back instead of delivered.
    pub fn hold_writes(&mut self, hold: bool) {
        self.hold_writes = hold;
    }

    /// Delivers every held write block, newest first. Returns how many.
    pub fn release_held(&mut self) -> NetResult<usize> {
        let held = std::mem::take(&mut self.held);
        let count = held.len();
        for (index, datagram) in held.into_iter().rev() {
            self.deliver(index, &datagram)?;
        }
        Ok(count)
    }

    /// Hands `message` from `from` straight to replica `index`, bypassing
    /// loss and isolation, and returns its reply.
    pub fn inject(&mut self, index: usize, from: Identity, message: Message) -> SimResult<Option<Message>> {
        let node = self.node_mut(index)?;
        let packet = Packet::new(from, node.replica.identity(), SequenceNumber::new(1), message);
        let output = node.replica.on_packet(&packet)?;
        Ok(output.reply.map(|reply| reply.message))
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    fn node(&self, index: usize) -> SimResult<&SimNode> {
        let len = self.nodes.len();
        self.nodes.get(index).ok_or(SimError::NoSuchReplica { index, len })
    }

    fn node_mut(&mut self, index: usize) -> SimResult<&mut SimNode> {
        let len = self.nodes.len();
        self.nodes.get_mut(index).ok_or(SimError::NoSuchReplica { index, len })
    }

    /// Runs one datagram through replica `index` and queues its reply.
    fn deliver(&mut self, index: usize, datagram: &[u8]) -> NetResult<()> {
        let node = &mut self.nodes[index];
        if node.isolated || node.crashed.is_some() {
            return Ok(());
        }

        let packet = match Packet::decode_for(datagram, node.replica.identity()) {
            Ok(packet) => packet,
            Err(error) => {
                trace!(replica = index, %error, "dropping invalid packet");
                return Ok(());
            }
        };
        self.stats.delivered += 1;

        let output = match node.replica.on_packet(&packet) {
            Ok(output) => output,
            Err(error) => {
                warn!(replica = index, %error, "replica crashed");
                node.crashed = Some(error.to_string());
                return Ok(());
            }
        };
        let Some(reply) = output.reply else {
            return Ok(());
        };

        let sequence = node.sequence.advance();
        let bytes = Packet::new(node.replica.identity(), reply.to, sequence, reply.message).encode()?;
        let address = node.address;
        if self.loss.should_drop() {
            self.stats.dropped += 1;
            trace!(replica = index, "reply lost");
            return Ok(());
        }
        self.stats.replies += 1;
        self.inbox.push_back((bytes, address));
        Ok(())
    }

    /// Decides what happens to one outbound datagram at replica `index`.
    fn route(&mut self, index: usize, datagram: &Bytes, write: Option<BlockId>) -> NetResult<()> {
        if self.loss.should_drop() {
            self.stats.dropped += 1;
            return Ok(());
        }
        if let Some(block) = write {
            if self.hold_writes {
                self.held.push((index, datagram.clone()));
                return Ok(());
            }
            let node = &mut self.nodes[index];
            if node.drop_fresh_writes && node.seen_writes.insert(block) {
                self.stats.dropped += 1;
                trace!(replica = index, %block, "fresh write block lost");
                return Ok(());
            }
        }
        self.deliver(index, datagram)
    }
}

impl Channel for SimCluster {
    fn send_to_group(&mut self, datagram: &[u8]) -> NetResult<()> {
        self.stats.sent += 1;
        let datagram = Bytes::copy_from_slice(datagram);
        // Peek at the type without the receiver's validity check.
        let write = match Packet::decode_for(&datagram, Identity::BROADCAST) {
            Ok(Packet {
                message: Message::WriteBlock(block),
                ..
            }) => Some(block.block_id),
            _ => None,
        };
        for index in 0..self.nodes.len() {
            self.route(index, &datagram, write)?;
        }
        Ok(())
    }

    fn receive(&mut self, _timeout: Duration) -> NetResult<Received> {
        Ok(match self.inbox.pop_front() {
            Some((bytes, source)) => Received::Datagram { bytes, source },
            None => Received::TimedOut,
        })
    }
}
