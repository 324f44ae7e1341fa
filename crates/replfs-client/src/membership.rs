//! Coordinator-side join.
//!
//! The coordinator multicasts a join request and collects replies until it
//! has heard from the expected number of distinct replicas. Identities are
//! random, so two processes may pick the same one; the coordinator notices
//! when one identity answers from two addresses, forgets everything it
//! collected and asks every replica to draw a new identity.

use std::net::SocketAddr;

use replfs_net::{Channel, Endpoint, Inbound};
use replfs_types::Identity;
use replfs_wire::{JoinMode, Message};
use tracing::{info, warn};

use crate::engine::{NextAttempt, RetryPolicy, drive};
use crate::error::{ClientError, ClientResult};
use crate::replica_set::{ReplicaHandle, ReplicaSet};

#[derive(Debug)]
struct Joining {
    replicas: ReplicaSet,
    collided: bool,
}

impl Joining {
    fn on_reply(&mut self, inbound: &Inbound) {
        if inbound.packet.message != Message::JoinResponse {
            return;
        }
        let identity = inbound.packet.header.source;
        if self.is_collision(identity, inbound.source) {
            warn!(replica = %identity, address = %inbound.source, "identity collision");
            self.replicas.clear();
            self.collided = true;
            return;
        }
        if !self.replicas.contains(identity) {
            self.replicas
                .insert(ReplicaHandle::new(identity, inbound.source));
        }
    }

    fn is_collision(&self, identity: Identity, address: SocketAddr) -> bool {
        self.replicas
            .get(identity)
            .is_some_and(|known| known.address != address)
    }
}

/// Collects exactly `expected` distinct replicas.
pub(crate) fn join<C: Channel>(
    endpoint: &mut Endpoint<C>,
    policy: &RetryPolicy,
    expected: usize,
) -> ClientResult<ReplicaSet> {
    let mut state = Joining {
        replicas: ReplicaSet::new(),
        collided: false,
    };

    let joined = drive(
        endpoint,
        policy,
        &Message::JoinRequest {
            mode: JoinMode::KeepIdentity,
        },
        &mut state,
        Joining::on_reply,
        |s| s.replicas.len() == expected,
        |s| {
            if std::mem::take(&mut s.collided) {
                // Replies after the collision carry identities about to change.
                s.replicas.clear();
                NextAttempt::Restart(vec![Message::JoinRequest {
                    mode: JoinMode::RegenerateIdentity,
                }])
            } else {
                NextAttempt::Retry
            }
        },
    )?;

    if !joined {
        warn!(expected, found = state.replicas.len(), "join failed");
        return Err(ClientError::MemberCountMismatch {
            expected,
            found: state.replicas.len(),
        });
    }

    info!(
        coordinator = %endpoint.identity(),
        replicas = state.replicas.len(),
        "joined replica group"
    );
    Ok(state.replicas)
}
