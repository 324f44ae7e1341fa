//! Protocol properties under faults: idempotence, atomicity, unanimity,
//! missing-block recovery and order-independent convergence.

use bytes::Bytes;
use proptest::prelude::*;
use replfs_client::{ClientError, Coordinator};
use replfs_sim::{SimCluster, SimConfig};
use replfs_types::{BlockId, FileDescriptor, Identity, TransactionId};
use replfs_wire::{Message, WriteBlock};

fn stranger() -> Identity {
    Identity::new(0x5151_5151)
}

fn connect(cluster: SimCluster) -> Coordinator<SimCluster> {
    cluster.connect().expect("join")
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn duplicate_write_blocks_are_staged_once() {
    let mut cluster = SimCluster::new(SimConfig::new(1)).unwrap();
    let open = Message::OpenFileRequest {
        file_name: "dup".into(),
    };
    cluster.inject(0, stranger(), open).unwrap();

    let block = Message::WriteBlock(WriteBlock {
        block_id: BlockId::FIRST,
        descriptor: FileDescriptor::first(),
        offset: 0,
        data: Bytes::from_static(b"once"),
    });
    for _ in 0..3 {
        assert_eq!(cluster.inject(0, stranger(), block.clone()).unwrap(), None);
    }
    assert_eq!(cluster.replica(0).unwrap().staged_len(), 1);
}

#[test]
fn repeated_commit_changes_nothing() {
    let mut coordinator = connect(SimCluster::new(SimConfig::new(2).with_seed(21)).unwrap());
    let fd = coordinator.open("again").unwrap();
    coordinator.write(fd, b"abc", 0).unwrap();
    coordinator.commit(fd).unwrap();

    let cluster = coordinator.channel_mut();
    let from = stranger();
    for _ in 0..2 {
        let reply = cluster
            .inject(
                0,
                from,
                Message::CommitRequest {
                    transaction: TransactionId::FIRST,
                },
            )
            .unwrap();
        assert_eq!(
            reply,
            Some(Message::CommitResponse {
                transaction: TransactionId::FIRST
            })
        );
    }
    assert_eq!(cluster.file(0, "again").as_deref(), Some(&b"abc"[..]));
}

#[test]
fn repeated_open_returns_the_same_descriptor() {
    let mut cluster = SimCluster::new(SimConfig::new(1)).unwrap();
    let open = Message::OpenFileRequest {
        file_name: "same".into(),
    };
    let first = cluster.inject(0, stranger(), open.clone()).unwrap();
    let second = cluster.inject(0, stranger(), open).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Atomicity and unanimity
// ============================================================================

#[test]
fn unreachable_replica_fails_the_vote_everywhere() {
    let mut coordinator = connect(SimCluster::new(SimConfig::new(3).with_seed(22)).unwrap());
    let fd = coordinator.open("atomic").unwrap();
    coordinator.write(fd, b"kept", 0).unwrap();
    coordinator.commit(fd).unwrap();

    coordinator.channel_mut().isolate(2).unwrap();
    coordinator.write(fd, b"LOST", 0).unwrap();
    assert!(matches!(
        coordinator.commit(fd),
        Err(ClientError::VoteFailed { .. })
    ));
    assert_eq!(coordinator.staged_len(), 0);
    for index in 0..2 {
        let cluster = coordinator.channel();
        assert_eq!(cluster.replica(index).unwrap().staged_len(), 0);
        assert_eq!(cluster.file(index, "atomic").as_deref(), Some(&b"kept"[..]));
    }

    coordinator.channel_mut().heal(2).unwrap();
    coordinator.write(fd, b"next", 4).unwrap();
    coordinator.commit(fd).unwrap();
    for index in 0..3 {
        assert_eq!(
            coordinator.channel().file(index, "atomic").as_deref(),
            Some(&b"keptnext"[..])
        );
    }
}

#[test]
fn diverged_descriptor_vetoes_the_transaction() {
    let mut coordinator = connect(SimCluster::new(SimConfig::new(3).with_seed(23)).unwrap());
    let fd = coordinator.open("veto").unwrap();

    // Replica 1 loses the session behind the coordinator's back.
    let reply = coordinator
        .channel_mut()
        .inject(1, stranger(), Message::CloseFileRequest { descriptor: fd })
        .unwrap();
    assert!(reply.is_some());

    coordinator.write(fd, b"never", 0).unwrap();
    assert!(matches!(
        coordinator.commit(fd),
        Err(ClientError::VoteFailed { .. })
    ));
    for index in 0..3 {
        let cluster = coordinator.channel();
        assert_eq!(cluster.replica(index).unwrap().staged_len(), 0);
        assert_eq!(cluster.file(index, "veto"), None);
    }
}

#[test]
fn failed_open_leaves_no_session_behind() {
    let mut coordinator = connect(SimCluster::new(SimConfig::new(2).with_seed(25)).unwrap());

    coordinator.channel_mut().isolate(1).unwrap();
    assert!(matches!(
        coordinator.open("x"),
        Err(ClientError::OpenNotAgreed { .. })
    ));
    assert_eq!(coordinator.open_descriptor(), None);
    assert_eq!(coordinator.channel().replica(0).unwrap().open_descriptor(), None);

    coordinator.channel_mut().heal(1).unwrap();
    let fd = coordinator.open("y").unwrap();
    coordinator.write(fd, b"after", 0).unwrap();
    coordinator.close(fd).unwrap();
    for index in 0..2 {
        assert_eq!(
            coordinator.channel().file(index, "y").as_deref(),
            Some(&b"after"[..])
        );
        assert_eq!(coordinator.channel().file(index, "x"), None);
    }
}

// ============================================================================
// Recovery and convergence
// ============================================================================

#[test]
fn missing_blocks_are_retransmitted_before_the_vote() {
    let mut cluster = SimCluster::new(SimConfig::new(3).with_seed(24)).unwrap();
    cluster.drop_fresh_writes(1).unwrap();
    let mut coordinator = connect(cluster);
    let fd = coordinator.open("gaps").unwrap();
    for (i, chunk) in [b"aa", b"bb", b"cc", b"dd"].iter().enumerate() {
        coordinator.write(fd, *chunk, (i * 2) as u32).unwrap();
    }
    let before = coordinator.channel().stats().sent;
    coordinator.commit(fd).unwrap();

    // At least one retransmission of all four blocks.
    assert!(coordinator.channel().stats().sent >= before + 4 + 2);
    for index in 0..3 {
        assert_eq!(
            coordinator.channel().file(index, "gaps").as_deref(),
            Some(&b"aabbccdd"[..])
        );
    }
}

/// Applies writes in issue order to an in-memory file.
fn model(writes: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut file = Vec::new();
    for (offset, data) in writes {
        let start = *offset as usize;
        let end = start + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[start..end].copy_from_slice(data);
    }
    file
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn replicas_converge_on_issue_order(
        seed in any::<u64>(),
        loss in 0u8..10,
        reorder in any::<bool>(),
        writes in proptest::collection::vec(
            (0u32..2048, proptest::collection::vec(any::<u8>(), 1..64)),
            1..24,
        ),
        commit_every in 1usize..8,
    ) {
        let config = SimConfig::new(3).with_seed(seed).with_loss(loss);
        let mut coordinator = connect(SimCluster::new(config).unwrap());
        let fd = coordinator.open("prop").unwrap();

        for (i, (offset, data)) in writes.iter().enumerate() {
            coordinator.channel_mut().hold_writes(reorder);
            coordinator.write(fd, data, *offset).unwrap();
            if (i + 1) % commit_every == 0 {
                // Held blocks arrive newest first, then retransmissions flow.
                let cluster = coordinator.channel_mut();
                cluster.hold_writes(false);
                cluster.release_held().unwrap();
                coordinator.commit(fd).unwrap();
            }
        }
        let cluster = coordinator.channel_mut();
        cluster.hold_writes(false);
        cluster.release_held().unwrap();
        coordinator.close(fd).unwrap();

        let expected = model(&writes);
        for index in 0..3 {
            prop_assert_eq!(coordinator.channel().file(index, "prop"), Some(expected.clone()));
        }
        prop_assert!(coordinator.channel().crashes().is_empty());
    }
}
