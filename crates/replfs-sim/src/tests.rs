//! Cluster plumbing tests.

use std::time::Duration;

use replfs_client::{ClientError, RetryPolicy};
use replfs_net::{Channel, Received};
use replfs_types::{FileDescriptor, Identity};
use replfs_wire::Message;
use test_case::test_case;

use crate::{SimCluster, SimConfig, SimError};

fn stranger() -> Identity {
    Identity::new(0xABCD)
}

fn quick() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        attempt_window: Duration::from_millis(5),
    }
}

#[test]
fn mounts_are_created_per_replica() {
    let cluster = SimCluster::new(SimConfig::new(3)).unwrap();
    assert_eq!(cluster.len(), 3);
    for index in 0..3 {
        assert!(cluster.replica(index).unwrap().mount().path().is_dir());
    }
    assert!(matches!(
        cluster.replica(3),
        Err(SimError::NoSuchReplica { index: 3, len: 3 })
    ));
}

#[test]
fn seeded_identities_are_reproducible() {
    let a = SimCluster::new(SimConfig::new(4).with_seed(11)).unwrap();
    let b = SimCluster::new(SimConfig::new(4).with_seed(11)).unwrap();
    assert_eq!(a.identities(), b.identities());
}

#[test]
fn explicit_identities_are_used() {
    let cluster = SimCluster::new(SimConfig::new(2).with_identities([7, 9])).unwrap();
    assert_eq!(cluster.identities(), vec![Identity::new(7), Identity::new(9)]);
}

#[test]
fn empty_inbox_times_out() {
    let mut cluster = SimCluster::new(SimConfig::new(1)).unwrap();
    assert_eq!(
        cluster.receive(Duration::from_secs(5)).unwrap(),
        Received::TimedOut
    );
}

#[test]
fn connect_joins_every_replica() {
    let cluster = SimCluster::new(SimConfig::new(3).with_seed(2)).unwrap();
    let expected = cluster.identities();
    let coordinator = cluster.connect().unwrap();

    let joined: Vec<Identity> = coordinator.replicas().identities().collect();
    let mut expected = expected;
    expected.sort();
    assert_eq!(joined, expected);
    assert_eq!(coordinator.channel().stats().sent, 1);
}

#[test]
fn isolated_replica_fails_the_join() {
    let mut cluster = SimCluster::new(SimConfig::new(3).with_retry(quick())).unwrap();
    cluster.isolate(1).unwrap();
    assert!(matches!(
        cluster.connect(),
        Err(SimError::Client(ClientError::MemberCountMismatch {
            expected: 3,
            found: 2
        }))
    ));
}

#[test]
fn injection_reaches_a_single_replica() {
    let mut cluster = SimCluster::new(SimConfig::new(2)).unwrap();
    let reply = cluster
        .inject(
            0,
            stranger(),
            Message::OpenFileRequest {
                file_name: "a.txt".into(),
            },
        )
        .unwrap();
    assert_eq!(
        reply,
        Some(Message::OpenFileResponse {
            descriptor: Some(FileDescriptor::first())
        })
    );
    assert_eq!(
        cluster.replica(0).unwrap().open_descriptor(),
        Some(FileDescriptor::first())
    );
    assert_eq!(cluster.replica(1).unwrap().open_descriptor(), None);
}

#[test]
fn held_writes_wait_for_release() {
    let mut cluster = SimCluster::new(SimConfig::new(2).with_seed(3)).unwrap();
    cluster.hold_writes(true);
    let mut coordinator = cluster.connect().unwrap();
    let fd = coordinator.open("held.txt").unwrap();
    coordinator.write(fd, b"abc", 0).unwrap();
    coordinator.write(fd, b"def", 3).unwrap();

    let cluster = coordinator.channel_mut();
    assert_eq!(cluster.replica(0).unwrap().staged_len(), 0);
    cluster.hold_writes(false);
    assert_eq!(cluster.release_held().unwrap(), 4);
    assert_eq!(cluster.replica(0).unwrap().staged_len(), 2);
    assert_eq!(cluster.replica(1).unwrap().staged_len(), 2);
}

#[test_case(0 ; "first replica")]
#[test_case(2 ; "last replica")]
fn fresh_writes_are_recovered_at_commit(lossy: usize) {
    let mut cluster = SimCluster::new(SimConfig::new(3).with_seed(4)).unwrap();
    cluster.drop_fresh_writes(lossy).unwrap();
    let mut coordinator = cluster.connect().unwrap();
    let fd = coordinator.open("recover.txt").unwrap();
    coordinator.write(fd, b"hello ", 0).unwrap();
    coordinator.write(fd, b"world", 6).unwrap();
    assert_eq!(coordinator.channel().replica(lossy).unwrap().staged_len(), 0);

    coordinator.commit(fd).unwrap();
    for index in 0..3 {
        assert_eq!(
            coordinator.channel().file(index, "recover.txt").as_deref(),
            Some(&b"hello world"[..])
        );
    }
    assert!(coordinator.channel().crashes().is_empty());
}
