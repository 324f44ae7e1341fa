//! Mount directory and event-loop tests.

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use replfs_io::SyncBackend;
use replfs_net::{Endpoint, MemoryNetwork};
use replfs_types::{FileDescriptor, Identity, IdentityGenerator};
use replfs_wire::{JoinMode, Message};
use test_case::test_case;

use crate::*;

#[test]
fn existing_mount_directory_is_in_use() {
    let dir = tempfile::tempdir().unwrap();
    let err = MountDir::create(dir.path()).unwrap_err();
    assert!(matches!(err, ServerError::MountInUse { .. }));
}

#[test]
fn concurrent_mounts_of_one_path_have_a_single_owner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared");

    for round in 0..50 {
        let path = path.join(round.to_string());
        let barrier = &Barrier::new(2);
        let path = &path;
        let owners = thread::scope(|s| {
            let racers: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        MountDir::create(path).is_ok()
                    })
                })
                .collect();
            racers
                .into_iter()
                .map(|racer| racer.join().unwrap())
                .filter(|&owned| owned)
                .count()
        });
        assert_eq!(owners, 1, "round {round}");
    }
}

#[test]
fn mount_directory_is_created_with_parents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b");
    let mount = MountDir::create(&path).unwrap();
    assert!(path.is_dir());
    assert_eq!(mount.path(), path.as_path());
}

#[test_case("file.txt", true ; "plain name")]
#[test_case("..", false ; "parent")]
#[test_case(".", false ; "current")]
#[test_case("a/b", false ; "nested")]
#[test_case("/etc/passwd", false ; "absolute")]
#[test_case("dir/", false ; "trailing separator")]
fn mount_resolves_plain_names_only(name: &str, accepted: bool) {
    let dir = tempfile::tempdir().unwrap();
    let mount = MountDir::create(dir.path().join("m")).unwrap();
    assert_eq!(mount.resolve(name).is_some(), accepted);
}

fn server(
    network: &MemoryNetwork,
    dir: &tempfile::TempDir,
) -> ReplicaServer<replfs_net::MemoryChannel, SyncBackend> {
    let mount = MountDir::create(dir.path().join("mount")).unwrap();
    let replica = Replica::with_identity(
        Identity::new(0x5151_5151),
        mount,
        SyncBackend::new(),
        IdentityGenerator::from_seed(11),
    );
    ReplicaServer::new(network.join().unwrap(), replica)
        .with_poll_interval(Duration::from_millis(20))
}

#[test]
fn step_answers_a_request() {
    let dir = tempfile::tempdir().unwrap();
    let network = MemoryNetwork::new();
    let mut server = server(&network, &dir);
    let mut coordinator = Endpoint::new(network.join().unwrap(), Identity::new(1));

    coordinator
        .broadcast(Message::OpenFileRequest {
            file_name: "f".into(),
        })
        .unwrap();
    assert!(server.step().unwrap());

    // The coordinator first sees its own loopback (filtered), then the reply.
    let inbound = coordinator
        .receive(Duration::from_millis(50))
        .unwrap()
        .unwrap();
    assert_eq!(inbound.packet.header.source, Identity::new(0x5151_5151));
    assert_eq!(inbound.packet.header.destination, Identity::new(1));
    assert_eq!(
        inbound.packet.message,
        Message::OpenFileResponse {
            descriptor: Some(FileDescriptor::first())
        }
    );
}

#[test]
fn step_times_out_quietly() {
    let dir = tempfile::tempdir().unwrap();
    let network = MemoryNetwork::new();
    let mut server = server(&network, &dir);
    assert!(!server.step().unwrap());
}

#[test]
fn regenerated_identity_is_used_for_the_reply() {
    let dir = tempfile::tempdir().unwrap();
    let network = MemoryNetwork::new();
    let mut server = server(&network, &dir);
    let mut coordinator = Endpoint::new(network.join().unwrap(), Identity::new(1));

    coordinator
        .broadcast(Message::JoinRequest {
            mode: JoinMode::RegenerateIdentity,
        })
        .unwrap();
    server.step().unwrap();

    let fresh = server.replica().identity();
    assert_ne!(fresh, Identity::new(0x5151_5151));
    assert_eq!(server.endpoint().identity(), fresh);

    let inbound = coordinator
        .receive(Duration::from_millis(50))
        .unwrap()
        .unwrap();
    assert_eq!(inbound.packet.header.source, fresh);
    assert_eq!(inbound.packet.message, Message::JoinResponse);
}
