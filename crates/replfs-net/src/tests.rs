//! Channel and endpoint tests over the in-memory network.

use std::time::Duration;

use replfs_types::Identity;
use replfs_wire::{JoinMode, Message};
use test_case::test_case;

use crate::*;

const SHORT: Duration = Duration::from_millis(20);

#[test]
fn memory_network_delivers_to_every_member_including_sender() {
    let network = MemoryNetwork::new();
    let mut a = network.join().unwrap();
    let mut b = network.join().unwrap();

    a.send_to_group(b"ping").unwrap();

    for channel in [&mut a, &mut b] {
        match channel.receive(SHORT).unwrap() {
            Received::Datagram { bytes, .. } => assert_eq!(&bytes[..], b"ping"),
            Received::TimedOut => panic!("datagram not delivered"),
        }
    }
}

#[test]
fn memory_channels_have_distinct_addresses() {
    let network = MemoryNetwork::new();
    let a = network.join().unwrap();
    let b = network.join().unwrap();
    assert_ne!(a.address(), b.address());
}

#[test]
fn receive_times_out_on_silence() {
    let network = MemoryNetwork::new();
    let mut a = network.join().unwrap();
    assert_eq!(a.receive(SHORT).unwrap(), Received::TimedOut);
}

#[test]
fn endpoint_discards_own_packets() {
    let network = MemoryNetwork::new();
    let mut endpoint = Endpoint::new(network.join().unwrap(), Identity::new(7));

    endpoint.broadcast(Message::JoinResponse).unwrap();
    assert!(endpoint.receive(SHORT).unwrap().is_none());
}

#[test]
fn endpoint_skips_garbage_and_returns_next_valid_packet() {
    let network = MemoryNetwork::new();
    let mut sender = Endpoint::new(network.join().unwrap(), Identity::new(1));
    let mut receiver = Endpoint::new(network.join().unwrap(), Identity::new(2));

    sender.channel_mut().send_to_group(b"not a packet").unwrap();
    sender
        .broadcast(Message::JoinRequest {
            mode: JoinMode::KeepIdentity,
        })
        .unwrap();

    let inbound = receiver.receive(SHORT).unwrap().unwrap();
    assert_eq!(inbound.packet.header.source, Identity::new(1));
    assert!(inbound.packet.header.destination.is_broadcast());
    assert_eq!(inbound.source, sender.channel().address());
}

#[test]
fn sequence_numbers_start_at_one_and_increase() {
    let network = MemoryNetwork::new();
    let mut sender = Endpoint::new(network.join().unwrap(), Identity::new(1));
    let mut receiver = Endpoint::new(network.join().unwrap(), Identity::new(2));

    sender.send(Identity::new(2), Message::JoinResponse).unwrap();
    sender.send(Identity::new(2), Message::JoinResponse).unwrap();

    let first = receiver.receive(SHORT).unwrap().unwrap();
    let second = receiver.receive(SHORT).unwrap().unwrap();
    assert_eq!(first.packet.header.sequence.as_u32(), 1);
    assert_eq!(second.packet.header.sequence.as_u32(), 2);
}

#[test]
fn changing_identity_changes_loopback_filter() {
    let network = MemoryNetwork::new();
    let mut endpoint = Endpoint::new(network.join().unwrap(), Identity::new(7));

    endpoint.broadcast(Message::JoinResponse).unwrap();
    endpoint.set_identity(Identity::new(8));
    let inbound = endpoint.receive(SHORT).unwrap().unwrap();
    assert_eq!(inbound.packet.header.source, Identity::new(7));
}

#[test_case(0, 0 ; "no loss")]
#[test_case(100, 200 ; "total loss")]
fn lossy_extremes(percent: u8, expected_drops: u64) {
    let network = MemoryNetwork::new();
    let mut lossy = Lossy::new(network.join().unwrap(), PacketLoss::new(percent, 42));
    for _ in 0..200 {
        lossy.send_to_group(b"x").unwrap();
    }
    assert_eq!(lossy.dropped(), expected_drops);
}

#[test]
fn loss_rate_tracks_configured_percent() {
    let mut loss = PacketLoss::new(30, 7);
    let drops = (0..10_000).filter(|_| loss.should_drop()).count();
    assert!((2_500..3_500).contains(&drops), "drops = {drops}");
}

#[test]
fn loss_percent_is_clamped() {
    assert_eq!(PacketLoss::new(250, 0).percent(), 100);
}

#[test]
fn same_seed_drops_same_packets() {
    let mut a = PacketLoss::new(50, 99);
    let mut b = PacketLoss::new(50, 99);
    let pattern_a: Vec<bool> = (0..64).map(|_| a.should_drop()).collect();
    let pattern_b: Vec<bool> = (0..64).map(|_| b.should_drop()).collect();
    assert_eq!(pattern_a, pattern_b);
}
