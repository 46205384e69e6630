mod common;

use common::{config, connected_peer, seated_pair, settle};
use duel_peer::matchmaking::SeatPolicy;
use duel_peer::net::protocol::SlotId;
use duel_peer::net::LoopbackHub;

fn assert_distinct_seats(policy: SeatPolicy) {
    let hub = LoopbackHub::new("eu");
    let (a, b) = seated_pair(&hub, config(policy));

    assert_eq!(a.session.local_slot(), Some(SlotId::FIRST));
    assert_eq!(b.session.local_slot(), Some(SlotId::SECOND));
    assert_eq!(a.session.seats().occupancy(), [true, true]);
    assert_eq!(b.session.seats().occupancy(), [true, true]);

    // Each peer sees exactly one replica of the other, on the right seat
    let a_view = a.session.remote(b.session.peer_id()).unwrap();
    let b_view = b.session.remote(a.session.peer_id()).unwrap();
    assert_eq!(a_view.slot(), SlotId::SECOND);
    assert_eq!(b_view.slot(), SlotId::FIRST);
    assert_eq!(a.session.remotes().count(), 1);
    assert_eq!(b.session.remotes().count(), 1);
}

#[test]
fn sequential_joins_get_distinct_seats_with_replicated_flags() {
    assert_distinct_seats(SeatPolicy::Replicated);
}

#[test]
fn sequential_joins_get_distinct_seats_with_master_assignment() {
    assert_distinct_seats(SeatPolicy::Authoritative);
}

/// Both claims are in flight when the second peer picks, and the master
/// role has moved to it in between. With replicated flags both peers end
/// up on seat 0. This documents the known race; do not "fix" the assertion
/// without changing the policy.
#[test]
fn crossing_claims_share_a_seat_with_replicated_flags() {
    let hub = LoopbackHub::new("eu");
    let mut a = connected_peer(&hub, config(SeatPolicy::Replicated));
    let mut b = connected_peer(&hub, config(SeatPolicy::Replicated));

    hub.hold_deliveries();
    a.session.quick_start().unwrap();
    settle(&mut [&mut a.session]);
    assert_eq!(a.session.local_slot(), Some(SlotId::FIRST));

    b.session.quick_start().unwrap();
    hub.transfer_master(b.session.peer_id()).unwrap();
    settle(&mut [&mut b.session]);

    hub.release_deliveries();
    settle(&mut [&mut a.session, &mut b.session]);

    assert_eq!(a.session.local_slot(), Some(SlotId::FIRST));
    assert_eq!(b.session.local_slot(), Some(SlotId::FIRST));
    // The last claim to arrive wins each peer's table
    assert_eq!(
        a.session.seats().table().owner(SlotId::FIRST),
        Some(b.session.peer_id())
    );
    assert_eq!(
        b.session.seats().table().owner(SlotId::FIRST),
        Some(a.session.peer_id())
    );
}

#[test]
fn master_assignment_resolves_a_crossing_join() {
    let hub = LoopbackHub::new("eu");
    let mut a = connected_peer(&hub, config(SeatPolicy::Authoritative));
    let mut b = connected_peer(&hub, config(SeatPolicy::Authoritative));

    hub.hold_deliveries();
    a.session.quick_start().unwrap();
    settle(&mut [&mut a.session]);
    b.session.quick_start().unwrap();
    settle(&mut [&mut b.session]);

    // Nothing has crossed yet: the joiner is still waiting for the master
    assert_eq!(a.session.local_slot(), Some(SlotId::FIRST));
    assert_eq!(b.session.local_slot(), None);

    hub.release_deliveries();
    settle(&mut [&mut a.session, &mut b.session]);

    assert_eq!(a.session.local_slot(), Some(SlotId::FIRST));
    assert_eq!(b.session.local_slot(), Some(SlotId::SECOND));
    assert_eq!(
        b.session.seats().table().owner(SlotId::FIRST),
        Some(a.session.peer_id())
    );
}

#[test]
fn logout_frees_the_seat_for_the_next_join() {
    for policy in [SeatPolicy::Replicated, SeatPolicy::Authoritative] {
        let hub = LoopbackHub::new("eu");
        let (mut a, mut b) = seated_pair(&hub, config(policy));
        let b_id = b.session.peer_id();

        b.session.logout().unwrap();
        settle(&mut [&mut a.session, &mut b.session]);

        assert!(b.session.local().is_none());
        assert!(a.session.remote(b_id).is_none());
        assert_eq!(a.session.seats().occupancy(), [true, false], "{policy:?}");

        b.session.quick_start().unwrap();
        settle(&mut [&mut a.session, &mut b.session]);

        assert_eq!(b.session.local_slot(), Some(SlotId::SECOND), "{policy:?}");
        assert_eq!(a.session.remote(b_id).map(|r| r.slot()), Some(SlotId::SECOND));
        assert_eq!(b.session.joined_rooms(), 2);
    }
}
