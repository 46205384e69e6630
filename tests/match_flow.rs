mod common;

use common::{config, run_ticks, seated_pair, settle, Peer};
use duel_peer::game::action::ActionRejected;
use duel_peer::game::effects::AnimationCue;
use duel_peer::game::player::{HpFloor, HpReplication};
use duel_peer::game::{ActionState, OFF_PLAYFIELD};
use duel_peer::matchmaking::SeatPolicy;
use duel_peer::net::protocol::SlotId;
use duel_peer::net::{LoopbackHub, Transport};
use duel_peer::{Config, SessionError};

fn pair(config: Config) -> (LoopbackHub, Peer, Peer) {
    let hub = LoopbackHub::new("eu");
    let (a, b) = seated_pair(&hub, config);
    (hub, a, b)
}

// Paused time keeps the network clock still, so receivers never skip ahead
#[tokio::test(start_paused = true)]
async fn shot_lands_on_the_tenth_tick_and_replicates_hp() {
    let (_hub, mut a, mut b) = pair(config(SeatPolicy::Authoritative));
    let b_id = b.session.peer_id();

    a.session.fire().unwrap();
    settle(&mut [&mut a.session, &mut b.session]);
    assert_eq!(a.session.projectiles().len(), 1);
    assert_eq!(b.session.projectiles().len(), 1);

    run_ticks(&mut [&mut a.session, &mut b.session], 9);
    assert_eq!(b.session.local().unwrap().hp(), 100);
    assert_eq!(b.session.local().unwrap().state(), ActionState::Idle);
    assert_eq!(a.presentation.explosion_count(), 0);

    run_ticks(&mut [&mut a.session, &mut b.session], 1);
    let struck = b.session.local().unwrap();
    assert_eq!(struck.hp(), 90);
    assert_eq!(struck.state(), ActionState::Damaged);
    let until = struck.invincible_until().unwrap();
    assert!((until - (b.session.now() + 1.978)).abs() < 1e-3, "until = {until}");

    // Both peers saw the explosion and dropped their copy of the projectile
    assert_eq!(a.presentation.explosion_count(), 1);
    assert_eq!(b.presentation.explosion_count(), 1);
    assert!(a.session.projectiles().is_empty());
    assert!(b.session.projectiles().is_empty());

    // The shooter learns the new hp from the owner's push
    assert_eq!(a.session.remote(b_id).unwrap().hp(), 90);
    assert!(a.presentation.saw(SlotId::SECOND, AnimationCue::Damaged));
}

#[tokio::test(start_paused = true)]
async fn actions_are_refused_while_invincible() {
    let (_hub, mut a, mut b) = pair(config(SeatPolicy::Authoritative));

    a.session.fire().unwrap();
    settle(&mut [&mut a.session, &mut b.session]);
    run_ticks(&mut [&mut a.session, &mut b.session], 10);

    let broadcasts_before = a.presentation.animations.lock().len();
    assert!(matches!(
        b.session.jump(),
        Err(SessionError::Action(ActionRejected::Invincible { .. }))
    ));
    settle(&mut [&mut a.session, &mut b.session]);
    assert_eq!(a.presentation.animations.lock().len(), broadcasts_before);

    // 1.978 s at 50 ticks per second
    run_ticks(&mut [&mut a.session, &mut b.session], 99);
    assert_eq!(b.session.local().unwrap().state(), ActionState::Idle);
    b.session.jump().unwrap();
    settle(&mut [&mut a.session, &mut b.session]);
    assert!(a.presentation.saw(SlotId::SECOND, AnimationCue::Jump));
}

#[tokio::test(start_paused = true)]
async fn second_hit_during_invincibility_is_absorbed() {
    let (_hub, mut a, mut b) = pair(config(SeatPolicy::Authoritative));

    a.session.fire().unwrap();
    settle(&mut [&mut a.session, &mut b.session]);
    run_ticks(&mut [&mut a.session, &mut b.session], 5);
    a.session.fire().unwrap();
    settle(&mut [&mut a.session, &mut b.session]);
    run_ticks(&mut [&mut a.session, &mut b.session], 10);

    assert_eq!(b.session.local().unwrap().hp(), 90);
    assert_eq!(b.presentation.explosion_count(), 2);
}

/// Shoot until the target drops, waiting out invincibility between shots
fn shoot_until_killed(a: &mut Peer, b: &mut Peer) -> usize {
    let mut shots = 0;
    while !b.session.local().unwrap().has_killed() && shots < 20 {
        a.session.fire().unwrap();
        shots += 1;
        settle(&mut [&mut a.session, &mut b.session]);
        run_ticks(&mut [&mut a.session, &mut b.session], 110);
    }
    shots
}

#[tokio::test(start_paused = true)]
async fn ten_hits_kill_and_the_kill_replicates() {
    for policy in [HpReplication::OnChange, HpReplication::EveryTick] {
        let config = Config {
            hp_replication: policy,
            ..config(SeatPolicy::Authoritative)
        };
        let (_hub, mut a, mut b) = pair(config);
        let b_id = b.session.peer_id();

        assert_eq!(shoot_until_killed(&mut a, &mut b), 10);

        let target = b.session.local().unwrap();
        assert_eq!(target.hp(), 0);
        assert_eq!(target.state(), ActionState::Killed);
        assert_eq!(target.position(), OFF_PLAYFIELD);

        let view = a.session.remote(b_id).unwrap();
        assert_eq!(view.hp(), 0);
        assert!(view.has_killed());
        assert_eq!(view.position(), OFF_PLAYFIELD);

        assert!(matches!(
            b.session.fire(),
            Err(SessionError::Action(ActionRejected::Killed))
        ));

        // Later shots fly past the parked player
        let explosions = a.presentation.explosion_count();
        a.session.fire().unwrap();
        settle(&mut [&mut a.session, &mut b.session]);
        run_ticks(&mut [&mut a.session, &mut b.session], 20);
        assert_eq!(a.presentation.explosion_count(), explosions);
    }
}

#[tokio::test(start_paused = true)]
async fn unclamped_floor_still_kills_at_zero() {
    let config = Config {
        hp_floor: HpFloor::Unclamped,
        ..config(SeatPolicy::Authoritative)
    };
    let (_hub, mut a, mut b) = pair(config);
    let b_id = b.session.peer_id();

    assert_eq!(shoot_until_killed(&mut a, &mut b), 10);
    // Ten hits of 10 land exactly on zero; going below it is covered by the replica tests
    assert_eq!(b.session.local().unwrap().hp(), 0);
    assert!(a.session.remote(b_id).unwrap().has_killed());
}

/// Leave and quick-start again, letting the other peer see the new spawn
fn rejoin(peer: &mut Peer, other: &mut Peer) {
    peer.session.logout().unwrap();
    settle(&mut [&mut peer.session, &mut other.session]);
    peer.session.quick_start().unwrap();
    settle(&mut [&mut peer.session, &mut other.session]);
    run_ticks(&mut [&mut peer.session, &mut other.session], 2);
}

#[tokio::test(start_paused = true)]
async fn rejoining_peer_learns_the_current_hp() {
    let (_hub, mut a, mut b) = pair(config(SeatPolicy::Authoritative));
    let b_id = b.session.peer_id();

    a.session.fire().unwrap();
    settle(&mut [&mut a.session, &mut b.session]);
    run_ticks(&mut [&mut a.session, &mut b.session], 10);
    assert_eq!(a.session.remote(b_id).unwrap().hp(), 90);

    rejoin(&mut a, &mut b);
    assert_eq!(b.session.local().unwrap().hp(), 90);
    let view = a.session.remote(b_id).unwrap();
    assert_eq!(view.hp(), 90);
    assert_eq!(view.hp_seq(), b.session.local().unwrap().hp_seq());
}

#[tokio::test(start_paused = true)]
async fn rejoining_peer_sees_a_killed_player_stay_down() {
    let (_hub, mut a, mut b) = pair(config(SeatPolicy::Authoritative));
    let b_id = b.session.peer_id();
    assert_eq!(shoot_until_killed(&mut a, &mut b), 10);

    rejoin(&mut a, &mut b);
    let view = a.session.remote(b_id).unwrap();
    assert_eq!(view.hp(), 0);
    assert!(view.has_killed());
    assert_eq!(view.position(), OFF_PLAYFIELD);
}

#[tokio::test(start_paused = true)]
async fn late_receiver_catches_up_to_the_shooter() {
    let (_hub, mut a, mut b) = pair(config(SeatPolicy::Authoritative));

    a.session.fire().unwrap();
    run_ticks(&mut [&mut a.session], 3);
    tokio::time::advance(std::time::Duration::from_millis(61)).await;
    settle(&mut [&mut b.session]);

    let shooter_copy = &a.session.projectiles()[0];
    let late_copy = &b.session.projectiles()[0];
    assert_eq!(late_copy.ticks_alive, 3);
    assert_eq!(late_copy.position, shooter_copy.position);
}

#[tokio::test(start_paused = true)]
async fn peer_leaving_mid_match_removes_its_player() {
    let (hub, mut a, mut b) = pair(config(SeatPolicy::Authoritative));
    let b_id = b.session.peer_id();
    let room = hub.room_names().remove(0);

    b.session.fire().unwrap();
    b.transport.disconnect().unwrap();
    settle(&mut [&mut a.session]);

    assert!(a.session.remote(b_id).is_none());
    assert_eq!(a.session.seats().occupancy(), [true, false]);
    assert_eq!(hub.room_members(&room), vec![a.session.peer_id()]);
}
