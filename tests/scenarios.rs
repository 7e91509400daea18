// End-to-end tick scenarios driven through the public world API and the per-player queue.

use bastion_server::domain::weapon::WeaponKind;
use bastion_server::domain::{
    ActionKind, Command, GameTuning, JoinRequest, RejectReason, Role, WorldConfig, WorldEvent,
    WorldMode, WorldState,
};
use bastion_server::use_cases::command_queue::CommandQueue;
use std::sync::Arc;

const TICK_MS: u64 = 100;

fn world(mode: WorldMode, seed: u64) -> WorldState {
    WorldState::new(
        WorldConfig {
            mode,
            seed,
            tick_ms: TICK_MS,
        },
        Arc::new(GameTuning::default()),
    )
}

fn join(world: &mut WorldState, player_id: u64) {
    world.join(JoinRequest {
        player_id,
        conn_token: player_id,
        display_name: format!("player-{player_id}"),
        session_role: Role::Player,
    });
}

fn fire() -> Command {
    Command::Fire {
        angle: -1.2,
        client_shot_id: None,
    }
}

#[test]
fn test_two_queued_fires_with_one_round_left() {
    let mut w = world(WorldMode::Versus, 1);
    let mut queue = CommandQueue::new(8);
    join(&mut w, 1);

    // Eleven shots on the pistol's 300 ms cadence leave one round.
    for _ in 0..11 {
        queue.push(1, fire()).expect("queue has room");
        let (_, output) = w.step(queue.drain_batch());
        assert!(output.rejections.is_empty());
        w.step(queue.drain_batch());
        w.step(queue.drain_batch());
    }
    assert_eq!(w.weapon(1, WeaponKind::Pistol).map(|i| i.ammo), Some(1));

    queue.push(1, fire()).expect("queue has room");
    queue.push(1, fire()).expect("queue has room");

    let (snapshot, output) = w.step(queue.drain_batch());
    assert!(output.rejections.is_empty(), "A should fire");
    assert!(snapshot
        .events
        .iter()
        .any(|e| matches!(e, WorldEvent::ProjectileSpawned { owner: 1, .. })));

    let (_, output) = w.step(queue.drain_batch());
    assert_eq!(output.rejections.len(), 1, "B should be rejected");
    assert_eq!(output.rejections[0].action, ActionKind::Fire);
    assert_eq!(output.rejections[0].reason, RejectReason::OutOfAmmo);
}

#[test]
fn test_queue_applies_one_action_per_player_per_tick() {
    let mut w = world(WorldMode::Versus, 2);
    let mut queue = CommandQueue::new(2);
    join(&mut w, 1);
    join(&mut w, 2);

    queue.push(1, fire()).expect("room");
    queue.push(1, Command::Reload).expect("room");
    assert_eq!(queue.push(1, fire()), Err(RejectReason::QueueFull));
    queue.push(2, fire()).expect("room");

    let (snapshot, _) = w.step(queue.drain_batch());
    let shooters: Vec<u64> = snapshot
        .events
        .iter()
        .filter_map(|e| match e {
            WorldEvent::ProjectileSpawned { owner, .. } => Some(*owner),
            _ => None,
        })
        .collect();
    assert_eq!(shooters, vec![1, 2]);
    assert_eq!(queue.pending(1), 1);
    assert_eq!(queue.pending(2), 0);
}

#[test]
fn test_same_seed_and_commands_replay_identically() {
    let run = || {
        let mut w = world(WorldMode::Versus, 42);
        for id in 1..=3 {
            join(&mut w, id);
        }
        let mut last = None;
        for tick in 0..20u64 {
            let actions = if tick % 4 == 0 {
                vec![(1, fire()), (3, fire())]
            } else {
                Vec::new()
            };
            let (snapshot, _) = w.step(actions);
            last = Some(snapshot);
        }
        last.expect("at least one tick")
    };

    assert_eq!(run(), run());
}
