use super::command_queue::CommandQueue;
use super::types::{Announcement, DirectMessage, GameEvent, ServerState, WorldUpdate};
use crate::domain::{
    ActionKind, ProfileRequest, RejectReason, Rejection, StructureListing, TickOutput,
    WorldSnapshot, WorldState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// Everything a world task publishes.
#[derive(Clone)]
pub struct WorldOutputs {
    pub world_tx: broadcast::Sender<WorldUpdate>,
    pub direct_tx: broadcast::Sender<DirectMessage>,
    pub structures_tx: watch::Sender<StructureListing>,
    pub server_state_tx: watch::Sender<ServerState>,
    pub announcements_tx: broadcast::Sender<Announcement>,
    pub profile_tx: mpsc::Sender<ProfileRequest>,
}

pub async fn world_task(
    world_id: Arc<str>,
    mut world: WorldState,
    mut input_rx: mpsc::Receiver<GameEvent>,
    outputs: WorldOutputs,
    tick_interval: Duration,
    action_queue_capacity: usize,
    shutdown: Arc<Notify>,
) {
    let mut queue = CommandQueue::new(action_queue_capacity);
    let tick_rate_hz = (1000 / tick_interval.as_millis().max(1)) as u32;
    // send_replace stores the value even while no session is watching.
    outputs.server_state_tx.send_replace(ServerState::Running {
        mode: world.mode(),
        tick_rate_hz,
    });
    info!(world_id = %world_id, tick_rate_hz, "world started");

    // Drive the fixed-step game loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {}
        }

        while let Ok(event) = input_rx.try_recv() {
            apply_event(&mut world, &mut queue, event, &outputs);
        }

        let batch = queue.drain_batch();
        let (snapshot, output) = world.step(batch);
        publish(&world_id, &world, snapshot, output, &outputs);
    }

    outputs.server_state_tx.send_replace(ServerState::Stopped);
    info!(world_id = %world_id, "world stopped");
}

/// Routes one inbound event. Lifecycle and input events take effect immediately; actions wait
/// in the player's queue for the tick.
pub fn apply_event(
    world: &mut WorldState,
    queue: &mut CommandQueue,
    event: GameEvent,
    outputs: &WorldOutputs,
) {
    match event {
        GameEvent::Join(request) => {
            info!(player_id = request.player_id, "player joined");
            world.join(request);
        }
        GameEvent::Leave {
            player_id,
            conn_token,
        } => {
            if world.leave(player_id, conn_token) {
                queue.remove_player(player_id);
                info!(player_id, "player left");
            } else {
                debug!(player_id, "stale leave ignored");
            }
        }
        GameEvent::Input { player_id, input } => world.set_input(player_id, input),
        GameEvent::DropInput { player_id } => world.clear_movement(player_id),
        GameEvent::Command { player_id, command } => {
            let action = command.action();
            if let Err(reason) = queue.push(player_id, command) {
                reject(outputs, player_id, action, reason);
            }
        }
        GameEvent::ProfileLoaded { player_id, profile } => {
            world.profile_loaded(player_id, profile);
        }
    }
}

fn reject(
    outputs: &WorldOutputs,
    player_id: u64,
    action: ActionKind,
    reason: RejectReason,
) {
    let _ = outputs.direct_tx.send(DirectMessage::Rejected(Rejection {
        player_id,
        action,
        reason,
    }));
}

fn publish(
    world_id: &Arc<str>,
    world: &WorldState,
    snapshot: WorldSnapshot,
    output: TickOutput,
    outputs: &WorldOutputs,
) {
    for rejection in output.rejections {
        let _ = outputs.direct_tx.send(DirectMessage::Rejected(rejection));
    }

    for request in output.profile_requests {
        // Never retried; the next save carries the whole profile again.
        if let Err(e) = outputs.profile_tx.try_send(request) {
            warn!(world_id = %world_id, error = %e, "profile queue unavailable; dropping request");
        }
    }

    for text in output.announcements {
        let _ = outputs.announcements_tx.send(Announcement {
            world_id: world_id.clone(),
            text,
        });
    }

    if output.structures_changed {
        outputs.structures_tx.send_replace(world.structure_listing());
    }

    let _ = outputs.world_tx.send(WorldUpdate {
        snapshot: Arc::new(snapshot),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Command, GameTuning, JoinRequest, Role, WorldConfig, WorldMode};

    struct Harness {
        outputs: WorldOutputs,
        world_rx: broadcast::Receiver<WorldUpdate>,
        direct_rx: broadcast::Receiver<DirectMessage>,
        profile_rx: mpsc::Receiver<ProfileRequest>,
    }

    fn harness() -> Harness {
        let (world_tx, world_rx) = broadcast::channel(64);
        let (direct_tx, direct_rx) = broadcast::channel(64);
        let (structures_tx, _) = watch::channel(StructureListing::default());
        let (server_state_tx, _) = watch::channel(ServerState::Starting);
        let (announcements_tx, _) = broadcast::channel(8);
        let (profile_tx, profile_rx) = mpsc::channel(8);
        Harness {
            outputs: WorldOutputs {
                world_tx,
                direct_tx,
                structures_tx,
                server_state_tx,
                announcements_tx,
                profile_tx,
            },
            world_rx,
            direct_rx,
            profile_rx,
        }
    }

    fn world() -> WorldState {
        WorldState::new(
            WorldConfig {
                mode: WorldMode::Versus,
                seed: 1,
                tick_ms: 33,
            },
            Arc::new(GameTuning::default()),
        )
    }

    fn join(player_id: u64) -> GameEvent {
        GameEvent::Join(JoinRequest {
            player_id,
            conn_token: 1,
            display_name: "Pilot".into(),
            session_role: Role::Player,
        })
    }

    #[test]
    fn when_action_queue_overflows_then_player_gets_queue_full() {
        let mut h = harness();
        let mut world = world();
        let mut queue = CommandQueue::new(1);
        apply_event(&mut world, &mut queue, join(4), &h.outputs);
        for _ in 0..2 {
            apply_event(
                &mut world,
                &mut queue,
                GameEvent::Command {
                    player_id: 4,
                    command: Command::Reload,
                },
                &h.outputs,
            );
        }

        let DirectMessage::Rejected(rejection) = h.direct_rx.try_recv().expect("rejection");
        assert_eq!(rejection.player_id, 4);
        assert_eq!(rejection.reason, RejectReason::QueueFull);
    }

    #[test]
    fn when_leave_carries_a_stale_token_then_player_stays() {
        let h = harness();
        let mut world = world();
        let mut queue = CommandQueue::new(4);
        apply_event(&mut world, &mut queue, join(4), &h.outputs);
        apply_event(
            &mut world,
            &mut queue,
            GameEvent::Leave {
                player_id: 4,
                conn_token: 99,
            },
            &h.outputs,
        );
        assert!(world.player(4).is_some());
    }

    #[tokio::test]
    async fn when_world_task_runs_then_joined_player_appears_in_updates() {
        let mut h = harness();
        let (input_tx, input_rx) = mpsc::channel(16);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(world_task(
            Arc::from("w"),
            world(),
            input_rx,
            h.outputs.clone(),
            Duration::from_millis(5),
            8,
            shutdown.clone(),
        ));

        input_tx.send(join(11)).await.expect("send join");

        let update = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let update = h.world_rx.recv().await.expect("world update");
                if update.snapshot.players.iter().any(|p| p.id == 11) {
                    break update;
                }
            }
        })
        .await
        .expect("player should appear");
        assert!(update.snapshot.tick >= 1);

        let request = h.profile_rx.recv().await.expect("profile request");
        assert_eq!(request, ProfileRequest::Load { player_id: 11 });

        shutdown.notify_one();
        task.await.expect("world task should exit");
    }
}
