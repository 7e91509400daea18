// Per-player action queues drained once per tick.
//
// Each player has a bounded FIFO. A drain takes at most one action per player and returns the
// batch in global arrival order, so two players acting in the same tick resolve in the order
// their messages arrived.

use crate::domain::{Command, PlayerId, RejectReason};
use std::collections::{HashMap, VecDeque};

#[derive(Debug)]
pub struct CommandQueue {
    capacity: usize,
    next_seq: u64,
    queues: HashMap<PlayerId, VecDeque<(u64, Command)>>,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            queues: HashMap::new(),
        }
    }

    pub fn push(&mut self, player_id: PlayerId, command: Command) -> Result<(), RejectReason> {
        let queue = self.queues.entry(player_id).or_default();
        if queue.len() >= self.capacity {
            return Err(RejectReason::QueueFull);
        }
        queue.push_back((self.next_seq, command));
        self.next_seq += 1;
        Ok(())
    }

    /// Pops the head of every non-empty queue, ordered by arrival.
    pub fn drain_batch(&mut self) -> Vec<(PlayerId, Command)> {
        let mut batch: Vec<(u64, PlayerId, Command)> = Vec::with_capacity(self.queues.len());
        for (player_id, queue) in self.queues.iter_mut() {
            if let Some((seq, command)) = queue.pop_front() {
                batch.push((seq, *player_id, command));
            }
        }
        self.queues.retain(|_, queue| !queue.is_empty());
        batch.sort_by_key(|(seq, _, _)| *seq);
        batch
            .into_iter()
            .map(|(_, player_id, command)| (player_id, command))
            .collect()
    }

    pub fn remove_player(&mut self, player_id: PlayerId) {
        self.queues.remove(&player_id);
    }

    pub fn pending(&self, player_id: PlayerId) -> usize {
        self.queues.get(&player_id).map_or(0, VecDeque::len)
    }
}
