//! Timer table: at most one armed timer per proposal
//!
//! Each proposal ID maps to one slot. A slot is stamped with a generation so
//! that a timer task can only act on the slot it was armed with; a stray
//! task from a cancelled or replaced slot finds its generation gone and stops.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Result of arming a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// A new timer was scheduled
    Armed,
    /// A timer for this proposal already exists; nothing was scheduled
    AlreadyArmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Evaluating,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    phase: Phase,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct TableState {
    next_generation: u64,
    slots: HashMap<String, Slot>,
}

impl TableState {
    fn fresh_slot(&mut self) -> Slot {
        self.next_generation += 1;
        Slot {
            generation: self.next_generation,
            phase: Phase::Waiting,
            handle: None,
        }
    }
}

/// Armed timers keyed by proposal ID
#[derive(Debug, Default)]
pub struct TimerTable {
    state: Mutex<TableState>,
}

impl TimerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a slot for `id`, returning its generation
    ///
    /// Returns `None` when the proposal already has a slot.
    pub async fn reserve(&self, id: &str) -> Option<u64> {
        let mut state = self.state.lock().await;
        if state.slots.contains_key(id) {
            debug!(%id, "reserve: already armed");
            return None;
        }
        let slot = state.fresh_slot();
        let generation = slot.generation;
        state.slots.insert(id.to_string(), slot);
        debug!(%id, generation, "reserve: slot claimed");
        Some(generation)
    }

    /// Record the task driving a slot
    ///
    /// If the slot was cancelled or replaced meanwhile, the task is aborted.
    pub async fn attach(&self, id: &str, generation: u64, handle: JoinHandle<()>) {
        let mut state = self.state.lock().await;
        match state.slots.get_mut(id) {
            Some(slot) if slot.generation == generation => slot.handle = Some(handle),
            _ => {
                debug!(%id, generation, "attach: slot gone, aborting task");
                handle.abort();
            }
        }
    }

    /// Mark a slot as evaluating; false if the slot is no longer this generation's
    pub async fn begin_evaluation(&self, id: &str, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        match state.slots.get_mut(id) {
            Some(slot) if slot.generation == generation && slot.phase == Phase::Waiting => {
                slot.phase = Phase::Evaluating;
                true
            }
            _ => {
                debug!(%id, generation, "begin_evaluation: stale timer");
                false
            }
        }
    }

    /// Replace an evaluating slot with a fresh waiting one, returning the new generation
    pub async fn rearm(&self, id: &str, generation: u64) -> Option<u64> {
        let mut state = self.state.lock().await;
        let current = state.slots.get(id).map(|s| s.generation);
        if current != Some(generation) {
            debug!(%id, generation, "rearm: slot gone");
            return None;
        }
        let slot = state.fresh_slot();
        let next = slot.generation;
        // The old handle belongs to the task calling us; drop it without aborting.
        state.slots.insert(id.to_string(), slot);
        debug!(%id, generation, next, "rearm: slot renewed");
        Some(next)
    }

    /// Free a slot after its evaluation finished
    pub async fn release(&self, id: &str, generation: u64) {
        let mut state = self.state.lock().await;
        if state.slots.get(id).is_some_and(|s| s.generation == generation) {
            state.slots.remove(id);
            debug!(%id, generation, "release: slot freed");
        }
    }

    /// Cancel a proposal's timer; true if one was armed
    pub async fn cancel(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.slots.remove(id) {
            Some(slot) => {
                debug!(%id, generation = slot.generation, "cancel: aborting timer");
                if let Some(handle) = slot.handle {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Whether `id` has a slot
    pub async fn is_armed(&self, id: &str) -> bool {
        self.state.lock().await.slots.contains_key(id)
    }

    /// IDs with a slot, sorted
    pub async fn armed_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state.slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Abort every timer, returning how many were armed
    pub async fn shutdown(&self) -> usize {
        let mut state = self.state.lock().await;
        let count = state.slots.len();
        for (id, slot) in state.slots.drain() {
            debug!(%id, "shutdown: aborting timer");
            if let Some(handle) = slot.handle {
                handle.abort();
            }
        }
        count
    }
}
