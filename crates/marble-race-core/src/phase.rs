//! Run lifecycle state machine.
//!
//! A run moves `Ready -> Playing -> Ended` and back to `Ready` on restart.
//! Illegal transitions are no-ops: duplicate triggers (several keys pressed in
//! the same tick, a UI button racing a keypress) must be harmless.

use std::fmt;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Current phase of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Waiting for the first input.
    #[default]
    Ready,
    /// The run is in progress and the timer is live.
    Playing,
    /// The finish line was crossed; the timer is frozen.
    Ended,
}

/// A request to change phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEvent {
    Start,
    Restart,
    End,
}

/// Record of a transition that actually happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseChange {
    pub from: RunPhase,
    pub to: RunPhase,
    pub event: PhaseEvent,
    /// Simulation time of the transition, in seconds.
    pub at: f64,
    /// Level seed in effect after the transition.
    pub seed: u64,
}

impl PhaseChange {
    /// Returns true if the seed changed with this transition.
    pub fn reseeded(&self) -> bool {
        self.event == PhaseEvent::Restart
    }
}

/// Start and end timestamps of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunClock {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

/// Handle returned by [`RunPhaseMachine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&PhaseChange)>;

/// Owns the run phase, its clock and the level seed.
pub struct RunPhaseMachine {
    phase: RunPhase,
    clock: RunClock,
    level_seed: u64,
    seed_rng: ChaCha8Rng,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl fmt::Debug for RunPhaseMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPhaseMachine")
            .field("phase", &self.phase)
            .field("clock", &self.clock)
            .field("level_seed", &self.level_seed)
            .field("listener_count", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl RunPhaseMachine {
    /// Creates a machine in `Ready` whose first level uses `seed`.
    ///
    /// Seeds drawn on later restarts come from a generator keyed on the same
    /// value, so a whole session replays identically.
    pub fn new(seed: u64) -> Self {
        Self {
            phase: RunPhase::Ready,
            clock: RunClock::default(),
            level_seed: seed,
            seed_rng: ChaCha8Rng::seed_from_u64(seed),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn clock(&self) -> RunClock {
        self.clock
    }

    /// Seed of the level for the current run.
    pub fn level_seed(&self) -> u64 {
        self.level_seed
    }

    /// `Ready -> Playing`. Records the start time.
    pub fn start(&mut self, now: f64) -> Option<PhaseChange> {
        if self.phase != RunPhase::Ready {
            return None;
        }
        self.clock.start_time = Some(now);
        self.clock.end_time = None;
        Some(self.transition(RunPhase::Playing, PhaseEvent::Start, now))
    }

    /// `Playing | Ended -> Ready`. Clears the clock and draws a new level seed.
    pub fn restart(&mut self, now: f64) -> Option<PhaseChange> {
        if self.phase == RunPhase::Ready {
            return None;
        }
        self.clock = RunClock::default();
        self.level_seed = self.seed_rng.random();
        Some(self.transition(RunPhase::Ready, PhaseEvent::Restart, now))
    }

    /// `Playing -> Ended`. Records the end time.
    pub fn end(&mut self, now: f64) -> Option<PhaseChange> {
        if self.phase != RunPhase::Playing {
            return None;
        }
        self.clock.end_time = Some(now);
        Some(self.transition(RunPhase::Ended, PhaseEvent::End, now))
    }

    /// Dispatches `event` to the matching transition.
    pub fn apply(&mut self, event: PhaseEvent, now: f64) -> Option<PhaseChange> {
        match event {
            PhaseEvent::Start => self.start(now),
            PhaseEvent::Restart => self.restart(now),
            PhaseEvent::End => self.end(now),
        }
    }

    /// Seconds elapsed in the current run.
    ///
    /// Zero while `Ready`, live while `Playing`, frozen once `Ended`.
    pub fn elapsed(&self, now: f64) -> f64 {
        let elapsed = match (self.phase, self.clock.start_time, self.clock.end_time) {
            (RunPhase::Playing, Some(start), _) => now - start,
            (RunPhase::Ended, Some(start), Some(end)) => end - start,
            _ => 0.0,
        };
        elapsed.max(0.0)
    }

    /// Registers a listener called synchronously on every transition.
    pub fn subscribe(&mut self, listener: impl FnMut(&PhaseChange) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn transition(&mut self, to: RunPhase, event: PhaseEvent, now: f64) -> PhaseChange {
        let change = PhaseChange {
            from: self.phase,
            to,
            event,
            at: now,
            seed: self.level_seed,
        };
        self.phase = to;

        tracing::debug!(
            from = ?change.from,
            to = ?change.to,
            at = change.at,
            seed = change.seed,
            "run phase changed"
        );

        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
        change
    }
}

/// Formats a run time the way the HUD shows it.
pub fn format_elapsed(seconds: f64) -> String {
    format!("{seconds:.2}")
}
