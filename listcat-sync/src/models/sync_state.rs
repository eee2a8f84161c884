//! Sync run state machine
//!
//! `Idle → Running → Committing → Idle`, with `Failed → Idle` on error. All
//! changes go through [`SyncGate::transition`]; a trigger that finds the gate
//! anywhere but `Idle` is dropped, not queued.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Sync engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Running,
    Committing,
    Failed,
}

impl SyncPhase {
    fn can_transition_to(self, next: SyncPhase) -> bool {
        matches!(
            (self, next),
            (SyncPhase::Idle, SyncPhase::Running)
                | (SyncPhase::Running, SyncPhase::Committing)
                | (SyncPhase::Running, SyncPhase::Failed)
                | (SyncPhase::Committing, SyncPhase::Idle)
                | (SyncPhase::Committing, SyncPhase::Failed)
                | (SyncPhase::Failed, SyncPhase::Idle)
        )
    }
}

/// Single-flight guard around the sync phase
#[derive(Debug, Clone)]
pub struct SyncGate {
    phase: Arc<Mutex<SyncPhase>>,
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncGate {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(Mutex::new(SyncPhase::Idle)),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The one transition function; returns false for an illegal edge
    pub fn transition(&self, next: SyncPhase) -> bool {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if phase.can_transition_to(next) {
            debug!(from = ?*phase, to = ?next, "Sync phase transition");
            *phase = next;
            true
        } else {
            false
        }
    }

    /// Enter `Running` if idle; `None` means a run is already active
    pub fn try_begin(&self) -> Option<RunGuard> {
        if self.transition(SyncPhase::Running) {
            Some(RunGuard {
                gate: self.clone(),
                finished: false,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase(), SyncPhase::Running | SyncPhase::Committing)
    }
}

/// Held for the duration of one run
///
/// Dropping the guard without `complete()`/`fail()` (early return, panic)
/// routes the gate through `Failed` back to `Idle`.
#[derive(Debug)]
pub struct RunGuard {
    gate: SyncGate,
    finished: bool,
}

impl RunGuard {
    pub fn enter_commit(&self) -> bool {
        self.gate.transition(SyncPhase::Committing)
    }

    pub fn complete(mut self) {
        self.finished = true;
        if !self.gate.transition(SyncPhase::Idle) {
            warn!(phase = ?self.gate.phase(), "Run completed outside commit phase");
            self.gate.transition(SyncPhase::Failed);
            self.gate.transition(SyncPhase::Idle);
        }
    }

    pub fn fail(mut self) {
        self.finished = true;
        self.gate.transition(SyncPhase::Failed);
        self.gate.transition(SyncPhase::Idle);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.gate.transition(SyncPhase::Failed);
            self.gate.transition(SyncPhase::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let gate = SyncGate::new();
        let guard = gate.try_begin().expect("idle gate");
        assert_eq!(gate.phase(), SyncPhase::Running);
        assert!(gate.try_begin().is_none());
        guard.fail();
        assert_eq!(gate.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_commit_path() {
        let gate = SyncGate::new();
        let guard = gate.try_begin().unwrap();
        assert!(guard.enter_commit());
        assert_eq!(gate.phase(), SyncPhase::Committing);
        assert!(gate.try_begin().is_none());
        guard.complete();
        assert_eq!(gate.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_dropped_guard_returns_to_idle() {
        let gate = SyncGate::new();
        {
            let _guard = gate.try_begin().unwrap();
        }
        assert_eq!(gate.phase(), SyncPhase::Idle);
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let gate = SyncGate::new();
        assert!(!gate.transition(SyncPhase::Committing));
        assert!(!gate.transition(SyncPhase::Failed));
        assert_eq!(gate.phase(), SyncPhase::Idle);
    }
}
