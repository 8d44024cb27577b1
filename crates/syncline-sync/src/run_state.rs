//! Per-tenant run phases.

use std::fmt;

use crate::error::{Result, SyncError};

/// Phase of one tenant run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    TokenLoading,
    TokenRefreshing,
    Fetching,
    Reconciling,
    Done,
    Failed,
}

impl RunPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::TokenLoading => "token_loading",
            RunPhase::TokenRefreshing => "token_refreshing",
            RunPhase::Fetching => "fetching",
            RunPhase::Reconciling => "reconciling",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    /// Legal forward edges. `Idle -> Reconciling` is the webhook ingest path,
    /// which has no token or fetch phase.
    #[must_use]
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, TokenLoading | Reconciling) => true,
            (TokenLoading, TokenRefreshing | Fetching) => true,
            (TokenRefreshing, Fetching) => true,
            (Fetching, Reconciling) => true,
            (Reconciling, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current phase and refuses illegal moves.
#[derive(Debug, Clone)]
pub struct RunState {
    phase: RunPhase,
    history: Vec<RunPhase>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            history: vec![RunPhase::Idle],
        }
    }
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Phases visited so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[RunPhase] {
        &self.history
    }

    pub fn transition(&mut self, next: RunPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(SyncError::invalid_state_transition(
                self.phase.as_str(),
                next.as_str(),
            ));
        }
        self.phase = next;
        self.history.push(next);
        Ok(())
    }
}
