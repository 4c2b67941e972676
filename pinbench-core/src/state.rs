// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-run phase machine with typed transitions.
//!
//! Implements the run lifecycle:
//! Configured → Isolated → WarmingUp → Measuring → Aggregated → Reported → Released.
//! `Isolated` is skipped when no core is pinned. Any live phase may jump to
//! `Released` so an aborted run still ends in the terminal phase.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;

/// Run lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Benchmark accepted, nothing touched yet.
    Configured,

    /// Thread pinned, real-time priority and governor applied.
    Isolated,

    /// Running unmeasured iterations.
    WarmingUp,

    /// Running the timed loop.
    Measuring,

    /// Samples reduced to statistics.
    Aggregated,

    /// Result handed back to the caller.
    Reported,

    /// Terminal: isolation and counters have been given back.
    Released,
}

impl RunPhase {
    /// Get the phase name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configured => "Configured",
            Self::Isolated => "Isolated",
            Self::WarmingUp => "WarmingUp",
            Self::Measuring => "Measuring",
            Self::Aggregated => "Aggregated",
            Self::Reported => "Reported",
            Self::Released => "Released",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Check if transition to the target phase is valid.
    pub fn can_transition_to(&self, target: RunPhase) -> bool {
        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, target),
            (Self::Configured, Self::Isolated)
                | (Self::Configured, Self::WarmingUp)
                | (Self::Isolated, Self::WarmingUp)
                | (Self::WarmingUp, Self::Measuring)
                | (Self::Measuring, Self::Aggregated)
                | (Self::Aggregated, Self::Reported)
                | (_, Self::Released)
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Phase tracker for one benchmark run.
#[derive(Debug)]
pub struct RunStateMachine {
    benchmark: String,
    current: RunPhase,
    entered_at: Instant,
    history: Vec<(RunPhase, Duration)>,
}

impl RunStateMachine {
    pub fn new(benchmark: impl Into<String>) -> Self {
        Self {
            benchmark: benchmark.into(),
            current: RunPhase::Configured,
            entered_at: Instant::now(),
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.current
    }

    /// Phases already left, with the time spent in each.
    pub fn history(&self) -> &[(RunPhase, Duration)] {
        &self.history
    }

    /// Attempt to move to `target`.
    pub fn transition_to(&mut self, target: RunPhase) -> Result<(), StateTransitionError> {
        if self.current.is_terminal() {
            return Err(StateTransitionError::TerminalPhase {
                benchmark: self.benchmark.clone(),
                phase: self.current.name(),
            });
        }

        if !self.current.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                benchmark: self.benchmark.clone(),
                from: self.current.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            benchmark = %self.benchmark,
            from = self.current.name(),
            to = target.name(),
            "Run phase transition"
        );

        self.history.push((self.current, self.entered_at.elapsed()));
        self.current = target;
        self.entered_at = Instant::now();

        Ok(())
    }
}
