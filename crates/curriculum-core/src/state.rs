use crate::error::{CurriculumError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ScopePhase
// ---------------------------------------------------------------------------

/// Lifecycle of one ordered scope inside the editor.
///
/// ```text
/// Idle → Dragging → OptimisticallyApplied → Persisting → Idle
///                                                      ↘ RollingBack → Idle
/// ```
///
/// Gestures stay live while a save is outstanding, so `Dragging` and
/// `OptimisticallyApplied` may also be entered from `Persisting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePhase {
    Idle,
    Dragging,
    OptimisticallyApplied,
    Persisting,
    RollingBack,
}

impl ScopePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopePhase::Idle => "idle",
            ScopePhase::Dragging => "dragging",
            ScopePhase::OptimisticallyApplied => "optimistically_applied",
            ScopePhase::Persisting => "persisting",
            ScopePhase::RollingBack => "rolling_back",
        }
    }

    pub fn can_transition_to(self, to: ScopePhase) -> bool {
        use ScopePhase::*;
        matches!(
            (self, to),
            (Idle, Dragging)
                | (Idle, OptimisticallyApplied)
                | (Dragging, Idle)
                | (Dragging, OptimisticallyApplied)
                | (Dragging, Persisting)
                | (OptimisticallyApplied, Dragging)
                | (OptimisticallyApplied, OptimisticallyApplied)
                | (OptimisticallyApplied, Persisting)
                | (OptimisticallyApplied, Idle)
                | (Persisting, Dragging)
                | (Persisting, OptimisticallyApplied)
                | (Persisting, Persisting)
                | (Persisting, Idle)
                | (Persisting, RollingBack)
                | (RollingBack, Idle)
        )
    }

    pub fn transition(self, to: ScopePhase) -> Result<ScopePhase> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CurriculumError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
                reason: "not a scope editor transition".into(),
            })
        }
    }
}

impl fmt::Display for ScopePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// UploadPhase
// ---------------------------------------------------------------------------

/// Lifecycle of one upload job.
///
/// Only `Idle` and the three terminal phases have no network call pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Idle,
    Preparing,
    Transferring,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl UploadPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadPhase::Idle => "idle",
            UploadPhase::Preparing => "preparing",
            UploadPhase::Transferring => "transferring",
            UploadPhase::Finalizing => "finalizing",
            UploadPhase::Completed => "completed",
            UploadPhase::Cancelled => "cancelled",
            UploadPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadPhase::Completed | UploadPhase::Cancelled | UploadPhase::Failed
        )
    }

    pub fn has_pending_io(self) -> bool {
        !(self == UploadPhase::Idle || self.is_terminal())
    }

    pub fn can_transition_to(self, to: UploadPhase) -> bool {
        use UploadPhase::*;
        matches!(
            (self, to),
            (Idle, Preparing)
                | (Preparing, Transferring)
                | (Preparing, Cancelled)
                | (Preparing, Failed)
                | (Transferring, Finalizing)
                | (Transferring, Cancelled)
                | (Transferring, Failed)
                | (Finalizing, Completed)
                | (Finalizing, Failed)
        )
    }

    pub fn transition(self, to: UploadPhase) -> Result<UploadPhase> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CurriculumError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
                reason: "not an upload job transition".into(),
            })
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
