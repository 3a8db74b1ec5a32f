//! Lifecycle phases of a single resource

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a resource is in its lifecycle
///
/// ```text
/// Absent → Creating → Stabilizing → Present → Updating → Present → Deleting → Absent
/// ```
///
/// `Errored` is reachable from every transition. Only `Present` and
/// `Errored` are ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Absent,
    Creating,
    Stabilizing,
    Present,
    Updating,
    Deleting,
    Errored,
}

impl Phase {
    /// Check if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::{Absent, Creating, Deleting, Errored, Present, Stabilizing, Updating};

        if next == Errored {
            return true;
        }
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Stabilizing)
                | (Stabilizing, Present)
                | (Present, Updating | Deleting | Present | Absent)
                | (Updating, Present)
                | (Deleting, Absent)
                // Recovery: an errored record can be re-read, updated or deleted
                | (Errored, Present | Updating | Deleting | Absent)
                // Import lands directly in Present
                | (Absent, Present)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Absent => "absent",
            Phase::Creating => "creating",
            Phase::Stabilizing => "stabilizing",
            Phase::Present => "present",
            Phase::Updating => "updating",
            Phase::Deleting => "deleting",
            Phase::Errored => "errored",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the phase of one resource through a single operation
#[derive(Debug)]
pub(crate) struct Lifecycle {
    key: String,
    phase: Phase,
}

impl Lifecycle {
    pub(crate) fn new(key: impl Into<String>, phase: Phase) -> Self {
        Self {
            key: key.into(),
            phase,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn rekey(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub(crate) fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {} for {}",
            self.phase,
            next,
            self.key
        );
        log::trace!("{}: {} -> {}", self.key, self.phase, next);
        self.phase = next;
    }
}
