/// Job state definitions for the scrape lifecycle
///
/// This module defines every state a scrape job passes through and the
/// transitions allowed between them.
use std::fmt;

/// Represents the current state of a scrape job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    // ===== Active States =====
    /// Job has been created but not started
    #[default]
    Idle,

    /// Page count and offer count are being resolved
    Resolving,

    /// Pages are being fetched by the worker pool
    Fetching,

    /// Per-page results are being concatenated
    Merging,

    // ===== Terminal States =====
    /// Job finished; failed pages, if any, are part of the report
    Done,

    /// Job aborted by a resolution failure or cancellation
    Failed,
}

impl JobState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the job is running
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Resolving | Self::Fetching | Self::Merging)
    }

    /// Returns true if a transition from `self` to `next` is allowed
    ///
    /// | From | To |
    /// |------|----|
    /// | Idle | Resolving |
    /// | Resolving | Fetching, Failed |
    /// | Fetching | Merging, Failed |
    /// | Merging | Done |
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Resolving)
                | (Self::Resolving, Self::Fetching)
                | (Self::Resolving, Self::Failed)
                | (Self::Fetching, Self::Merging)
                | (Self::Fetching, Self::Failed)
                | (Self::Merging, Self::Done)
        )
    }

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Resolving,
            Self::Fetching,
            Self::Merging,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
