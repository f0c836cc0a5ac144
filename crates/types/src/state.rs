//! Orchestrator run states

use serde::{Deserialize, Serialize};
use std::fmt;

/// States of one engine run.
///
/// `Recovering → Resolving → Planning → Executing → Cleaning → Done`,
/// with `Failed` reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Recovering,
    Resolving,
    Planning,
    Executing,
    Cleaning,
    Done,
    Failed,
}

impl SyncState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `next` follows the run order
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if next == Self::Failed {
            return !self.is_terminal();
        }
        !self.is_terminal() && next.rank() > self.rank()
    }

    fn rank(self) -> u8 {
        match self {
            Self::Recovering => 0,
            Self::Resolving => 1,
            Self::Planning => 2,
            Self::Executing => 3,
            Self::Cleaning => 4,
            Self::Done | Self::Failed => 5,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Recovering => "recovering",
            Self::Resolving => "resolving",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Cleaning => "cleaning",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
