/// Work item state definitions for tracking crawl progress
///
/// This module defines all possible states a work item can be in, and which
/// transitions between them are legal.
use std::fmt;

/// Represents the current state of a URL in the work store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Item is waiting to be picked up by the scheduler
    Queued,

    /// Item has been claimed by the scheduler and handed to the executor
    Dispatched,

    /// Item's fetch is actively running
    InProgress,

    /// Item was fetched and its fields extracted successfully
    Done,

    /// Item's fetch failed terminally; requires operator requeue to retry
    Failed,
}

impl ItemState {
    /// Returns true if the item currently occupies a concurrency slot
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Dispatched | Self::InProgress)
    }

    /// Returns true if no further processing will happen without operator action
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if a transition from `self` to `to` is legal
    ///
    /// Per-attempt edges: queued → dispatched → in_progress → {done, failed,
    /// queued}. Additionally, stop() reconciles dispatched back to queued, and
    /// operator requeue cycles done/failed back to queued for a full re-scrape.
    pub fn can_transition(&self, to: ItemState) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Dispatched)
                | (Self::Dispatched, Self::InProgress)
                | (Self::Dispatched, Self::Queued)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::Failed)
                | (Self::InProgress, Self::Queued)
                | (Self::Done, Self::Queued)
                | (Self::Failed, Self::Queued)
        )
    }

    /// Converts the item state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatched => "dispatched",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses an item state from its database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "dispatched" => Some(Self::Dispatched),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible item states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Dispatched,
            Self::InProgress,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl serde::Serialize for ItemState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_db_string())
    }
}
