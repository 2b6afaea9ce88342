/// Job state definitions for tracking crawl progress
///
/// This module defines all states a crawl job can be in and the legal moves
/// between them.
use std::fmt;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    // ===== Active States =====
    /// Job has been built from a target and destination but not started
    Created,

    /// Job is fetching the base page to resolve the page count
    PaginationResolving,

    /// Job is walking pages and items
    PageIterating,

    // ===== Terminal States =====
    /// Job walked every page and flushed its index batch
    Completed,

    /// Page count could not be resolved, or the output could not be written
    Failed,
}

impl JobState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// `Failed` is reachable from `PaginationResolving` and, when the job
    /// directory or index batch cannot be written, from `PageIterating`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::PaginationResolving)
                | (Self::PaginationResolving, Self::PageIterating)
                | (Self::PaginationResolving, Self::Failed)
                | (Self::PageIterating, Self::Completed)
                | (Self::PageIterating, Self::Failed)
        )
    }

    /// Returns a stable lowercase name for logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::PaginationResolving => "pagination_resolving",
            Self::PageIterating => "page_iterating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::Created
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [JobState; 5] = [
        JobState::Created,
        JobState::PaginationResolving,
        JobState::PageIterating,
        JobState::Completed,
        JobState::Failed,
    ];

    #[test]
    fn test_is_terminal() {
        assert!(!JobState::Created.is_terminal());
        assert!(!JobState::PaginationResolving.is_terminal());
        assert!(!JobState::PageIterating.is_terminal());

        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_is_success() {
        assert!(JobState::Completed.is_success());
        assert!(!JobState::Failed.is_success());
        assert!(!JobState::PageIterating.is_success());
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(JobState::Created.can_transition_to(JobState::PaginationResolving));
        assert!(JobState::PaginationResolving.can_transition_to(JobState::PageIterating));
        assert!(JobState::PageIterating.can_transition_to(JobState::Completed));
    }

    #[test]
    fn test_failed_only_from_running_states() {
        assert!(JobState::PaginationResolving.can_transition_to(JobState::Failed));
        assert!(JobState::PageIterating.can_transition_to(JobState::Failed));

        assert!(!JobState::Created.can_transition_to(JobState::Failed));
        assert!(!JobState::Completed.can_transition_to(JobState::Failed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [JobState::Completed, JobState::Failed] {
            for next in ALL_STATES {
                assert!(
                    !terminal.can_transition_to(next),
                    "{:?} should not move to {:?}",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_no_skipping_pagination() {
        assert!(!JobState::Created.can_transition_to(JobState::PageIterating));
        assert!(!JobState::Created.can_transition_to(JobState::Completed));
        assert!(!JobState::PaginationResolving.can_transition_to(JobState::Completed));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", JobState::Created), "created");
        assert_eq!(format!("{}", JobState::PageIterating), "page_iterating");
        assert_eq!(format!("{}", JobState::Failed), "failed");
    }
}
