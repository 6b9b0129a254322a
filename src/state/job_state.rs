/// Job lifecycle definitions
///
/// A scrape job moves PENDING -> RUNNING -> {COMPLETED, FAILED} and never
/// leaves a terminal state.
use std::fmt;

/// Which sub-pipelines a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    /// Entity refresh followed by content refresh
    Full,

    /// Listing pagination and detail pages only
    EntitiesOnly,

    /// Sitemap discovery and content pages only
    ContentOnly,
}

impl JobType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::EntitiesOnly => "entities_only",
            Self::ContentOnly => "content_only",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "entities_only" => Some(Self::EntitiesOnly),
            "content_only" => Some(Self::ContentOnly),
            _ => None,
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Full, Self::EntitiesOnly, Self::ContentOnly]
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Status of a scrape job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true for COMPLETED and FAILED
    ///
    /// `completed_at` is set exactly when a job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
