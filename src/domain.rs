use chrono::{DateTime, Utc};

// Domain data structures shared across modules.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl Commit {
    /// Abbreviated identifier shown in the commit table.
    pub fn short_sha(&self) -> &str {
        let end = self
            .sha
            .char_indices()
            .nth(7)
            .map_or(self.sha.len(), |(idx, _)| idx);
        &self.sha[..end]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatWindow {
    Day,
    Week,
    Month,
    Year,
}

impl StatWindow {
    /// Fixed reporting order; chart bars and fetches both follow it.
    pub const ALL: [StatWindow; 4] = [
        StatWindow::Day,
        StatWindow::Week,
        StatWindow::Month,
        StatWindow::Year,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StatWindow::Day => "day",
            StatWindow::Week => "week",
            StatWindow::Month => "month",
            StatWindow::Year => "year",
        }
    }

    /// Token the downloads endpoint expects in its path.
    pub fn api_token(&self) -> &'static str {
        match self {
            StatWindow::Day => "last-day",
            StatWindow::Week => "last-week",
            StatWindow::Month => "last-month",
            StatWindow::Year => "last-year",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatEntry {
    pub window: StatWindow,
    pub downloads: u64,
}

/// Result of the combined startup fetch: everything the dashboard renders.
#[derive(Clone, Debug)]
pub struct DashboardSnapshot {
    pub commits: Vec<Commit>,
    pub stats: Vec<StatEntry>,
    pub version: String,
    pub fetched_at: DateTime<Utc>,
}

/// Raised when a poll cycle brings in commits not seen before.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitAlert {
    pub new_count: usize,
}

impl CommitAlert {
    pub const TITLE: &'static str = "New commits available!";

    pub fn body(&self) -> String {
        if self.new_count == 1 {
            "1 new commit".to_owned()
        } else {
            format!("{} new commits", self.new_count)
        }
    }
}
