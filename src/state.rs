use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};

use crate::domain::{Commit, CommitAlert, DashboardSnapshot, StatEntry};

const TOAST_LIFETIME: Duration = Duration::from_secs(6);

/// Everything the dashboard renders, owned by the UI thread. Worker threads
/// never touch this directly; their results arrive as messages and are
/// applied here between frames.
pub struct DashboardState {
    pub commits: Vec<Commit>,
    pub stats: Vec<StatEntry>,
    pub version: String,
    pub phase: Phase,
    pub notifications_enabled: bool,
    pub last_synced: Option<DateTime<Utc>>,
    toasts: Vec<Toast>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Loading { error: Option<String> },
    Ready,
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub title: String,
    pub body: String,
    raised_at: Instant,
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            commits: Vec::new(),
            stats: Vec::new(),
            version: String::new(),
            phase: Phase::Loading { error: None },
            notifications_enabled: false,
            last_synced: None,
            toasts: Vec::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    pub fn load_error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Loading { error } => error.as_deref(),
            Phase::Ready => None,
        }
    }

    /// Commits the combined startup fetch in one step and leaves the loading
    /// phase behind.
    pub fn apply_snapshot(&mut self, snapshot: DashboardSnapshot) {
        self.commits = snapshot.commits;
        self.stats = snapshot.stats;
        self.version = snapshot.version;
        self.last_synced = Some(snapshot.fetched_at);
        self.phase = Phase::Ready;
    }

    /// Clears a previous failure before another startup attempt so the
    /// spinner shows again.
    pub fn begin_load(&mut self) {
        if self.is_loading() {
            self.phase = Phase::Loading { error: None };
        }
    }

    /// Records a failed startup fetch. The dashboard stays in the loading
    /// phase but shows the error and offers a retry instead of spinning
    /// forever.
    pub fn load_failed(&mut self, message: String) {
        if self.is_loading() {
            self.phase = Phase::Loading {
                error: Some(message),
            };
        }
    }

    /// Folds a freshly fetched commit list into the current one.
    ///
    /// Keeps every commit whose sha is not already held, preserving the
    /// fetched list's relative order, and prepends them (both lists are
    /// newest-first). Sole writer of the commit list once the dashboard is
    /// ready, which is what keeps shas unique. Absorbing an identical list
    /// is a no-op.
    pub fn absorb_commits(&mut self, fetched: Vec<Commit>) -> Option<CommitAlert> {
        let fresh: Vec<Commit> = {
            let seen: HashSet<&str> = self.commits.iter().map(|c| c.sha.as_str()).collect();
            fetched
                .into_iter()
                .filter(|c| !seen.contains(c.sha.as_str()))
                .collect()
        };

        if fresh.is_empty() {
            return None;
        }

        let alert = CommitAlert {
            new_count: fresh.len(),
        };
        self.commits.splice(0..0, fresh);
        self.last_synced = Some(Utc::now());
        Some(alert)
    }

    /// Diff-and-notify step for one poll cycle: absorb the fetched list and,
    /// when something new arrived and the user opted in, raise exactly one
    /// toast reporting the count.
    pub fn handle_poll(&mut self, fetched: Vec<Commit>) {
        if let Some(alert) = self.absorb_commits(fetched) {
            tracing::info!("{} new commit(s) picked up", alert.new_count);
            if self.notifications_enabled {
                self.raise_toast(CommitAlert::TITLE.to_owned(), alert.body());
            }
        }
    }

    pub fn enable_notifications(&mut self) {
        // In-app toasts need no platform capability, so opting in always
        // succeeds.
        self.notifications_enabled = true;
    }

    pub fn raise_toast(&mut self, title: String, body: String) {
        self.toasts.push(Toast {
            title,
            body,
            raised_at: Instant::now(),
        });
    }

    /// Live toasts, dropping any that outlived their display window.
    pub fn active_toasts(&mut self) -> &[Toast] {
        self.toasts
            .retain(|toast| toast.raised_at.elapsed() < TOAST_LIFETIME);
        &self.toasts
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn commit(sha: &str) -> Commit {
        Commit {
            sha: sha.to_owned(),
            message: format!("commit {sha}"),
            author: "dev".to_owned(),
            date: Utc::now(),
        }
    }

    fn ready_state(shas: &[&str]) -> DashboardState {
        let mut state = DashboardState::new();
        state.apply_snapshot(DashboardSnapshot {
            commits: shas.iter().map(|sha| commit(sha)).collect(),
            stats: Vec::new(),
            version: "1.0.0".to_owned(),
            fetched_at: Utc::now(),
        });
        state
    }

    fn shas(state: &DashboardState) -> Vec<&str> {
        state.commits.iter().map(|c| c.sha.as_str()).collect()
    }

    #[test]
    fn absorb_keeps_only_unseen_commits_in_fetched_order() {
        let mut state = ready_state(&["a", "b", "c"]);
        let alert = state.absorb_commits(vec![commit("y"), commit("b"), commit("x")]);

        assert_eq!(alert, Some(CommitAlert { new_count: 2 }));
        assert_eq!(shas(&state), ["y", "x", "a", "b", "c"]);
    }

    #[test]
    fn absorb_is_idempotent() {
        let mut state = ready_state(&["a", "b", "c"]);
        let again = state.commits.clone();

        assert_eq!(state.absorb_commits(again), None);
        assert_eq!(shas(&state), ["a", "b", "c"]);
    }

    #[test]
    fn absorb_preserves_sha_uniqueness() {
        let mut state = ready_state(&["a", "b", "c"]);
        state.absorb_commits(vec![commit("x"), commit("a"), commit("b"), commit("c")]);

        let mut unique: Vec<&str> = shas(&state);
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), state.commits.len());
    }

    #[test]
    fn snapshot_commits_all_results_and_clears_loading() {
        let mut state = DashboardState::new();
        assert!(state.is_loading());

        state.apply_snapshot(DashboardSnapshot {
            commits: vec![commit("a")],
            stats: Vec::new(),
            version: "3.2.1".to_owned(),
            fetched_at: Utc::now(),
        });

        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(state.version, "3.2.1");
        assert!(state.last_synced.is_some());
    }

    #[test]
    fn failed_load_surfaces_error_but_stays_loading() {
        let mut state = DashboardState::new();
        state.load_failed("request failed".to_owned());

        assert!(state.is_loading());
        assert_eq!(state.load_error(), Some("request failed"));
    }

    #[test]
    fn poll_raises_one_toast_when_opted_in() {
        let mut state = ready_state(&["a", "b", "c"]);
        state.enable_notifications();

        state.handle_poll(vec![commit("x"), commit("a"), commit("b"), commit("c")]);

        assert_eq!(shas(&state), ["x", "a", "b", "c"]);
        let toasts = state.active_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, CommitAlert::TITLE);
        assert_eq!(toasts[0].body, "1 new commit");
    }

    #[test]
    fn poll_stays_silent_when_opted_out() {
        let mut state = ready_state(&["a"]);
        state.handle_poll(vec![commit("x"), commit("a")]);

        assert_eq!(shas(&state), ["x", "a"]);
        assert!(state.active_toasts().is_empty());
    }

    #[test]
    fn poll_with_nothing_new_raises_nothing() {
        let mut state = ready_state(&["a", "b"]);
        state.enable_notifications();

        state.handle_poll(vec![commit("a"), commit("b")]);

        assert!(state.active_toasts().is_empty());
    }
}
