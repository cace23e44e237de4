use std::thread;

use chrono::{DateTime, Utc};
use reqwest::{
    blocking::Client,
    header::{ACCEPT, USER_AGENT},
};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{Commit, DashboardSnapshot, StatEntry, StatWindow};

const GH_COMMITS: &str = "https://api.github.com/repos/Neko-CLI/Neko-CLI/commits";
const NPM_DOWNLOADS: &str = "https://api.npmjs.org/downloads/point";
const NPM_LATEST: &str = "https://registry.npmjs.org/neko-cli/latest";
const LOGO_URL: &str = "https://i.imgur.com/eKHNd3C.png";
const PACKAGE_NAME: &str = "neko-cli";
const USER_AGENT_HEADER: &str = "neko-dash/0.1";

pub const VERSION_UNKNOWN: &str = "unknown";

pub fn build_client() -> Result<Client, FeedError> {
    Client::builder()
        .user_agent(USER_AGENT_HEADER)
        .build()
        .map_err(FeedError::Http)
}

/// Latest commits on the upstream repository, in server order (newest first).
pub fn fetch_commits(client: &Client) -> Result<Vec<Commit>, FeedError> {
    let body = get_bytes(client, GH_COMMITS)?;
    decode_commits(&body)
}

/// Download counts for all four reporting windows.
///
/// The batch is atomic: a failure on any window aborts the whole fetch and
/// the caller keeps whatever stats it already holds.
pub fn fetch_stats(client: &Client) -> Result<Vec<StatEntry>, FeedError> {
    collect_stats(|window| fetch_window(client, window))
}

/// Latest published version of the package, or "unknown" when the registry
/// document is missing the field or cannot be fetched at all. Version lookup
/// is best-effort and never fails the surrounding load.
pub fn fetch_version(client: &Client) -> String {
    match get_bytes(client, NPM_LATEST) {
        Ok(body) => extract_version(&body),
        Err(err) => {
            tracing::warn!("version lookup failed: {err}");
            VERSION_UNKNOWN.to_owned()
        }
    }
}

/// Combined startup fetch. The three requests run concurrently and the
/// snapshot is assembled only once all of them have come back.
pub fn fetch_dashboard(client: &Client) -> Result<DashboardSnapshot, FeedError> {
    thread::scope(|scope| {
        let stats = scope.spawn(|| fetch_stats(client));
        let version = scope.spawn(|| fetch_version(client));

        let commits = fetch_commits(client)?;
        let stats = stats.join().map_err(|_| FeedError::WorkerGone)??;
        let version = version.join().map_err(|_| FeedError::WorkerGone)?;

        Ok(DashboardSnapshot {
            commits,
            stats,
            version,
            fetched_at: Utc::now(),
        })
    })
}

/// Raw bytes of the project logo, decoded by the UI layer.
pub fn fetch_logo(client: &Client) -> Result<Vec<u8>, FeedError> {
    get_bytes(client, LOGO_URL)
}

fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FeedError> {
    let response = client
        .get(url)
        .header(USER_AGENT, USER_AGENT_HEADER)
        .header(ACCEPT, "application/json")
        .send()?
        .error_for_status()?;
    Ok(response.bytes()?.to_vec())
}

fn fetch_window(client: &Client, window: StatWindow) -> Result<u64, FeedError> {
    let url = format!("{NPM_DOWNLOADS}/{}/{PACKAGE_NAME}", window.api_token());
    let body = get_bytes(client, &url)?;
    decode_downloads(&body)
}

/// Assembles the four entries in `StatWindow::ALL` order, whatever order the
/// individual lookups complete in.
fn collect_stats(
    mut lookup: impl FnMut(StatWindow) -> Result<u64, FeedError>,
) -> Result<Vec<StatEntry>, FeedError> {
    StatWindow::ALL
        .iter()
        .map(|&window| {
            Ok(StatEntry {
                window,
                downloads: lookup(window)?,
            })
        })
        .collect()
}

fn decode_commits(body: &[u8]) -> Result<Vec<Commit>, FeedError> {
    let response: Vec<CommitResponse> = serde_json::from_slice(body)?;
    Ok(response
        .into_iter()
        .map(|item| Commit {
            sha: item.sha,
            message: item.commit.message,
            author: item.commit.author.name,
            date: item.commit.author.date,
        })
        .collect())
}

fn decode_downloads(body: &[u8]) -> Result<u64, FeedError> {
    let point: DownloadPoint = serde_json::from_slice(body)?;
    Ok(point.downloads)
}

fn extract_version(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|doc| Some(doc.get("version")?.as_str()?.to_owned()))
        .unwrap_or_else(|| VERSION_UNKNOWN.to_owned())
}

pub type LoadOutcome = Result<DashboardSnapshot, FeedError>;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("background worker disconnected before returning a result")]
    WorkerGone,
}

// Response payloads ---------------------------------------------------------

// The commit feed nests author details two levels deep; the flat `Commit`
// domain type is what the rest of the app sees.
#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitBody,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
    author: CommitAuthor,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct DownloadPoint {
    downloads: u64,
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const COMMIT_FEED: &str = r#"[
        {
            "sha": "d670460b4b4aece5915caf5c68d12f560a9fe3e4",
            "commit": {
                "message": "Fix dependency resolution",
                "author": {
                    "name": "StrayVibes",
                    "date": "2025-07-08T10:15:00Z"
                }
            }
        },
        {
            "sha": "7638417db6d59f3c431d3e1f261cc637155684cd",
            "commit": {
                "message": "Bump lockfile parser",
                "author": {
                    "name": "StrayVibes",
                    "date": "2025-07-07T22:01:30Z"
                }
            }
        }
    ]"#;

    #[test]
    fn decode_commits_flattens_nested_payload() {
        let commits = decode_commits(COMMIT_FEED.as_bytes()).expect("decodes");
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "d670460b4b4aece5915caf5c68d12f560a9fe3e4");
        assert_eq!(commits[0].message, "Fix dependency resolution");
        assert_eq!(commits[0].author, "StrayVibes");
        assert_eq!(commits[0].short_sha(), "d670460");
    }

    #[test]
    fn decode_commits_rejects_shape_mismatch() {
        let result = decode_commits(br#"{"not": "an array"}"#);
        assert!(matches!(result, Err(FeedError::Decode(_))));
    }

    #[test]
    fn decode_downloads_reads_count() {
        let count = decode_downloads(br#"{"downloads": 1234}"#).expect("decodes");
        assert_eq!(count, 1234);
    }

    #[test]
    fn decode_downloads_rejects_negative_count() {
        assert!(matches!(
            decode_downloads(br#"{"downloads": -3}"#),
            Err(FeedError::Decode(_))
        ));
    }

    #[test]
    fn extract_version_reads_field() {
        assert_eq!(extract_version(br#"{"version": "2.1.0"}"#), "2.1.0");
    }

    #[test]
    fn extract_version_defaults_on_empty_document() {
        assert_eq!(extract_version(b"{}"), VERSION_UNKNOWN);
    }

    #[test]
    fn extract_version_defaults_on_malformed_body() {
        assert_eq!(extract_version(b"not json"), VERSION_UNKNOWN);
        assert_eq!(extract_version(br#"{"version": 7}"#), VERSION_UNKNOWN);
    }

    #[test]
    fn stats_come_back_in_fixed_window_order() {
        let entries = collect_stats(|window| {
            Ok(match window {
                StatWindow::Day => 10,
                StatWindow::Week => 70,
                StatWindow::Month => 300,
                StatWindow::Year => 3650,
            })
        })
        .expect("all windows resolve");

        let labels: Vec<_> = entries.iter().map(|e| e.window.label()).collect();
        assert_eq!(labels, ["day", "week", "month", "year"]);
        assert_eq!(entries[2].downloads, 300);
    }

    #[test]
    fn stats_batch_fails_atomically() {
        let result = collect_stats(|window| match window {
            StatWindow::Month => decode_downloads(b"oops"),
            _ => Ok(1),
        });
        assert!(matches!(result, Err(FeedError::Decode(_))));
    }
}
