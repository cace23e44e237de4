use chrono::{DateTime, Utc};

/// Human-relative rendering of a commit timestamp ("3h ago").
///
/// Timestamps in the future clamp to "moments ago"; clock skew between the
/// feed and the local machine is not worth surfacing.
pub fn relative(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - date).num_seconds().max(0);
    if seconds < 60 {
        "moments ago".to_owned()
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86_400)
    }
}
