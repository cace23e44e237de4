use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    domain::Commit,
    feed::{self, FeedError, LoadOutcome},
};

/// One-shot worker running the combined startup fetch. The UI thread polls
/// `try_take` between frames instead of blocking on the result.
pub struct InitialLoadJob {
    receiver: Receiver<LoadOutcome>,
}

impl InitialLoadJob {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = (|| -> LoadOutcome {
                let client = feed::build_client()?;
                feed::fetch_dashboard(&client)
            })();
            let _ = tx.send(outcome);
        });
        Self { receiver: rx }
    }

    pub fn try_take(&self) -> Option<LoadOutcome> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FeedError::WorkerGone)),
        }
    }
}

#[derive(Debug)]
pub enum PollEvent {
    Commits(Vec<Commit>),
    Failed(String),
}

/// Periodic commits-only fetch on a supervised worker thread.
///
/// Each cycle's result is sent over a channel and applied by the receiver;
/// the loop itself never touches dashboard state. Fetches run inside the
/// loop, so cycles cannot overlap, and a failed cycle has no effect on the
/// next one. `stop` wakes the loop immediately and joins the thread, so
/// owners (tests included) can shut it down deterministically.
pub struct CommitPoller {
    events: Receiver<PollEvent>,
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl CommitPoller {
    pub fn spawn(interval: Duration) -> Result<Self, FeedError> {
        let client = feed::build_client()?;
        Ok(Self::spawn_with(interval, move || {
            feed::fetch_commits(&client)
        }))
    }

    fn spawn_with(
        interval: Duration,
        mut fetch: impl FnMut() -> Result<Vec<Commit>, FeedError> + Send + 'static,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let event = match fetch() {
                    Ok(commits) => PollEvent::Commits(commits),
                    Err(err) => {
                        tracing::debug!("commit poll failed: {err}");
                        PollEvent::Failed(err.to_string())
                    }
                };

                // Receiver gone means the owner dropped us without stopping;
                // nothing left to poll for.
                if event_tx.send(event).is_err() {
                    break;
                }
            }
        });

        Self {
            events: event_rx,
            stop: stop_tx,
            handle: Some(handle),
        }
    }

    /// Next pending cycle result, if any. Never blocks.
    pub fn try_recv(&self) -> Option<PollEvent> {
        self.events.try_recv().ok()
    }

    /// Stops the loop and waits for the worker thread to exit.
    pub fn stop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CommitPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Instant,
    };

    use chrono::Utc;

    use super::*;

    fn commit(sha: &str) -> Commit {
        Commit {
            sha: sha.to_owned(),
            message: "msg".to_owned(),
            author: "dev".to_owned(),
            date: Utc::now(),
        }
    }

    #[test]
    fn poller_delivers_fetched_commits() {
        let mut poller = CommitPoller::spawn_with(Duration::from_millis(5), || {
            Ok(vec![commit("abc1234")])
        });

        let event = poller
            .events
            .recv_timeout(Duration::from_secs(2))
            .expect("a cycle should have fired");
        match event {
            PollEvent::Commits(commits) => assert_eq!(commits[0].sha, "abc1234"),
            PollEvent::Failed(err) => panic!("unexpected failure: {err}"),
        }

        poller.stop();
    }

    #[test]
    fn poller_reports_failures_and_keeps_going() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut poller = CommitPoller::spawn_with(Duration::from_millis(5), move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FeedError::WorkerGone)
            } else {
                Ok(vec![commit("beef")])
            }
        });

        let first = poller
            .events
            .recv_timeout(Duration::from_secs(2))
            .expect("first cycle");
        assert!(matches!(first, PollEvent::Failed(_)));

        let second = poller
            .events
            .recv_timeout(Duration::from_secs(2))
            .expect("second cycle");
        assert!(matches!(second, PollEvent::Commits(_)));

        poller.stop();
    }

    #[test]
    fn stop_interrupts_a_long_interval() {
        let mut poller =
            CommitPoller::spawn_with(Duration::from_secs(3600), || Ok(Vec::new()));

        let started = Instant::now();
        poller.stop();

        // The hour-long timer must not run out before the join returns.
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(poller.handle.is_none());
    }

    #[test]
    fn drop_shuts_the_worker_down() {
        let poller =
            CommitPoller::spawn_with(Duration::from_secs(3600), || Ok(Vec::new()));

        let started = Instant::now();
        drop(poller);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
