//! Watch-mode state machine.
//!
//! One pass at a time. A change while idle starts a pass at once; changes
//! that arrive during a pass are merged into one pending set, and when the
//! pass finishes that union starts exactly one follow-up pass. Passes are
//! never cancelled half-way.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::runtime::RuntimeError;
use crate::{Error, Result};

/// Where a pass currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Resolving,
    Transforming,
    Grouping,
    Emitting,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Idle => "idle",
            PipelineState::Resolving => "resolving",
            PipelineState::Transforming => "transforming",
            PipelineState::Grouping => "grouping",
            PipelineState::Emitting => "emitting",
        })
    }
}

/// One pass to run. `changed` is empty for the initial build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassRequest {
    pub pass: u64,
    pub changed: BTreeSet<PathBuf>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    running: bool,
    queued: bool,
    pending: BTreeSet<PathBuf>,
    passes: u64,
}

impl CoordinatorState {
    fn begin(&mut self, changed: BTreeSet<PathBuf>) -> PassRequest {
        self.running = true;
        self.queued = false;
        self.passes += 1;
        PassRequest {
            pass: self.passes,
            changed,
        }
    }
}

/// Decides when passes start.
#[derive(Debug, Default)]
pub struct RebuildCoordinator {
    state: Mutex<CoordinatorState>,
}

impl RebuildCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change. Returns the pass to start now, or `None` when a pass
    /// is running and the change was queued.
    pub fn notify(&self, changed: impl IntoIterator<Item = PathBuf>) -> Option<PassRequest> {
        let mut state = self.state.lock();
        if state.running {
            state.pending.extend(changed);
            state.queued = true;
            return None;
        }
        let changed = changed.into_iter().collect();
        Some(state.begin(changed))
    }

    /// Start a pass unconditionally unless one is running (initial build).
    pub fn start(&self) -> Option<PassRequest> {
        let mut state = self.state.lock();
        if state.running {
            return None;
        }
        Some(state.begin(BTreeSet::new()))
    }

    /// Mark the running pass done. Returns the coalesced follow-up, if any.
    pub fn finish(&self) -> Option<PassRequest> {
        let mut state = self.state.lock();
        state.running = false;
        if !state.queued {
            return None;
        }
        let changed = std::mem::take(&mut state.pending);
        Some(state.begin(changed))
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Paths waiting for the next pass.
    pub fn pending(&self) -> BTreeSet<PathBuf> {
        self.state.lock().pending.clone()
    }

    pub fn passes(&self) -> u64 {
        self.state.lock().passes
    }
}

/// Runs one pass. Owned by the session and moved onto the pass task.
#[async_trait]
pub trait PassRunner: Send + 'static {
    type Output: Send + 'static;

    async fn run_pass(&mut self, request: &PassRequest) -> Self::Output;
}

#[derive(Debug)]
pub enum WatchEvent<O> {
    PassStarted(PassRequest),
    /// A change arrived mid-pass; `pending` paths wait for the next pass
    Queued { pending: usize },
    PassFinished { request: PassRequest, output: O },
}

type PassTask<R> = JoinHandle<(R, PassRequest, <R as PassRunner>::Output)>;

/// Drives a [`PassRunner`] from a change channel.
pub struct WatchSession<R: PassRunner> {
    runner: Option<R>,
    coordinator: RebuildCoordinator,
    changes: mpsc::Receiver<Vec<PathBuf>>,
    events: mpsc::UnboundedSender<WatchEvent<R::Output>>,
}

impl<R: PassRunner> WatchSession<R> {
    pub fn new(
        runner: R,
        changes: mpsc::Receiver<Vec<PathBuf>>,
    ) -> (Self, mpsc::UnboundedReceiver<WatchEvent<R::Output>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                runner: Some(runner),
                coordinator: RebuildCoordinator::new(),
                changes,
                events: tx,
            },
            rx,
        )
    }

    /// Run the initial pass, then react to changes until the change channel
    /// closes and the last pass finished. Hands the runner back.
    pub async fn run(mut self) -> Result<R> {
        let mut inflight: Option<PassTask<R>> = None;
        if let Some(request) = self.coordinator.start() {
            inflight = self.spawn_pass(request);
        }
        let mut open = true;

        loop {
            if !open && inflight.is_none() {
                break;
            }

            tokio::select! {
                changed = self.changes.recv(), if open => match changed {
                    Some(paths) => {
                        tracing::debug!(paths = paths.len(), "change notification");
                        match self.coordinator.notify(paths) {
                            Some(request) => inflight = self.spawn_pass(request),
                            None => {
                                let pending = self.coordinator.pending().len();
                                let _ = self.events.send(WatchEvent::Queued { pending });
                            }
                        }
                    }
                    None => open = false,
                },
                joined = wait(&mut inflight), if inflight.is_some() => {
                    inflight = None;
                    let (runner, request, output) = joined.map_err(pass_failed)?;
                    self.runner = Some(runner);
                    let _ = self.events.send(WatchEvent::PassFinished { request, output });
                    if let Some(next) = self.coordinator.finish() {
                        inflight = self.spawn_pass(next);
                    }
                }
            }
        }

        self.runner
            .take()
            .ok_or_else(|| Error::Runtime(RuntimeError::Other("watch runner was lost".to_string())))
    }

    fn spawn_pass(&mut self, request: PassRequest) -> Option<PassTask<R>> {
        let mut runner = self.runner.take()?;
        tracing::info!(pass = request.pass, changed = request.changed.len(), "starting build pass");
        let _ = self.events.send(WatchEvent::PassStarted(request.clone()));
        Some(tokio::spawn(async move {
            let output = runner.run_pass(&request).await;
            (runner, request, output)
        }))
    }
}

async fn wait<T>(handle: &mut Option<JoinHandle<T>>) -> std::result::Result<T, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn pass_failed(err: JoinError) -> Error {
    Error::Runtime(RuntimeError::Other(format!("build pass aborted: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn idle_change_starts_immediately() {
        let coordinator = RebuildCoordinator::new();
        let request = coordinator.notify(paths(&["a"])).unwrap();
        assert_eq!(request.pass, 1);
        assert!(coordinator.is_running());
        assert!(coordinator.finish().is_none());
        assert!(!coordinator.is_running());
    }

    #[test]
    fn mid_pass_changes_coalesce_into_one_pass() {
        let coordinator = RebuildCoordinator::new();
        coordinator.start().unwrap();
        assert!(coordinator.notify(paths(&["a"])).is_none());
        assert!(coordinator.notify(paths(&["b", "a"])).is_none());
        assert!(coordinator.notify(paths(&["c"])).is_none());

        let next = coordinator.finish().unwrap();
        assert_eq!(next.pass, 2);
        assert_eq!(next.changed, paths(&["a", "b", "c"]).into_iter().collect::<BTreeSet<_>>());
        assert!(coordinator.finish().is_none());
        assert_eq!(coordinator.passes(), 2);
    }

    #[test]
    fn start_refuses_while_running() {
        let coordinator = RebuildCoordinator::new();
        assert!(coordinator.start().is_some());
        assert!(coordinator.start().is_none());
    }

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Vec<PassRequest>,
    }

    #[async_trait]
    impl PassRunner for Recorder {
        type Output = u64;

        async fn run_pass(&mut self, request: &PassRequest) -> u64 {
            self.seen.push(request.clone());
            request.pass
        }
    }

    #[tokio::test]
    async fn session_returns_runner_when_changes_close() {
        let (tx, rx) = mpsc::channel(8);
        let (session, mut events) = WatchSession::new(Recorder::default(), rx);
        let handle = tokio::spawn(session.run());

        // initial pass
        loop {
            if let Some(WatchEvent::PassFinished { output, .. }) = events.recv().await {
                assert_eq!(output, 1);
                break;
            }
        }
        tx.send(paths(&["/p/src/a.ts"])).await.unwrap();
        drop(tx);

        let runner = handle.await.unwrap().unwrap();
        assert_eq!(runner.seen.len(), 2);
        assert_eq!(runner.seen[1].changed, paths(&["/p/src/a.ts"]).into_iter().collect::<BTreeSet<_>>());
    }
}
