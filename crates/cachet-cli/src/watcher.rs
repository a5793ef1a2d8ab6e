//! File system watcher feeding watch mode.
//!
//! Watches the project root recursively, drops ignored paths, and batches
//! the rest: the first change opens a window of `debounce_ms`, and every
//! path seen until it closes is sent as one `Vec<PathBuf>`.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{CliError, Result};

/// Path filter for watcher events.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    patterns: Vec<String>,
    output_dir: PathBuf,
}

impl IgnoreRules {
    /// `patterns`: `*.ext` matches by suffix, anything else matches a path
    /// segment (or a leading run of segments). `output_dir` is always
    /// ignored.
    pub fn new(root: impl Into<PathBuf>, patterns: Vec<String>, output_dir: impl AsRef<Path>) -> Self {
        let root = root.into();
        let output_dir = output_dir.as_ref();
        let output_dir = if output_dir.is_absolute() {
            output_dir.to_path_buf()
        } else {
            root.join(output_dir)
        };
        Self {
            root,
            patterns,
            output_dir,
        }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if path.starts_with(&self.output_dir) {
            return true;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return true;
        };

        let hidden = relative.components().any(|component| match component {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        });
        if hidden {
            return true;
        }

        let text = relative.to_string_lossy();
        self.patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                return text.ends_with(suffix);
            }
            let pattern = Path::new(pattern.trim_end_matches('/'));
            relative.starts_with(pattern)
                || relative
                    .components()
                    .any(|component| Path::new(component.as_os_str()) == pattern)
        })
    }
}

/// Recursive watcher with ignore rules and batching.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    batcher: JoinHandle<()>,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// The receiver closes once the watcher is dropped and the last batch
    /// was delivered.
    pub fn new(rules: IgnoreRules, debounce_ms: u64) -> Result<(Self, mpsc::Receiver<Vec<PathBuf>>)> {
        let root = rules.root.clone();
        if !root.is_dir() {
            return Err(CliError::FileNotFound(root));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();
        let (batch_tx, batch_rx) = mpsc::channel(16);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                    return;
                }
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in event.paths {
                if !rules.is_ignored(&path) {
                    let _ = raw_tx.send(path);
                }
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let batcher = tokio::spawn(batch_changes(raw_rx, batch_tx, Duration::from_millis(debounce_ms)));
        tracing::debug!(root = %root.display(), debounce_ms, "watching for changes");

        Ok((
            Self {
                _watcher: watcher,
                batcher,
                root,
            },
            batch_rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        // pending paths are discarded; the session drains what it already has
        self.batcher.abort();
    }
}

/// Group raw paths into batches separated by quiet periods of `window`.
pub(crate) async fn batch_changes(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    out: mpsc::Sender<Vec<PathBuf>>,
    window: Duration,
) {
    while let Some(first) = raw.recv().await {
        let mut batch = BTreeSet::from([first]);
        let mut open = true;
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        while open {
            tokio::select! {
                next = raw.recv() => match next {
                    Some(path) => {
                        batch.insert(path);
                    }
                    None => open = false,
                },
                _ = &mut deadline => break,
            }
        }

        if out.send(batch.into_iter().collect()).await.is_err() || !open {
            return;
        }
    }
}
