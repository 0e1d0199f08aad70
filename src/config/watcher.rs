//! Input file watcher for recompilation.

use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::lifecycle::startup::{render, Inputs};

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A watcher that recompiles whenever an input file changes.
pub struct InputWatcher {
    inputs: Inputs,
    update_tx: mpsc::UnboundedSender<String>,
}

impl InputWatcher {
    /// Create a new InputWatcher.
    ///
    /// Returns the watcher and a receiver for freshly rendered output.
    pub fn new(inputs: Inputs) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (Self { inputs, update_tx }, update_rx)
    }

    /// Start watching. Events are handled on the watcher's own thread; drop
    /// the returned handle to stop.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let inputs = self.inputs.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(
                            paths = ?event.paths,
                            "input change detected, recompiling"
                        );
                        match render(&inputs) {
                            Ok(output) => {
                                if tx.send(output).is_err() {
                                    tracing::debug!("output receiver closed, dropping output");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    "recompilation failed, keeping previous output"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!(error = ?e, "watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        for path in self.inputs.paths() {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
            tracing::info!(path = %path.display(), "watching input");
        }
        Ok(watcher)
    }
}
