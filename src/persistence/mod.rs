//! Debounced autosave.
//!
//! Mutations bump a revision counter on a watch channel. A single worker task
//! waits until the counter has been quiet for the whole window, then asks the
//! sink to persist whatever the state is *at that moment*. Saves run one at a
//! time on that worker, so they are never reordered.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle, time, time::Duration};
use tokio_util::sync::CancellationToken;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[async_trait]
pub trait SaveSink: Send + Sync + 'static {
    /// Persists the latest state. Errors are the sink's to report.
    async fn flush(&self);
}

enum Settled {
    /// Window elapsed without further changes.
    Quiet,
    /// Shutdown requested or every handle dropped while a save was pending.
    Closing,
}

pub struct DebouncedSaver {
    revision_tx: watch::Sender<u64>,
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedSaver {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(window: Duration, sink: Arc<dyn SaveSink>) -> Self {
        let (revision_tx, revision_rx) = watch::channel(0u64);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(debounce_loop(
            window,
            revision_rx,
            sink,
            cancel_token.clone(),
        ));

        Self {
            revision_tx,
            cancel_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Records that the observed state changed; re-arms the timer.
    pub fn touch(&self) {
        self.revision_tx
            .send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    /// Flushes any pending save and stops the worker.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();

        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                log_warn!("autosave worker failed to join: {err}");
            }
        }
    }
}

async fn debounce_loop(
    window: Duration,
    mut revision_rx: watch::Receiver<u64>,
    sink: Arc<dyn SaveSink>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            changed = revision_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = cancel_token.cancelled() => break,
        }

        let settled = loop {
            tokio::select! {
                _ = time::sleep(window) => break Settled::Quiet,
                changed = revision_rx.changed() => {
                    if changed.is_err() {
                        break Settled::Closing;
                    }
                }
                _ = cancel_token.cancelled() => break Settled::Closing,
            }
        };

        sink.flush().await;

        if let Settled::Closing = settled {
            log_info!("flushed pending autosave before shutdown");
            break;
        }
    }

    log_info!("autosave worker shutting down");
}
