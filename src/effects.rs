use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{Cache, ALL_BOOKINGS_PATTERN};
use crate::notify::Notifier;
use crate::observability::{EFFECTS_DROPPED_TOTAL, EFFECTS_FAILED_TOTAL};

/// Work that follows a committed booking write. Never affects the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Drop every cached booking list and detail entry.
    InvalidateBookings,
    Notify(String),
}

impl Effect {
    fn label(&self) -> &'static str {
        match self {
            Effect::InvalidateBookings => "invalidate_bookings",
            Effect::Notify(_) => "notify",
        }
    }
}

enum Command {
    Notify(String),
    /// Answered once everything submitted before it has run.
    Flush { response: oneshot::Sender<()> },
    /// Stop after everything submitted before it has run.
    Close,
}

/// Outstanding cache invalidation. Lives beside the bounded queue rather than
/// in it: any number of invalidations collapse into one, and none is dropped.
#[derive(Default)]
struct Invalidation {
    pending: AtomicBool,
    wake: Notify,
}

impl Invalidation {
    fn request(&self) {
        self.pending.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// Single background task that runs effects in submission order. An
/// outstanding invalidation runs before the next queued command, so a write's
/// invalidation always lands before its notification.
async fn effect_loop(
    mut rx: mpsc::Receiver<Command>,
    invalidation: Arc<Invalidation>,
    cache: Cache,
    notifier: Arc<dyn Notifier>,
) {
    loop {
        let cmd = tokio::select! {
            biased;
            cmd = rx.recv() => cmd,
            _ = invalidation.wake.notified() => {
                invalidate_if_requested(&invalidation, &cache).await;
                continue;
            }
        };
        invalidate_if_requested(&invalidation, &cache).await;
        match cmd {
            Some(Command::Notify(message)) => {
                if let Err(error) = notifier.send(&message).await {
                    effect_failed("notify", &error);
                }
            }
            Some(Command::Flush { response }) => {
                let _ = response.send(());
            }
            Some(Command::Close) | None => break,
        }
    }
    debug!("effect worker stopped");
}

async fn invalidate_if_requested(invalidation: &Invalidation, cache: &Cache) {
    if !invalidation.take() {
        return;
    }
    match cache.delete_by_pattern(ALL_BOOKINGS_PATTERN).await {
        Ok(removed) => debug!(removed, "booking cache invalidated"),
        Err(error) => {
            effect_failed("invalidate_bookings", &error);
            // Retried before the next command.
            invalidation.pending.store(true, Ordering::Release);
        }
    }
}

fn effect_failed(label: &'static str, error: &dyn std::fmt::Display) {
    warn!(effect = label, %error, "side effect failed");
    metrics::counter!(EFFECTS_FAILED_TOTAL, "effect" => label).increment(1);
}

fn dropped(label: &'static str, reason: &'static str) {
    warn!(effect = label, reason, "side effect dropped");
    metrics::counter!(EFFECTS_DROPPED_TOTAL).increment(1);
}

/// Cheap, cloneable handle for submitting effects.
#[derive(Clone)]
pub struct EffectDispatcher {
    tx: mpsc::Sender<Command>,
    invalidation: Arc<Invalidation>,
}

/// Owns the background task; used once, at shutdown.
pub struct EffectWorker {
    handle: JoinHandle<()>,
}

impl EffectDispatcher {
    /// `capacity` bounds queued notifications only.
    pub fn spawn(cache: Cache, notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, EffectWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let invalidation = Arc::new(Invalidation::default());
        let handle = tokio::spawn(effect_loop(rx, invalidation.clone(), cache, notifier));
        (Self { tx, invalidation }, EffectWorker { handle })
    }

    /// Hand off without waiting. Invalidations are coalesced and never
    /// dropped while the worker runs; a notification meeting a full queue is.
    pub fn submit(&self, effect: Effect) {
        let label = effect.label();
        if self.tx.is_closed() {
            return dropped(label, "worker stopped");
        }
        match effect {
            Effect::InvalidateBookings => self.invalidation.request(),
            Effect::Notify(message) => match self.tx.try_send(Command::Notify(message)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => dropped(label, "queue full"),
                Err(mpsc::error::TrySendError::Closed(_)) => dropped(label, "worker stopped"),
            },
        }
    }

    /// Wait until every effect submitted before this call has run.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush { response: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

impl EffectWorker {
    /// Stop accepting work, let queued effects finish, and wait at most
    /// `timeout`. Returns false if the deadline passed first; whatever was
    /// still queued is lost.
    pub async fn drain(self, dispatcher: &EffectDispatcher, timeout: Duration) -> bool {
        let mut handle = self.handle;
        let drained = tokio::time::timeout(timeout, async {
            let _ = dispatcher.tx.send(Command::Close).await;
            let _ = (&mut handle).await;
        })
        .await
        .is_ok();
        if !drained {
            warn!(?timeout, "effect drain timed out, abandoning queued effects");
            handle.abort();
        }
        drained
    }
}
