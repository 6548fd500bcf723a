use crate::constants::rate_limit::{
    CLEANUP_INTERVAL_MS, SLOT_POLL_ATTEMPTS, SLOT_POLL_INTERVAL_MS,
};
use crate::errors::ToolError;
use crate::services::config::RateLimitSettings;
use crate::services::logger::Logger;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

#[derive(Default)]
struct GateState {
    active: usize,
    history: HashMap<String, VecDeque<Instant>>,
}

struct GateInner {
    settings: RateLimitSettings,
    window: Duration,
    poll_interval: Duration,
    poll_attempts: u32,
    state: Mutex<GateState>,
    logger: Logger,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        // Critical sections never panic, but recover the counters if one ever did.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before: usize = state.history.values().map(VecDeque::len).sum();
        for entries in state.history.values_mut() {
            prune(entries, now, self.window);
        }
        state.history.retain(|_, entries| !entries.is_empty());
        let after: usize = state.history.values().map(VecDeque::len).sum();
        before - after
    }
}

fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = entries.front() {
        if now.duration_since(*front) >= window {
            entries.pop_front();
        } else {
            break;
        }
    }
}

/// Rate and concurrency checkpoint in front of every outbound request.
///
/// Each client id gets a sliding window of request timestamps. Concurrency is a single
/// process-wide counter; a caller that finds no free slot polls a bounded number of times
/// before giving up with `BUSY`.
#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

/// Held for the duration of one outbound request. Dropping it frees the slot.
pub struct AdmissionPermit {
    inner: Arc<GateInner>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.inner.release();
    }
}

enum Attempt {
    Admitted,
    RateLimited(usize),
    Full,
}

impl AdmissionGate {
    pub fn new(settings: RateLimitSettings, logger: Logger) -> Self {
        Self::with_polling(
            settings,
            Duration::from_millis(SLOT_POLL_INTERVAL_MS),
            SLOT_POLL_ATTEMPTS,
            logger,
        )
    }

    pub fn with_polling(
        settings: RateLimitSettings,
        poll_interval: Duration,
        poll_attempts: u32,
        logger: Logger,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                settings,
                window: Duration::from_millis(settings.window_ms),
                poll_interval,
                poll_attempts,
                state: Mutex::new(GateState::default()),
                logger: logger.child("gate"),
            }),
        }
    }

    fn try_admit(&self, client_id: &str) -> Attempt {
        let now = Instant::now();
        let mut state = self.inner.lock();
        let recent = {
            let entries = state.history.entry(client_id.to_string()).or_default();
            prune(entries, now, self.inner.window);
            entries.len()
        };
        if recent >= self.inner.settings.max_requests {
            return Attempt::RateLimited(recent);
        }
        if state.active >= self.inner.settings.max_concurrent {
            return Attempt::Full;
        }
        state.active += 1;
        state
            .history
            .entry(client_id.to_string())
            .or_default()
            .push_back(now);
        Attempt::Admitted
    }

    pub async fn acquire(&self, client_id: &str) -> Result<AdmissionPermit, ToolError> {
        let mut attempt = 0u32;
        loop {
            match self.try_admit(client_id) {
                Attempt::Admitted => {
                    return Ok(AdmissionPermit {
                        inner: self.inner.clone(),
                    })
                }
                Attempt::RateLimited(recent) => {
                    self.inner.logger.warn(
                        "Rate limit exceeded",
                        Some(&serde_json::json!({
                            "client_id": client_id,
                            "recent": recent,
                            "window_ms": self.inner.settings.window_ms,
                        })),
                    );
                    return Err(ToolError::rate_limited(format!(
                        "Rate limit exceeded: {} requests per {} ms",
                        self.inner.settings.max_requests, self.inner.settings.window_ms
                    ))
                    .with_hint("Wait for the current window to pass before retrying."));
                }
                Attempt::Full if attempt >= self.inner.poll_attempts => {
                    self.inner.logger.warn(
                        "No request slot available",
                        Some(&serde_json::json!({
                            "client_id": client_id,
                            "max_concurrent": self.inner.settings.max_concurrent,
                        })),
                    );
                    return Err(ToolError::busy(format!(
                        "Server busy: {} concurrent requests in flight",
                        self.inner.settings.max_concurrent
                    ))
                    .with_hint("Retry after in-flight requests complete."));
                }
                Attempt::Full => {
                    attempt += 1;
                    tokio::time::sleep(self.inner.poll_interval).await;
                }
            }
        }
    }

    pub fn active(&self) -> usize {
        self.inner.lock().active
    }

    /// Drops history entries older than the window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Periodic sweep task. It stops on its own once every handle to the gate is gone.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let weak: Weak<GateInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(CLEANUP_INTERVAL_MS));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner.sweep();
                if removed > 0 {
                    inner.logger.debug(
                        "Swept expired rate-limit entries",
                        Some(&serde_json::json!({ "removed": removed })),
                    );
                }
            }
        })
    }
}
