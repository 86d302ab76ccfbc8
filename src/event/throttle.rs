//! Rate limiting for the human display path
//!
//! Tool-activity events arrive in bursts far faster than a terminal can show
//! them. This wrapper forwards at most one per interval, keeping only the most
//! recent of any burst, while every other event passes straight through.

use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::emitter::ProgressEmitter;
use super::types::Event;

pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct ThrottleState {
    last_forwarded: Option<Instant>,
    pending: Option<Event>,
}

/// Display wrapper that coalesces tool-activity bursts
pub struct ThrottledProgressEmitter {
    inner: Arc<dyn ProgressEmitter>,
    interval: Duration,
    state: Mutex<ThrottleState>,
    /// Held from decision through forwarding so the display sees events in
    /// decision order
    forwarding: Mutex<()>,
}

impl ThrottledProgressEmitter {
    pub fn new(inner: Arc<dyn ProgressEmitter>, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            state: Mutex::new(ThrottleState::default()),
            forwarding: Mutex::new(()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn lock_state(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_forwarding(&self) -> MutexGuard<'_, ()> {
        self.forwarding.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply the throttle as of `now`
    pub fn emit_at(&self, event: &Event, now: Instant) -> Result<()> {
        let _forwarding = self.lock_forwarding();
        let to_forward: Vec<Event> = {
            let mut state = self.lock_state();
            if !event.is_tool_activity() {
                let mut batch: Vec<Event> = state.pending.take().into_iter().collect();
                if !batch.is_empty() {
                    state.last_forwarded = Some(now);
                }
                batch.push(event.clone());
                batch
            } else {
                let due = state
                    .last_forwarded
                    .map(|last| now.saturating_duration_since(last) >= self.interval)
                    .unwrap_or(true);
                if due {
                    state.pending = None;
                    state.last_forwarded = Some(now);
                    vec![event.clone()]
                } else {
                    state.pending = Some(event.clone());
                    Vec::new()
                }
            }
        };

        self.forward_all(&to_forward)
    }

    /// Forward the pending event if its interval has elapsed
    pub fn flush_if_due(&self, now: Instant) -> Result<bool> {
        let _forwarding = self.lock_forwarding();
        let pending = {
            let mut state = self.lock_state();
            let due = state
                .last_forwarded
                .map(|last| now.saturating_duration_since(last) >= self.interval)
                .unwrap_or(true);
            if !due {
                return Ok(false);
            }
            let pending = state.pending.take();
            if pending.is_some() {
                state.last_forwarded = Some(now);
            }
            pending
        };

        match pending {
            Some(event) => self.inner.emit_progress(&event).map(|_| true),
            None => Ok(false),
        }
    }

    /// Forward any pending event regardless of the interval
    pub fn flush(&self) -> Result<()> {
        let _forwarding = self.lock_forwarding();
        let pending = {
            let mut state = self.lock_state();
            let pending = state.pending.take();
            if pending.is_some() {
                state.last_forwarded = Some(Instant::now());
            }
            pending
        };

        match pending {
            Some(event) => self.inner.emit_progress(&event),
            None => Ok(()),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.lock_state().pending.is_some()
    }

    /// Surface coalesced events at interval boundaries even when no further
    /// event arrives to push them out
    pub fn start_flush_timer(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = (self.interval / 4).max(Duration::from_millis(10));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.flush_if_due(Instant::now()) {
                    tracing::warn!("Throttled display flush failed: {}", e);
                }
            }
        })
    }

    fn forward_all(&self, events: &[Event]) -> Result<()> {
        let mut first_err = None;
        for event in events {
            if let Err(e) = self.inner.emit_progress(event) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl ProgressEmitter for ThrottledProgressEmitter {
    fn emit_progress(&self, event: &Event) -> Result<()> {
        self.emit_at(event, Instant::now())
    }
}
