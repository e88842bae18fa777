//! Time source and token health derivation.

use crate::store::TokenStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Injectable time source.
///
/// Production code uses the system clock; tests use a manual clock and
/// advance it deterministically instead of sleeping.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

enum ClockInner {
    System,
    Manual(RwLock<DateTime<Utc>>),
}

impl Clock {
    /// The real system clock.
    pub fn system() -> Self {
        Self {
            inner: Arc::new(ClockInner::System),
        }
    }

    /// A manual clock starting at the given instant.
    pub fn fixed(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(ClockInner::Manual(RwLock::new(start))),
        }
    }

    /// Current time.
    pub fn now(&self) -> DateTime<Utc> {
        match &*self.inner {
            ClockInner::System => Utc::now(),
            ClockInner::Manual(now) => *now.read().unwrap(),
        }
    }

    /// Advance a manual clock. Ignored (with a warning) on the system clock.
    pub fn advance(&self, by: Duration) {
        match &*self.inner {
            ClockInner::System => warn!("Clock::advance called on the system clock; ignored"),
            ClockInner::Manual(now) => {
                let mut now = now.write().unwrap();
                *now += ChronoDuration::from_std(by).unwrap_or_else(|_| ChronoDuration::zero());
            }
        }
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.inner {
            ClockInner::System => f.write_str("Clock::System"),
            ClockInner::Manual(now) => write!(f, "Clock::Manual({})", now.read().unwrap()),
        }
    }
}

/// Coarse classification of the access token's remaining lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHealth {
    /// More than 25 minutes remaining
    Excellent,
    /// More than 15 minutes remaining
    Good,
    /// More than 5 minutes remaining
    Warning,
    /// Expiring imminently
    Critical,
    /// Expired or absent
    Expired,
}

impl TokenHealth {
    /// Classify a remaining lifetime in seconds; `None` means no token.
    pub fn classify(remaining_secs: Option<i64>) -> Self {
        match remaining_secs {
            Some(secs) if secs > 25 * 60 => Self::Excellent,
            Some(secs) if secs > 15 * 60 => Self::Good,
            Some(secs) if secs > 5 * 60 => Self::Warning,
            Some(secs) if secs > 0 => Self::Critical,
            _ => Self::Expired,
        }
    }

    /// Health name for status widgets.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TokenHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives token health from the token store.
///
/// Pure derivation: recomputing never mutates token state beyond what the
/// store's own getters already do.
pub struct SessionClock {
    store: Arc<TokenStore>,
    interval: Duration,
    health: watch::Sender<TokenHealth>,
}

impl SessionClock {
    /// Create a clock polling at the given interval.
    pub fn new(store: Arc<TokenStore>, interval: Duration) -> Self {
        let (health, _) = watch::channel(TokenHealth::classify(store.remaining_seconds()));
        Self {
            store,
            interval,
            health,
        }
    }

    /// Current health, derived on the spot.
    pub fn health(&self) -> TokenHealth {
        TokenHealth::classify(self.store.remaining_seconds())
    }

    /// Recompute health and notify observers if it changed.
    pub fn recompute(&self) -> TokenHealth {
        let current = self.health();
        self.health.send_if_modified(|prev| {
            if *prev == current {
                false
            } else {
                debug!(health = %current, "token health changed");
                *prev = current;
                true
            }
        });
        current
    }

    /// Observe health changes.
    pub fn subscribe(&self) -> watch::Receiver<TokenHealth> {
        self.health.subscribe()
    }

    /// Spawn the monitor loop: recomputes on a fixed interval and
    /// immediately when token state changes.
    pub fn spawn_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let clock = Arc::clone(self);
        let mut events = clock.store.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(clock.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        clock.recompute();
                    }
                    event = events.recv() => match event {
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            clock.recompute();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        })
    }
}
