use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_MAX_PAUSE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub rps: f64,
    pub burst: f64,
    pub tokens: f64,
    /// Time until the next call may start (ms), if the limiter is currently holding calls back.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Tokens per second. Zero disables local throttling.
    pub rps: f64,
    /// Maximum burst size (tokens).
    pub burst: f64,
    /// Upper bound on a server-requested pause.
    pub max_pause: Duration,
}

impl RateLimiterConfig {
    pub fn from_rps(rps: f64) -> Option<Self> {
        if !rps.is_finite() || rps < 0.0 {
            return None;
        }
        Some(Self {
            rps,
            burst: rps.max(1.0),
            max_pause: DEFAULT_MAX_PAUSE,
        })
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = f64::from(burst.max(1));
        self
    }

    pub fn with_max_pause(mut self, max_pause: Duration) -> Self {
        self.max_pause = max_pause;
        self
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    /// Set when JIRA reported an exhausted budget or sent `Retry-After`.
    paused_until: Option<Instant>,
}

/// Token bucket shared by every call a [`crate::client::JiraClient`] makes.
///
/// Besides local pacing it honours the server: a `Retry-After` or
/// `X-RateLimit-Remaining: 0` pauses all callers until the window resets.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let bucket = Mutex::new(Bucket {
            tokens: cfg.burst,
            last_refill: Instant::now(),
            paused_until: None,
        });
        Self { cfg, bucket }
    }

    fn refill(cfg: &RateLimiterConfig, b: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(b.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            b.tokens = (b.tokens + elapsed * cfg.rps).min(cfg.burst);
            b.last_refill = now;
        }
    }

    /// How long the caller must wait before a token is available; zero takes one.
    fn reserve(&self, b: &mut Bucket) -> Duration {
        let now = Instant::now();
        if let Some(until) = b.paused_until {
            if until > now {
                return until - now;
            }
            b.paused_until = None;
        }
        if self.cfg.rps <= 0.0 {
            return Duration::ZERO;
        }
        Self::refill(&self.cfg, b, now);
        if b.tokens >= 1.0 {
            b.tokens -= 1.0;
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - b.tokens) / self.cfg.rps)
    }

    /// Wait for one token.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut b = self.bucket.lock().await;
                self.reserve(&mut b)
            };
            if wait.is_zero() {
                return;
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token only if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut b = self.bucket.lock().await;
        self.reserve(&mut b).is_zero()
    }

    /// Feed rate-limit signals from a JIRA response.
    ///
    /// `retry_after` is capped at [`RateLimiterConfig::max_pause`].
    pub async fn update_budget(&self, remaining: Option<u64>, retry_after: Option<Duration>) {
        let mut b = self.bucket.lock().await;
        let now = Instant::now();
        if let Some(after) = retry_after {
            b.paused_until = now.checked_add(after.min(self.cfg.max_pause));
            return;
        }
        match remaining {
            Some(0) => b.paused_until = now.checked_add(Duration::from_secs(1)),
            Some(_) => b.paused_until = None,
            None => {}
        }
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut b = self.bucket.lock().await;
        let now = Instant::now();

        let mut wait_ms = b
            .paused_until
            .filter(|until| *until > now)
            .map(|until| (until - now).as_millis() as u64);

        if self.cfg.rps > 0.0 {
            Self::refill(&self.cfg, &mut b, now);
            if b.tokens < 1.0 {
                let local = ((1.0 - b.tokens) / self.cfg.rps * 1000.0) as u64;
                wait_ms = Some(wait_ms.unwrap_or(0).max(local));
            }
        }

        RateLimiterSnapshot {
            rps: self.cfg.rps,
            burst: self.cfg.burst,
            tokens: b.tokens,
            estimated_wait_ms: wait_ms,
        }
    }
}
