//! Pacing of calls to the scoring service.
//!
//! The orchestrator calls [`RateLimiter::acquire`] right before every scoring
//! attempt. The default policy waits a fixed delay between attempts; a token
//! bucket allows short bursts against providers that tolerate them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{HighlightError, Result};

/// Default pause between two scoring calls
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Rate limiter policy used by a run.
#[async_trait]
pub trait RateLimiter: Send {
    /// Wait until the next call is allowed.
    async fn acquire(&mut self);
}

/// Waits a fixed delay before every call except the first one.
#[derive(Debug)]
pub struct FixedDelay {
    delay: Duration,
    primed: bool,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            primed: false,
        }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn acquire(&mut self) {
        if self.primed {
            tokio::time::sleep(self.delay).await;
        }
        self.primed = true;
    }
}

/// No pacing at all.
#[derive(Debug, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&mut self) {}
}

/// Token bucket rate limiter
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens (burst size)
    max_tokens: f64,
    /// Current tokens
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    /// Last refill time
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket of `max_tokens` refilled at `refill_rate` tokens per second.
    /// The rate must be finite and at least one token per hour.
    pub fn new(max_tokens: u32, refill_rate: f64) -> Result<Self> {
        check_refill_rate(refill_rate)?;
        let max_tokens = max_tokens.max(1) as f64;
        Ok(Self {
            max_tokens,
            tokens: max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        })
    }

    /// Try to consume a token
    pub fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one full token is available
    fn time_to_next_token(&self) -> Duration {
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(missing / self.refill_rate)
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

/// Slowest accepted refill rate, one token per hour
const MIN_REFILL_RATE: f64 = 1.0 / 3600.0;

fn check_refill_rate(rate: f64) -> Result<()> {
    if rate.is_finite() && rate >= MIN_REFILL_RATE {
        Ok(())
    } else {
        Err(HighlightError::Config(format!(
            "requests_per_second must be at least {:.6}, got {}",
            MIN_REFILL_RATE, rate
        )))
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn acquire(&mut self) {
        while !self.try_consume() {
            tokio::time::sleep(self.time_to_next_token()).await;
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RateLimitConfig {
    /// Fixed pause between calls
    Fixed { delay_ms: u64 },
    /// Sustained rate with bursts
    TokenBucket {
        requests_per_second: f64,
        burst_size: u32,
    },
    /// No pacing
    None,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig::Fixed {
            delay_ms: DEFAULT_DELAY.as_millis() as u64,
        }
    }
}

impl RateLimitConfig {
    /// Reject values no limiter can be built from.
    pub fn validate(&self) -> Result<()> {
        match self {
            RateLimitConfig::TokenBucket {
                requests_per_second,
                ..
            } => check_refill_rate(*requests_per_second),
            _ => Ok(()),
        }
    }

    /// Build a fresh limiter for one run.
    pub fn build(&self) -> Result<Box<dyn RateLimiter>> {
        let limiter: Box<dyn RateLimiter> = match self {
            RateLimitConfig::Fixed { delay_ms } => {
                Box::new(FixedDelay::new(Duration::from_millis(*delay_ms)))
            }
            RateLimitConfig::TokenBucket {
                requests_per_second,
                burst_size,
            } => Box::new(TokenBucket::new(*burst_size, *requests_per_second)?),
            RateLimitConfig::None => Box::new(Unlimited),
        };
        Ok(limiter)
    }
}
