//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - The vision scorer answering `/api/analyze`
//! - Request counters
//! - Server configuration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::analysis::VisionScorer;
use crate::config::ServerConfig;

/// Shared state of the scoring endpoint
pub struct AppState {
    /// Answers scoring requests
    pub scorer: Arc<dyn VisionScorer>,

    /// Frames scored successfully
    pub scored: AtomicU64,

    /// Scoring requests that failed
    pub failed: AtomicU64,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create a new AppState with the given scorer and configuration
    pub fn new(scorer: Arc<dyn VisionScorer>, config: ServerConfig) -> Self {
        Self {
            scorer,
            scored: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            config,
        }
    }

    pub fn record_scored(&self) {
        self.scored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// `(scored, failed)` so far
    pub fn counters(&self) -> (u64, u64) {
        (
            self.scored.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}
