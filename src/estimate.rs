//! User-facing frame count and cost estimates. No effect on a run.

use crate::sampler::expected_frame_count;
use crate::types::Model;

/// `min(ceil(duration / interval), max_frames)`, with `max_frames == 0` meaning no cap.
pub fn estimate_frame_count(duration: u64, interval: u64, max_frames: usize) -> usize {
    expected_frame_count(duration, interval, max_frames)
}

/// Estimated cost in euros of scoring `frame_count` frames with `model`.
pub fn estimate_cost(frame_count: usize, model: Model) -> f64 {
    frame_count as f64 * model.per_frame_cost()
}

/// Cost formatted like `~0.04€`.
pub fn format_cost(cost: f64) -> String {
    format!("~{:.2}€", cost)
}
