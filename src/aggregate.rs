//! Ranking of scored frames and the JSON export.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{format_timestamp, AnnotatedFrame};

/// Default name of the exported file
pub const DEFAULT_EXPORT_FILE: &str = "moments.json";

/// Frames with `score >= min_score`, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    moments: Vec<AnnotatedFrame>,
}

/// One exported moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentRecord {
    pub score: u8,
    pub timestamp: u64,
    pub description: String,
}

impl From<&AnnotatedFrame> for MomentRecord {
    fn from(frame: &AnnotatedFrame) -> Self {
        Self {
            score: frame.score,
            timestamp: frame.timestamp,
            description: frame.description.clone(),
        }
    }
}

/// Keep frames scoring at least `min_score` and rank them.
///
/// Higher scores come first; equal scores keep the earlier timestamp first.
pub fn aggregate(annotated: &[AnnotatedFrame], min_score: u8) -> ResultSet {
    let mut moments: Vec<AnnotatedFrame> = annotated
        .iter()
        .filter(|frame| frame.score >= min_score)
        .cloned()
        .collect();
    moments.sort_by(|a, b| b.score.cmp(&a.score).then(a.timestamp.cmp(&b.timestamp)));
    ResultSet { moments }
}

impl ResultSet {
    pub fn moments(&self) -> &[AnnotatedFrame] {
        &self.moments
    }

    pub fn len(&self) -> usize {
        self.moments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moments.is_empty()
    }

    pub fn records(&self) -> Vec<MomentRecord> {
        self.moments.iter().map(MomentRecord::from).collect()
    }

    /// Ranked JSON array of `{score, timestamp, description}`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records())?)
    }

    /// Write the JSON array to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Wrote {} moments to {}", self.len(), path.display());
        Ok(())
    }

    /// One line per moment: rank, `m:ss`, score and description.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (rank, moment) in self.moments.iter().enumerate() {
            out.push_str(&format!(
                "#{:<3} {:>6}  {:>2}/10  {}\n",
                rank + 1,
                format_timestamp(moment.timestamp),
                moment.score,
                moment.description
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotated(timestamp: u64, score: u8) -> AnnotatedFrame {
        AnnotatedFrame {
            timestamp,
            score,
            description: format!("moment at {}", timestamp),
            raw: None,
        }
    }

    fn scores(set: &ResultSet) -> Vec<u8> {
        set.moments().iter().map(|m| m.score).collect()
    }

    #[test]
    fn test_filter_and_rank() {
        let frames = vec![
            annotated(0, 9),
            annotated(5, 4),
            annotated(10, 8),
            annotated(15, 7),
        ];
        let set = aggregate(&frames, 7);
        assert_eq!(scores(&set), vec![9, 8, 7]);
    }

    #[test]
    fn test_ties_by_ascending_timestamp() {
        let frames = vec![annotated(20, 8), annotated(5, 8), annotated(10, 9)];
        let set = aggregate(&frames, 0);
        let order: Vec<u64> = set.moments().iter().map(|m| m.timestamp).collect();
        assert_eq!(order, vec![10, 5, 20]);
    }

    #[test]
    fn test_subset_and_non_increasing() {
        let frames: Vec<AnnotatedFrame> = (0..20u64)
            .map(|i| annotated(i * 5, ((i * 7) % 11) as u8))
            .collect();
        for min_score in 0..=10 {
            let set = aggregate(&frames, min_score);
            assert!(set.moments().iter().all(|m| m.score >= min_score));
            assert!(set.moments().iter().all(|m| frames.contains(m)));
            assert!(set.moments().windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[test]
    fn test_json_export_shape() {
        let set = aggregate(&[annotated(65, 9)], 7);
        let json: serde_json::Value = serde_json::from_str(&set.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "score": 9, "timestamp": 65, "description": "moment at 65" }])
        );
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_EXPORT_FILE);
        aggregate(&[annotated(0, 8), annotated(5, 9)], 7)
            .write_to(&path)
            .unwrap();

        let records: Vec<MomentRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, 5);
    }

    #[test]
    fn test_render_text_uses_minutes() {
        let text = aggregate(&[annotated(65, 9)], 0).render_text();
        assert!(text.contains("1:05"));
        assert!(text.contains("9/10"));
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[], 7).is_empty());
    }
}
