use std::fmt;

use serde::{Deserialize, Serialize};

use crate::studio::model::Operation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress { step: String, percent: u32 },
    Finished { operation: Operation },
    Failed { operation: Operation, error: String },
}

/// Pipeline phases of a full run. Logged, never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Naming,
    Parsing,
    GeneratingCharacters,
    GeneratingScenes,
    Complete,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Naming => "naming",
            Self::Parsing => "parsing",
            Self::GeneratingCharacters => "generating_characters",
            Self::GeneratingScenes => "generating_scenes",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        })
    }
}

/// `base + index * span / count`, the percentage reported before item `index`.
pub fn stage_percent(base: u32, span: u32, index: usize, count: usize) -> u32 {
    if count == 0 {
        return base;
    }
    let offset = (index as u64 * u64::from(span)) / count as u64;
    base.saturating_add(u32::try_from(offset).unwrap_or(span))
}

/// Keeps reported percentages within 0..=100 and never decreasing.
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    last: u32,
}

impl ProgressTracker {
    pub fn advance(&mut self, percent: u32) -> u32 {
        self.last = self.last.max(percent.min(100));
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_percent_spans_the_range() {
        assert_eq!(stage_percent(20, 30, 0, 3), 20);
        assert_eq!(stage_percent(20, 30, 1, 3), 30);
        assert_eq!(stage_percent(20, 30, 2, 3), 40);
        assert_eq!(stage_percent(50, 45, 3, 4), 83);
        assert_eq!(stage_percent(50, 45, 0, 0), 50);
    }

    #[test]
    fn tracker_never_goes_backwards() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.advance(10), 10);
        assert_eq!(tracker.advance(5), 10);
        assert_eq!(tracker.advance(250), 100);
    }

    #[test]
    fn events_serialize_with_tag() -> anyhow::Result<()> {
        let event = PipelineEvent::Progress {
            step: "Generating scenes...".to_owned(),
            percent: 50,
        };
        assert_eq!(
            serde_json::to_value(&event)?,
            serde_json::json!({"event": "progress", "step": "Generating scenes...", "percent": 50})
        );
        Ok(())
    }
}
