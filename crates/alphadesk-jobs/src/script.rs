//! Per-feature progress scripts.
//!
//! Each feature carries an ordered script of synthetic status messages
//! with randomized delay bounds. The simulator walks the script once and
//! goes silent when it is exhausted; it never loops.

use alphadesk_core::Feature;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of a progress script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Status text applied as the job's progress message.
    pub text: String,
    /// Lower bound of the delay before this step fires.
    #[serde(with = "millis")]
    pub min_delay: Duration,
    /// Upper bound of the delay before this step fires.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl ScriptStep {
    pub fn new(text: impl Into<String>, min_ms: u64, max_ms: u64) -> Self {
        debug_assert!(min_ms <= max_ms);
        Self {
            text: text.into(),
            min_delay: Duration::from_millis(min_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// An ordered, finite script of synthetic progress steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressScript {
    pub steps: Vec<ScriptStep>,
}

impl ProgressScript {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    /// Default script for a feature.
    pub fn for_feature(feature: Feature) -> Self {
        let steps = match feature {
            Feature::TradeSetup => vec![
                ScriptStep::new("Scanning recent price action...", 1_500, 3_000),
                ScriptStep::new("Mapping key support and resistance...", 4_000, 7_000),
                ScriptStep::new("Evaluating risk/reward on candidate entries...", 6_000, 10_000),
                ScriptStep::new("Drafting the trade plan...", 8_000, 14_000),
            ],
            Feature::MacroCommentary => vec![
                ScriptStep::new("Reviewing the macro calendar...", 1_500, 3_000),
                ScriptStep::new("Cross-checking rates and FX positioning...", 4_000, 8_000),
                ScriptStep::new("Writing up the commentary...", 7_000, 12_000),
            ],
            Feature::Report => vec![
                ScriptStep::new("Collecting source material...", 2_000, 4_000),
                ScriptStep::new("Structuring report sections...", 5_000, 9_000),
                ScriptStep::new("Running the deep analysis pass...", 9_000, 15_000),
                ScriptStep::new("Compiling charts and references...", 12_000, 18_000),
                ScriptStep::new("Finalizing the report...", 15_000, 22_000),
            ],
            Feature::MacroLab => vec![
                ScriptStep::new("Setting up the scenario...", 1_500, 3_000),
                ScriptStep::new("Stress-testing assumptions...", 4_000, 8_000),
                ScriptStep::new("Tracing second-order effects...", 7_000, 12_000),
                ScriptStep::new("Summarizing the lab results...", 10_000, 16_000),
            ],
        };
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
