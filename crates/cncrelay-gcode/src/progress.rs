//! Live job progress
//!
//! Holds the motion plan of the loaded program and answers "how long is
//! left" for a line cursor. The plan is rebuilt only when the program text
//! changes.

use cncrelay_core::ServerState;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::estimator::{Estimate, EstimatorConfig, MotionEstimator, MotionPlan, Overrides};

struct LoadedPlan {
    text_hash: u64,
    plan: Arc<MotionPlan>,
}

/// Progress/ETA tracker for the loaded program
pub struct ProgressTracker {
    estimator: MotionEstimator,
    loaded: RwLock<Option<LoadedPlan>>,
}

impl ProgressTracker {
    /// Create a tracker with no program loaded
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            estimator: MotionEstimator::new(config),
            loaded: RwLock::new(None),
        }
    }

    /// Load program text, rebuilding the plan only if the text changed
    pub fn load(&self, text: &str) -> Arc<MotionPlan> {
        let text_hash = hash_text(text);
        if let Some(loaded) = self.loaded.read().as_ref() {
            if loaded.text_hash == text_hash {
                return Arc::clone(&loaded.plan);
            }
        }

        let plan = Arc::new(self.estimator.parse(text));
        *self.loaded.write() = Some(LoadedPlan {
            text_hash,
            plan: Arc::clone(&plan),
        });
        tracing::info!(
            "Loaded program: {} lines, estimated {:.0}s",
            plan.line_count(),
            plan.total_sec()
        );
        plan
    }

    /// Drop the loaded plan
    pub fn clear(&self) {
        *self.loaded.write() = None;
    }

    /// Currently loaded plan
    pub fn plan(&self) -> Option<Arc<MotionPlan>> {
        self.loaded.read().as_ref().map(|l| Arc::clone(&l.plan))
    }

    /// Estimate after `lines_done` lines, `None` when nothing is loaded
    pub fn estimate(&self, lines_done: usize, overrides: Option<Overrides>) -> Option<Estimate> {
        self.plan().map(|plan| plan.estimate(lines_done, overrides))
    }

    /// Estimate from the shared job cursor and the latest override percentages
    pub fn estimate_from_state(&self, state: &ServerState) -> Option<Estimate> {
        let overrides = state
            .overrides()
            .map(|(feed, rapid)| Overrides { feed, rapid });
        self.estimate(state.job().current_line, overrides)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
