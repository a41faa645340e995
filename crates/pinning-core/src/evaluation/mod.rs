mod evaluator;
mod selection;

pub use evaluator::{PinEvaluator, evaluate_pinned_state_for_version};
pub use selection::{LatestApplicableVersion, LatestApplicableVersionSelector};
