pub mod pairing;
pub mod pipeline;
pub mod scoring;
pub mod similarity;
pub mod weights;

pub use pairing::{random_pairing, OddCohortPolicy, Pairing};
pub use pipeline::{MatchOutcome, MatchingEngine};
pub use scoring::{score_compatibility, CompatibilityScorer, PairScore, ScoreTable, ScoringConfig};
