//! Compatibility scoring and pairing search for one-on-one cohort matching.
//!
//! Survey answers are turned into a pairwise [`ScoreTable`] by the
//! [`CompatibilityScorer`]; a generic [`evolution::Evolution`] engine then
//! searches for the disjoint pairing with the highest total compatibility.

pub mod config;
pub mod error;
pub mod evolution;
pub mod logging;
pub mod matching;
pub mod run_id;
pub mod survey;

pub use config::{EvolutionConfig, MatcherConfig};
pub use error::{MatchError, MatchResult};
pub use matching::{
    CompatibilityScorer, MatchOutcome, MatchingEngine, OddCohortPolicy, PairScore, Pairing,
    ScoreTable, ScoringConfig,
};
pub use survey::{Identity, Polarity, Question, QuestionCatalog, Respondent};
