use tracing::warn;

use crate::{
    error::{MatchError, MatchResult},
    evolution::DEFAULT_DOMINANCE_THRESHOLD,
    matching::{pairing::OddCohortPolicy, scoring::ScoringConfig, weights::FactorBoosts},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionConfig {
    /// Agent invocations per run.
    pub steps: usize,
    /// Prune dominated solutions every N steps.
    pub dominance_interval: usize,
    /// Report progress every N steps.
    pub report_interval: usize,
    /// Negative gap to the best primary fitness at which a candidate is dropped.
    pub dominance_threshold: f64,
    /// Fixed RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            steps: 10_000,
            dominance_interval: 500,
            report_interval: 10_000,
            dominance_threshold: DEFAULT_DOMINANCE_THRESHOLD,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatcherConfig {
    pub scoring: ScoringConfig,
    pub evolution: EvolutionConfig,
    pub odd_cohort: OddCohortPolicy,
}

impl MatcherConfig {
    /// Defaults overridden by `CM_*` environment variables. Unparseable
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            default: T,
        ) -> T {
            match lookup(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!(key, value = %raw, "invalid value; using default");
                    default
                }),
                None => default,
            }
        }

        let defaults = Self::default();
        let boosts = FactorBoosts {
            first: parse(&lookup, "CM_FIRST_FACTOR_BOOST", defaults.scoring.boosts.first),
            second: parse(&lookup, "CM_SECOND_FACTOR_BOOST", defaults.scoring.boosts.second),
        };

        let evolution = EvolutionConfig {
            steps: parse(&lookup, "CM_EVOLVE_STEPS", defaults.evolution.steps),
            dominance_interval: parse(
                &lookup,
                "CM_DOMINANCE_INTERVAL",
                defaults.evolution.dominance_interval,
            ),
            report_interval: parse(
                &lookup,
                "CM_REPORT_INTERVAL",
                defaults.evolution.report_interval,
            ),
            dominance_threshold: parse(
                &lookup,
                "CM_DOMINANCE_THRESHOLD",
                defaults.evolution.dominance_threshold,
            ),
            seed: lookup("CM_SEED").and_then(|raw| match raw.trim().parse() {
                Ok(seed) => Some(seed),
                Err(_) => {
                    warn!(key = "CM_SEED", value = %raw, "invalid value; using entropy");
                    None
                }
            }),
        };

        let odd_cohort = match lookup("CM_ODD_COHORT").as_deref().map(str::trim) {
            Some("leave_one_out") | Some("leave-one-out") => OddCohortPolicy::LeaveOneOut,
            Some("reject") | None => OddCohortPolicy::Reject,
            Some(other) => {
                warn!(
                    key = "CM_ODD_COHORT",
                    value = other,
                    "unknown policy; rejecting odd cohorts"
                );
                OddCohortPolicy::Reject
            }
        };

        Self {
            scoring: ScoringConfig {
                boosts,
                base_weights: None,
            },
            evolution,
            odd_cohort,
        }
    }

    pub fn validate(&self) -> MatchResult<()> {
        let evolution = &self.evolution;
        if evolution.dominance_interval == 0 || evolution.report_interval == 0 {
            return Err(MatchError::InvalidConfig(
                "dominance and report intervals must be positive".into(),
            ));
        }
        if evolution.dominance_threshold >= 0.0 {
            return Err(MatchError::InvalidConfig(format!(
                "dominance threshold must be negative, got {}",
                evolution.dominance_threshold
            )));
        }

        let boosts = self.scoring.boosts;
        if boosts.first <= 0.0 || boosts.second <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "factor boosts must be positive".into(),
            ));
        }
        if let Some(weights) = &self.scoring.base_weights {
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(MatchError::InvalidConfig(
                    "base weights must be finite and non-negative".into(),
                ));
            }
        }
        Ok(())
    }
}
