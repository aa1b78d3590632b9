use crate::{
    error::{MatchError, MatchResult},
    survey::{QuestionCatalog, Respondent},
};

/// Multiplier for each respondent's most valued question.
pub const FIRST_FACTOR_BOOST: f64 = 3.5;
/// Multiplier for each respondent's second most valued question.
pub const SECOND_FACTOR_BOOST: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorBoosts {
    pub first: f64,
    pub second: f64,
}

impl Default for FactorBoosts {
    fn default() -> Self {
        Self {
            first: FIRST_FACTOR_BOOST,
            second: SECOND_FACTOR_BOOST,
        }
    }
}

impl FactorBoosts {
    /// Boosts of 1.0 leave the base weights untouched.
    pub const NEUTRAL: FactorBoosts = FactorBoosts {
        first: 1.0,
        second: 1.0,
    };
}

/// Per-pair question weights: base weights (uniform when absent) with both
/// respondents' most-valued questions boosted. Boosts compound when the two
/// respondents value the same question.
pub fn pair_weights(
    catalog: &QuestionCatalog,
    base_weights: Option<&[f64]>,
    boosts: FactorBoosts,
    a: &Respondent,
    b: &Respondent,
) -> MatchResult<Vec<f64>> {
    let mut weights = match base_weights {
        Some(base) if base.len() != catalog.len() => {
            return Err(MatchError::DimensionMismatch {
                respondent: "base_weights".into(),
                expected: catalog.len(),
                actual: base.len(),
            });
        }
        Some(base) => base.to_vec(),
        None => vec![1.0; catalog.len()],
    };

    for respondent in [a, b] {
        weights[catalog.index_of(&respondent.first_factor)?] *= boosts.first;
        weights[catalog.index_of(&respondent.second_factor)?] *= boosts.second;
    }

    Ok(weights)
}
