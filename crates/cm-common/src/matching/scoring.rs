use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    similarity::weighted_cosine_similarity,
    weights::{pair_weights, FactorBoosts},
};
use crate::{
    error::{MatchError, MatchResult},
    survey::{Identity, Polarity, QuestionCatalog, Respondent},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoringConfig {
    pub boosts: FactorBoosts,
    /// Starting weights per question; uniform when `None`.
    pub base_weights: Option<Vec<f64>>,
}

/// Compatibility of one unordered pair. `first <= second` by identity order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub first: Identity,
    pub second: Identity,
    pub compatibility: f64,
}

impl PairScore {
    pub fn new(a: Identity, b: Identity, compatibility: f64) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first,
            second,
            compatibility,
        }
    }

    pub fn involves(&self, identity: &Identity) -> bool {
        &self.first == identity || &self.second == identity
    }
}

/// Score a pair with the survey's polarity and most-valued weighting.
pub fn score_compatibility(
    a: &Respondent,
    b: &Respondent,
    catalog: &QuestionCatalog,
    base_weights: Option<&[f64]>,
) -> MatchResult<PairScore> {
    let scorer = CompatibilityScorer::new(
        catalog.clone(),
        ScoringConfig {
            base_weights: base_weights.map(<[f64]>::to_vec),
            ..ScoringConfig::default()
        },
    );
    scorer.score(a, b)
}

pub struct CompatibilityScorer {
    catalog: QuestionCatalog,
    config: ScoringConfig,
}

impl CompatibilityScorer {
    pub fn new(catalog: QuestionCatalog, config: ScoringConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Weighted cosine similarity of the two answer vectors.
    ///
    /// The pair is put in identity order first and only the second
    /// respondent's answers are reflected on inverse questions, so the
    /// result does not depend on argument order.
    pub fn score(&self, a: &Respondent, b: &Respondent) -> MatchResult<PairScore> {
        self.catalog.validate(a)?;
        self.catalog.validate(b)?;

        let (a, b) = if a.identity <= b.identity { (a, b) } else { (b, a) };
        let scale = self.catalog.scale();

        let vec_a: Vec<f64> = a.answers.iter().map(|&v| f64::from(v)).collect();
        let vec_b: Vec<f64> = b
            .answers
            .iter()
            .enumerate()
            .map(|(i, &v)| match self.catalog.polarity(i) {
                Some(Polarity::Inverse) => f64::from(scale.reflect(v)),
                _ => f64::from(v),
            })
            .collect();

        let weights = pair_weights(
            &self.catalog,
            self.config.base_weights.as_deref(),
            self.config.boosts,
            a,
            b,
        )?;

        Ok(PairScore {
            first: a.identity.clone(),
            second: b.identity.clone(),
            compatibility: weighted_cosine_similarity(&vec_a, &vec_b, &weights),
        })
    }

    /// Score every unordered pair once (i < j in input order).
    pub fn build_score_table(&self, respondents: &[Respondent]) -> MatchResult<ScoreTable> {
        let mut positions = HashMap::with_capacity(respondents.len());
        for (i, respondent) in respondents.iter().enumerate() {
            if positions.insert(respondent.identity.clone(), i).is_some() {
                return Err(MatchError::DuplicateRespondent(
                    respondent.identity.to_string(),
                ));
            }
            self.catalog.validate(respondent)?;
        }

        let n = respondents.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect();

        let entries = pairs
            .par_iter()
            .map(|&(i, j)| self.score(&respondents[i], &respondents[j]))
            .collect::<MatchResult<Vec<_>>>()?;

        let index = pairs
            .into_iter()
            .enumerate()
            .map(|(k, pair)| (pair, k))
            .collect();

        tracing::debug!(respondents = n, pairs = entries.len(), "built score table");

        Ok(ScoreTable {
            identities: respondents.iter().map(|r| r.identity.clone()).collect(),
            positions,
            entries,
            index,
        })
    }
}

/// Every unordered pair's score for one cohort. Read-only once built.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    identities: Vec<Identity>,
    positions: HashMap<Identity, usize>,
    entries: Vec<PairScore>,
    index: HashMap<(usize, usize), usize>,
}

impl ScoreTable {
    /// Assemble a table from precomputed scores. Respondents are taken in
    /// first-seen order; the table need not be complete.
    pub fn from_scores(scores: Vec<PairScore>) -> MatchResult<Self> {
        let mut identities = Vec::new();
        let mut positions: HashMap<Identity, usize> = HashMap::new();
        let mut index = HashMap::with_capacity(scores.len());

        for (k, score) in scores.iter().enumerate() {
            if score.first == score.second {
                return Err(MatchError::DuplicateRespondent(score.first.to_string()));
            }

            let mut position_of = |identity: &Identity| {
                *positions.entry(identity.clone()).or_insert_with(|| {
                    identities.push(identity.clone());
                    identities.len() - 1
                })
            };
            let i = position_of(&score.first);
            let j = position_of(&score.second);

            if index.insert((i.min(j), i.max(j)), k).is_some() {
                return Err(MatchError::DuplicateRespondent(format!(
                    "{} / {}",
                    score.first, score.second
                )));
            }
        }

        Ok(Self {
            identities,
            positions,
            entries: scores,
            index,
        })
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn entries(&self) -> &[PairScore] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order-insensitive lookup of the pair `a`/`b`.
    pub fn lookup(&self, a: &Identity, b: &Identity) -> MatchResult<&PairScore> {
        let not_found = || MatchError::PairingNotFound(a.to_string(), b.to_string());

        let i = *self.positions.get(a).ok_or_else(not_found)?;
        let j = *self.positions.get(b).ok_or_else(not_found)?;

        self.index
            .get(&(i.min(j), i.max(j)))
            .map(|&k| &self.entries[k])
            .ok_or_else(not_found)
    }

    /// The `n` most compatible pairs, best first.
    pub fn closest(&self, n: usize) -> Vec<&PairScore> {
        let mut ranked: Vec<&PairScore> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.compatibility.total_cmp(&a.compatibility));
        ranked.truncate(n);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{AnswerScale, Question};

    fn catalog(polarities: &[Polarity]) -> QuestionCatalog {
        QuestionCatalog::new(
            polarities
                .iter()
                .enumerate()
                .map(|(i, &p)| Question::new(format!("q{i}"), format!("question {i}"), p))
                .collect(),
            AnswerScale::default(),
        )
    }

    fn respondent(name: &str, answers: Vec<u8>) -> Respondent {
        Respondent::new(name, format!("{name}@cohort"), answers, "q0", "q1")
    }

    fn neutral_scorer(catalog: QuestionCatalog) -> CompatibilityScorer {
        CompatibilityScorer::new(
            catalog,
            ScoringConfig {
                boosts: FactorBoosts::NEUTRAL,
                base_weights: None,
            },
        )
    }

    #[test]
    fn identical_answers_score_one_with_uniform_weights() {
        let scorer = neutral_scorer(catalog(&[Polarity::Direct; 3]));
        let a = respondent("a", vec![2, 5, 3]);
        let b = respondent("b", vec![2, 5, 3]);

        let score = scorer.score(&a, &b).unwrap();

        assert!((score.compatibility - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_question_rewards_opposite_answers() {
        let mixed = catalog(&[Polarity::Direct, Polarity::Inverse, Polarity::Direct]);
        let all_direct = catalog(&[Polarity::Direct; 3]);
        let a = respondent("a", vec![3, 1, 4]);
        let opposite = respondent("b", vec![3, 6, 4]);
        let same = respondent("b", vec![3, 1, 4]);

        let inverse_score = neutral_scorer(mixed).score(&a, &opposite).unwrap().compatibility;
        let direct_score = neutral_scorer(all_direct).score(&a, &same).unwrap().compatibility;

        assert!((inverse_score - direct_score).abs() < 1e-12);
        assert!((inverse_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_question_on_high_scale_does_not_overflow() {
        let catalog: QuestionCatalog = serde_json::from_str(
            r#"{
                "questions": [
                    {"key": "q0", "text": "", "polarity": "direct"},
                    {"key": "q1", "text": "", "polarity": "inverse"}
                ],
                "scale": {"min": 100, "max": 200}
            }"#,
        )
        .unwrap();
        let a = respondent("a", vec![150, 120]);
        let b = respondent("b", vec![150, 180]);

        let score = neutral_scorer(catalog).score(&a, &b).unwrap();

        assert!((score.compatibility - 1.0).abs() < 1e-12);
    }

    #[test]
    fn argument_order_does_not_change_score() {
        let scorer = CompatibilityScorer::new(
            catalog(&[Polarity::Inverse, Polarity::Direct, Polarity::Inverse]),
            ScoringConfig::default(),
        );
        let a = respondent("a", vec![2, 3, 5]);
        let b = respondent("b", vec![5, 4, 1]);

        assert_eq!(scorer.score(&a, &b).unwrap(), scorer.score(&b, &a).unwrap());
    }

    #[test]
    fn most_valued_question_moves_score_further() {
        let catalog = catalog(&[Polarity::Direct; 3]);
        let base = respondent("a", vec![1, 6, 6]);
        let changed = respondent("b", vec![6, 6, 6]);

        let uniform = neutral_scorer(catalog.clone())
            .score(&base, &changed)
            .unwrap()
            .compatibility;
        let boosted = CompatibilityScorer::new(catalog, ScoringConfig::default())
            .score(&base, &changed)
            .unwrap()
            .compatibility;

        assert!(boosted < uniform);
        assert!(1.0 - boosted > 1.0 - uniform);
    }

    #[test]
    fn mismatched_answer_count_is_rejected() {
        let scorer = neutral_scorer(catalog(&[Polarity::Direct; 3]));
        let a = respondent("a", vec![1, 2, 3]);
        let b = respondent("b", vec![1, 2]);

        assert!(matches!(
            scorer.score(&a, &b),
            Err(MatchError::DimensionMismatch { actual: 2, .. })
        ));
    }

    #[test]
    fn free_function_uses_default_boosts() {
        let catalog = catalog(&[Polarity::Direct; 3]);
        let a = respondent("a", vec![3, 3, 3]);
        let b = respondent("b", vec![6, 3, 3]);

        let via_fn = score_compatibility(&a, &b, &catalog, None).unwrap();
        let via_scorer = CompatibilityScorer::new(catalog, ScoringConfig::default())
            .score(&a, &b)
            .unwrap();

        assert_eq!(via_fn, via_scorer);
    }

    #[test]
    fn table_has_one_entry_per_unordered_pair() {
        let scorer =
            CompatibilityScorer::new(catalog(&[Polarity::Direct; 3]), ScoringConfig::default());
        let respondents: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .enumerate()
            .map(|(i, name)| respondent(name, vec![1 + i as u8, 3, 6 - i as u8]))
            .collect();

        let table = scorer.build_score_table(&respondents).unwrap();

        assert_eq!(table.len(), 10);
        assert!(table.entries().iter().all(|e| e.first != e.second));
        for a in &respondents {
            for b in &respondents {
                if a.identity != b.identity {
                    let entry = table.lookup(&a.identity, &b.identity).unwrap();
                    assert!(entry.involves(&a.identity) && entry.involves(&b.identity));
                }
            }
        }
    }

    #[test]
    fn table_rejects_duplicate_respondents() {
        let scorer = neutral_scorer(catalog(&[Polarity::Direct; 3]));
        let respondents = vec![respondent("a", vec![1, 2, 3]), respondent("a", vec![3, 2, 1])];

        assert!(matches!(
            scorer.build_score_table(&respondents),
            Err(MatchError::DuplicateRespondent(_))
        ));
    }

    #[test]
    fn lookup_of_missing_pair_is_an_error() {
        let a = Identity::new("a", "a@x");
        let b = Identity::new("b", "b@x");
        let c = Identity::new("c", "c@x");
        let table =
            ScoreTable::from_scores(vec![PairScore::new(a.clone(), b.clone(), 0.5)]).unwrap();

        assert!(table.lookup(&b, &a).is_ok());
        assert!(matches!(
            table.lookup(&a, &c),
            Err(MatchError::PairingNotFound(_, _))
        ));
    }

    #[test]
    fn closest_returns_best_pairs_first() {
        let ids: Vec<_> = ["a", "b", "c"].iter().map(|n| Identity::new(*n, "")).collect();
        let table = ScoreTable::from_scores(vec![
            PairScore::new(ids[0].clone(), ids[1].clone(), 0.2),
            PairScore::new(ids[0].clone(), ids[2].clone(), 0.9),
            PairScore::new(ids[1].clone(), ids[2].clone(), 0.5),
        ])
        .unwrap();

        let best: Vec<f64> = table.closest(2).iter().map(|p| p.compatibility).collect();

        assert_eq!(best, vec![0.9, 0.5]);
    }
}
