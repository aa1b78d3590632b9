use serde::Serialize;
use tracing::info;

use super::{
    pairing::{random_pairing, switch_random, switch_worst_partners, total_compatibility, Pairing},
    scoring::{CompatibilityScorer, ScoreTable},
};
use crate::{
    config::MatcherConfig,
    error::MatchResult,
    evolution::{Evolution, EvolutionObserver, TracingObserver},
    survey::{QuestionCatalog, Respondent},
};

pub const TOTAL_COMPATIBILITY: &str = "total_compatibility";
pub const SWITCH_RANDOM: &str = "switch random";
pub const SWITCH_WORST_PARTNERS: &str = "switch worst partners";

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub pairing: Pairing,
    pub total_compatibility: f64,
    pub seed_compatibility: f64,
    pub population_size: usize,
}

pub struct MatchingEngine {
    scorer: CompatibilityScorer,
    config: MatcherConfig,
}

impl MatchingEngine {
    pub fn new(catalog: QuestionCatalog, config: MatcherConfig) -> MatchResult<Self> {
        config.validate()?;
        catalog.scale().validate()?;
        Ok(Self {
            scorer: CompatibilityScorer::new(catalog, config.scoring.clone()),
            config,
        })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn score_table(&self, respondents: &[Respondent]) -> MatchResult<ScoreTable> {
        self.scorer.build_score_table(respondents)
    }

    /// Engine with the total-compatibility criterion and both swap agents
    /// registered, but no solutions yet.
    pub fn optimizer(&self, table: ScoreTable) -> Evolution<Pairing, ScoreTable> {
        let settings = &self.config.evolution;
        let mut evo = Evolution::new(table).with_dominance_threshold(settings.dominance_threshold);
        if let Some(seed) = settings.seed {
            evo = evo.with_seed(seed);
        }

        evo.add_fitness_criterion(TOTAL_COMPATIBILITY, total_compatibility);
        evo.add_agent(SWITCH_RANDOM, 1, switch_random);
        evo.add_agent(SWITCH_WORST_PARTNERS, 1, switch_worst_partners);
        evo
    }

    /// Score the cohort and search for the most compatible pairing.
    pub fn run(&self, respondents: &[Respondent]) -> MatchResult<MatchOutcome> {
        self.run_with_observer(respondents, TracingObserver)
    }

    pub fn run_with_observer(
        &self,
        respondents: &[Respondent],
        observer: impl EvolutionObserver + 'static,
    ) -> MatchResult<MatchOutcome> {
        let table = self.score_table(respondents)?;
        self.run_with_observer_on_table(table, observer)
    }

    /// Search over an already scored cohort.
    pub fn run_on_table(&self, table: ScoreTable) -> MatchResult<MatchOutcome> {
        self.run_with_observer_on_table(table, TracingObserver)
    }

    pub fn run_with_observer_on_table(
        &self,
        table: ScoreTable,
        observer: impl EvolutionObserver + 'static,
    ) -> MatchResult<MatchOutcome> {
        info!(
            respondents = table.identities().len(),
            pairs = table.len(),
            "scored cohort"
        );

        let mut evo = self.optimizer(table).with_observer(observer);
        let odd_cohort = self.config.odd_cohort;
        let seed = evo.add_generated_solution(|table, rng| random_pairing(table, odd_cohort, rng))?;

        self.finish(evo, seed.primary())
    }

    /// Search starting from a caller-supplied pairing.
    pub fn optimize_from(&self, table: ScoreTable, start: Pairing) -> MatchResult<MatchOutcome> {
        let mut evo = self.optimizer(table);
        let seed = evo.add_solution(start)?;
        self.finish(evo, seed.primary())
    }

    fn finish(
        &self,
        mut evo: Evolution<Pairing, ScoreTable>,
        seed_compatibility: f64,
    ) -> MatchResult<MatchOutcome> {
        let settings = &self.config.evolution;
        evo.evolve(
            settings.steps,
            settings.dominance_interval,
            settings.report_interval,
        )?;

        let (signature, best) = evo.best_solution()?;
        let outcome = MatchOutcome {
            pairing: best.clone(),
            total_compatibility: signature.primary(),
            seed_compatibility,
            population_size: evo.size(),
        };

        info!(
            matches = outcome.pairing.len(),
            total_compatibility = outcome.total_compatibility,
            seed_compatibility,
            population = outcome.population_size,
            "optimization finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EvolutionConfig,
        error::MatchError,
        matching::{pairing::OddCohortPolicy, scoring::PairScore},
        survey::{AnswerScale, Identity, Polarity, Question},
    };

    fn seeded_config(steps: usize) -> MatcherConfig {
        MatcherConfig {
            evolution: EvolutionConfig {
                steps,
                dominance_interval: 10,
                report_interval: 1_000,
                seed: Some(2024),
                ..EvolutionConfig::default()
            },
            ..MatcherConfig::default()
        }
    }

    fn one_question_catalog() -> QuestionCatalog {
        QuestionCatalog::new(
            vec![Question::new("q0", "only question", Polarity::Direct)],
            AnswerScale::default(),
        )
    }

    /// A,B agree; C,D agree; every cross pair is opposed.
    fn polarized_table() -> (Vec<Identity>, ScoreTable) {
        let ids: Vec<Identity> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| Identity::new(*n, format!("{n}@cohort")))
            .collect();
        let score = |a: usize, b: usize, c: f64| PairScore::new(ids[a].clone(), ids[b].clone(), c);
        let table = ScoreTable::from_scores(vec![
            score(0, 1, 1.0),
            score(2, 3, 1.0),
            score(0, 2, -1.0),
            score(0, 3, -1.0),
            score(1, 2, -1.0),
            score(1, 3, -1.0),
        ])
        .unwrap();
        (ids, table)
    }

    #[test]
    fn converges_from_worst_pairing_with_random_swaps() {
        let (ids, table) = polarized_table();
        let start = Pairing {
            matches: vec![
                table.lookup(&ids[0], &ids[2]).unwrap().clone(),
                table.lookup(&ids[1], &ids[3]).unwrap().clone(),
            ],
            unmatched: None,
        };
        let engine = MatchingEngine::new(one_question_catalog(), seeded_config(200)).unwrap();

        let mut evo = Evolution::new(table).with_seed(5);
        evo.add_fitness_criterion(TOTAL_COMPATIBILITY, total_compatibility);
        evo.add_agent(SWITCH_RANDOM, 1, switch_random);
        evo.add_solution(start.clone()).unwrap();
        assert_eq!(evo.best_solution().unwrap().0.primary(), -2.0);

        evo.evolve(200, 10, 1_000).unwrap();
        let (signature, best) = evo.best_solution().unwrap();

        assert_eq!(signature.primary(), 2.0);
        assert!(best.covers(evo.universe()));
        assert!(best.matches.contains(evo.universe().lookup(&ids[0], &ids[1]).unwrap()));

        let (_, table) = polarized_table();
        let outcome = engine.optimize_from(table, start).unwrap();
        assert_eq!(outcome.seed_compatibility, -2.0);
        assert_eq!(outcome.total_compatibility, 2.0);
    }

    #[test]
    fn run_pairs_like_minded_respondents() {
        let catalog = QuestionCatalog::new(
            (0..4)
                .map(|i| Question::new(format!("q{i}"), "", Polarity::Direct))
                .collect(),
            AnswerScale::default(),
        );
        let respondents = vec![
            Respondent::new("ann", "ann@x", vec![1, 1, 6, 6], "q0", "q1"),
            Respondent::new("bob", "bob@x", vec![6, 6, 1, 1], "q0", "q1"),
            Respondent::new("cat", "cat@x", vec![1, 2, 6, 5], "q0", "q1"),
            Respondent::new("dan", "dan@x", vec![6, 5, 1, 2], "q0", "q1"),
        ];
        let engine = MatchingEngine::new(catalog, seeded_config(100)).unwrap();

        let outcome = engine.run(&respondents).unwrap();
        let pairs: Vec<(&str, &str)> = outcome
            .pairing
            .matches
            .iter()
            .map(|m| (m.first.name.as_str(), m.second.name.as_str()))
            .collect();

        assert_eq!(outcome.pairing.len(), 2);
        assert!(pairs.contains(&("ann", "cat")));
        assert!(pairs.contains(&("bob", "dan")));
        assert!(outcome.total_compatibility >= outcome.seed_compatibility);
    }

    #[test]
    fn run_on_prebuilt_table_matches_full_run() {
        let catalog = QuestionCatalog::new(
            (0..3)
                .map(|i| Question::new(format!("q{i}"), "", Polarity::Direct))
                .collect(),
            AnswerScale::default(),
        );
        let respondents: Vec<_> = (0..6u8)
            .map(|i| {
                let answers = vec![1 + i, 6 - i, 1 + (i * 2) % 6];
                Respondent::new(format!("r{i}"), "", answers, "q0", "q2")
            })
            .collect();
        let engine = MatchingEngine::new(catalog, seeded_config(300)).unwrap();

        let direct = engine.run(&respondents).unwrap();
        let table = engine.score_table(&respondents).unwrap();
        let reused = engine.run_on_table(table).unwrap();

        assert_eq!(reused.pairing, direct.pairing);
        assert_eq!(reused.total_compatibility, direct.total_compatibility);
        assert_eq!(reused.seed_compatibility, direct.seed_compatibility);
    }

    #[test]
    fn inverted_catalog_scale_is_rejected_up_front() {
        let catalog = QuestionCatalog::new(
            vec![Question::new("q0", "only question", Polarity::Inverse)],
            AnswerScale { min: 6, max: 1 },
        );

        assert!(matches!(
            MatchingEngine::new(catalog, MatcherConfig::default()),
            Err(MatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn odd_cohort_fails_before_search() {
        let catalog = one_question_catalog();
        let respondents: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| Respondent::new(*n, "", vec![3], "q0", "q0"))
            .collect();
        let engine = MatchingEngine::new(catalog, seeded_config(10)).unwrap();

        assert_eq!(engine.run(&respondents).unwrap_err(), MatchError::OddCohort(3));
    }

    #[test]
    fn odd_cohort_leave_one_out_runs() {
        let catalog = one_question_catalog();
        let respondents: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .enumerate()
            .map(|(i, n)| Respondent::new(*n, "", vec![1 + i as u8], "q0", "q0"))
            .collect();
        let config = MatcherConfig {
            odd_cohort: OddCohortPolicy::LeaveOneOut,
            ..seeded_config(50)
        };
        let engine = MatchingEngine::new(catalog, config).unwrap();

        let outcome = engine.run(&respondents).unwrap();

        assert_eq!(outcome.pairing.len(), 2);
        assert!(outcome.pairing.unmatched.is_some());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = MatcherConfig::default();
        config.evolution.dominance_interval = 0;

        assert!(matches!(
            MatchingEngine::new(one_question_catalog(), config),
            Err(MatchError::InvalidConfig(_))
        ));
    }
}
