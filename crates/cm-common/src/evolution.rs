//! Population-based local search.
//!
//! An [`Evolution`] holds candidate solutions keyed by their fitness
//! [`Signature`]. Registered agents propose new candidates from randomly
//! drawn existing ones; candidates whose primary fitness trails the best by
//! more than the dominance threshold are pruned.
//!
//! The engine knows nothing about pairings: `S` is the solution type and `U`
//! the fixed universe agents consult (for matching, the score table).

use std::{cmp::Ordering, collections::BTreeMap};

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::{MatchError, MatchResult};

/// Default cut-off for near-domination: a candidate at least 0.05 below the
/// best primary fitness is dropped.
pub const DEFAULT_DOMINANCE_THRESHOLD: f64 = -0.05;

/// Ordered `(criterion, value)` evaluations of one solution.
#[derive(Debug, Clone)]
pub struct Signature(Vec<(String, f64)>);

impl Signature {
    /// Value of the first registered criterion.
    pub fn primary(&self) -> f64 {
        self.0.first().map(|(_, v)| *v).unwrap_or(f64::NEG_INFINITY)
    }
}

impl Ord for Signature {
    fn cmp(&self, other: &Self) -> Ordering {
        for ((name_a, a), (name_b, b)) in self.0.iter().zip(&other.0) {
            let ord = name_a.cmp(name_b).then_with(|| a.total_cmp(b));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for Signature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Signature {}

/// `q` is dominated by `p` when its primary fitness trails `p`'s by at least
/// `|threshold|`. Only the primary criterion takes part.
pub fn dominates(p: &Signature, q: &Signature, threshold: f64) -> bool {
    q.primary() - p.primary() <= threshold
}

/// Perturbation operator: builds one new solution from `picks` (as many as
/// the agent was registered with) and the shared universe.
pub trait Agent<S, U> {
    fn propose(&self, picks: &[S], universe: &U, rng: &mut StdRng) -> MatchResult<S>;
}

impl<S, U, F> Agent<S, U> for F
where
    F: Fn(&[S], &U, &mut StdRng) -> MatchResult<S>,
{
    fn propose(&self, picks: &[S], universe: &U, rng: &mut StdRng) -> MatchResult<S> {
        self(picks, universe, rng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub iteration: usize,
    pub population_size: usize,
    pub best_score: f64,
}

/// Receives periodic progress from [`Evolution::evolve`].
pub trait EvolutionObserver {
    fn on_status(&mut self, report: &StatusReport);
}

impl<F> EvolutionObserver for F
where
    F: FnMut(&StatusReport),
{
    fn on_status(&mut self, report: &StatusReport) {
        self(report)
    }
}

/// Logs progress as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl EvolutionObserver for TracingObserver {
    fn on_status(&mut self, report: &StatusReport) {
        info!(
            iteration = report.iteration,
            population = report.population_size,
            best_score = report.best_score,
            "evolution progress"
        );
    }
}

type FitnessFn<S> = Box<dyn Fn(&S) -> f64>;

struct RegisteredAgent<S, U> {
    name: String,
    picks: usize,
    agent: Box<dyn Agent<S, U>>,
}

pub struct Evolution<S, U> {
    universe: U,
    population: BTreeMap<Signature, S>,
    fitness: Vec<(String, FitnessFn<S>)>,
    agents: Vec<RegisteredAgent<S, U>>,
    dominance_threshold: f64,
    rng: StdRng,
    observer: Box<dyn EvolutionObserver>,
}

impl<S: Clone, U> Evolution<S, U> {
    pub fn new(universe: U) -> Self {
        Self {
            universe,
            population: BTreeMap::new(),
            fitness: Vec::new(),
            agents: Vec::new(),
            dominance_threshold: DEFAULT_DOMINANCE_THRESHOLD,
            rng: StdRng::from_entropy(),
            observer: Box::new(TracingObserver),
        }
    }

    /// Fixes the random stream so runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_dominance_threshold(mut self, threshold: f64) -> Self {
        self.dominance_threshold = threshold;
        self
    }

    pub fn with_observer(mut self, observer: impl EvolutionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn universe(&self) -> &U {
        &self.universe
    }

    pub fn size(&self) -> usize {
        self.population.len()
    }

    pub fn population(&self) -> impl Iterator<Item = (&Signature, &S)> {
        self.population.iter()
    }

    /// Register an objective. The first one registered drives pruning and
    /// best-solution selection.
    pub fn add_fitness_criterion(
        &mut self,
        name: impl Into<String>,
        criterion: impl Fn(&S) -> f64 + 'static,
    ) {
        self.fitness.push((name.into(), Box::new(criterion)));
    }

    /// Register an agent that consumes `picks` solutions per invocation.
    pub fn add_agent(
        &mut self,
        name: impl Into<String>,
        picks: usize,
        agent: impl Agent<S, U> + 'static,
    ) {
        self.agents.push(RegisteredAgent {
            name: name.into(),
            picks: picks.max(1),
            agent: Box::new(agent),
        });
    }

    pub fn evaluate(&self, solution: &S) -> MatchResult<Signature> {
        if self.fitness.is_empty() {
            return Err(MatchError::NoFitnessCriteria);
        }

        Ok(Signature(
            self.fitness
                .iter()
                .map(|(name, f)| (name.clone(), f(solution)))
                .collect(),
        ))
    }

    /// Evaluate and store a solution. An existing entry with an equal
    /// signature is replaced.
    pub fn add_solution(&mut self, solution: S) -> MatchResult<Signature> {
        let signature = self.evaluate(&solution)?;
        self.population.insert(signature.clone(), solution);
        Ok(signature)
    }

    /// Build a solution from the universe with the engine's own random
    /// stream and add it, so seeded runs stay reproducible end to end.
    pub fn add_generated_solution(
        &mut self,
        generate: impl FnOnce(&U, &mut StdRng) -> MatchResult<S>,
    ) -> MatchResult<Signature> {
        let solution = generate(&self.universe, &mut self.rng)?;
        self.add_solution(solution)
    }

    /// Draw `k` solutions uniformly, with replacement.
    fn random_solutions(&mut self, k: usize) -> Vec<S> {
        let all: Vec<&S> = self.population.values().collect();
        (0..k)
            .filter_map(|_| all.choose(&mut self.rng).map(|s| (*s).clone()))
            .collect()
    }

    fn run_agent(&mut self, index: usize) -> MatchResult<()> {
        let picks = self.random_solutions(self.agents[index].picks);
        let registered = &self.agents[index];
        let proposal = registered
            .agent
            .propose(&picks, &self.universe, &mut self.rng)?;
        let signature = self.add_solution(proposal)?;

        debug!(
            agent = self.agents[index].name.as_str(),
            primary = signature.primary(),
            "agent proposed solution"
        );
        Ok(())
    }

    /// Run `n` agent steps. Dominated solutions are pruned every
    /// `dominance_interval` steps and once at the end; every
    /// `report_interval` steps the observer gets a status report.
    pub fn evolve(
        &mut self,
        n: usize,
        dominance_interval: usize,
        report_interval: usize,
    ) -> MatchResult<()> {
        if dominance_interval == 0 || report_interval == 0 {
            return Err(MatchError::InvalidConfig(
                "dominance and report intervals must be positive".into(),
            ));
        }
        if self.agents.is_empty() {
            return Err(MatchError::NoAgents);
        }
        if self.population.is_empty() {
            return Err(MatchError::EmptyPopulation);
        }

        for i in 0..n {
            let pick = self.rng.gen_range(0..self.agents.len());
            self.run_agent(pick)?;

            if i % dominance_interval == 0 {
                self.remove_dominated();
            }

            if i % report_interval == 0 {
                self.remove_dominated();
                self.report(i)?;
            }
        }

        self.remove_dominated();
        Ok(())
    }

    fn report(&mut self, iteration: usize) -> MatchResult<()> {
        let best_score = self.best_solution()?.0.primary();
        let report = StatusReport {
            iteration,
            population_size: self.size(),
            best_score,
        };
        self.observer.on_status(&report);
        Ok(())
    }

    /// Drop every solution dominated by the current best.
    pub fn remove_dominated(&mut self) {
        let Some(best) = self.population.keys().map(Signature::primary).reduce(f64::max) else {
            return;
        };

        let threshold = self.dominance_threshold;
        self.population
            .retain(|signature, _| signature.primary() - best > threshold);
    }

    /// The solution with the highest primary fitness.
    pub fn best_solution(&self) -> MatchResult<(&Signature, &S)> {
        self.population
            .iter()
            .max_by(|(a, _), (b, _)| a.primary().total_cmp(&b.primary()))
            .ok_or(MatchError::EmptyPopulation)
    }
}
