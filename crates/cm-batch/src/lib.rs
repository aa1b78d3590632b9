use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use cm_common::{
    run_id, Identity, MatchError, MatchOutcome, MatcherConfig, MatchingEngine, OddCohortPolicy,
    PairScore, QuestionCatalog, Respondent,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Match(#[from] MatchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OddCohortArg {
    Reject,
    LeaveOneOut,
}

impl From<OddCohortArg> for OddCohortPolicy {
    fn from(value: OddCohortArg) -> Self {
        match value {
            OddCohortArg::Reject => OddCohortPolicy::Reject,
            OddCohortArg::LeaveOneOut => OddCohortPolicy::LeaveOneOut,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "cm-batch",
    about = "Pair a survey cohort into one-on-one matches with maximal total compatibility"
)]
pub struct Cli {
    /// JSON array of respondents (name, email, answers, first_factor, second_factor)
    #[arg(env = "CM_RESPONSES")]
    pub responses: PathBuf,

    /// JSON question catalog; the built-in 23-question survey when omitted
    #[arg(long, env = "CM_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Where to write the result document; stdout when omitted
    #[arg(long, short, env = "CM_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Agent steps (overrides CM_EVOLVE_STEPS)
    #[arg(long)]
    pub steps: Option<usize>,

    /// Prune dominated pairings every N steps (overrides CM_DOMINANCE_INTERVAL)
    #[arg(long)]
    pub dominance_interval: Option<usize>,

    /// Log progress every N steps (overrides CM_REPORT_INTERVAL)
    #[arg(long)]
    pub report_interval: Option<usize>,

    /// RNG seed for a reproducible run (overrides CM_SEED)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Policy for a cohort with an odd number of respondents (overrides CM_ODD_COHORT)
    #[arg(long, value_enum)]
    pub odd_cohort: Option<OddCohortArg>,

    /// Log the N most compatible pairs of the whole table before optimizing
    #[arg(long, default_value_t = 0)]
    pub top: usize,
}

impl Cli {
    /// Environment-derived config with command-line overrides applied.
    pub fn matcher_config(&self, mut base: MatcherConfig) -> MatcherConfig {
        let evolution = &mut base.evolution;
        if let Some(steps) = self.steps {
            evolution.steps = steps;
        }
        if let Some(interval) = self.dominance_interval {
            evolution.dominance_interval = interval;
        }
        if let Some(interval) = self.report_interval {
            evolution.report_interval = interval;
        }
        if let Some(seed) = self.seed {
            evolution.seed = Some(seed);
        }
        if let Some(policy) = self.odd_cohort {
            base.odd_cohort = policy.into();
        }
        base
    }
}

#[derive(Debug, Serialize)]
pub struct MatchDocument {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub respondents: usize,
    pub total_compatibility: f64,
    pub seed_compatibility: f64,
    pub matches: Vec<PairScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<Identity>,
}

impl MatchDocument {
    pub fn new(respondents: usize, outcome: MatchOutcome) -> Self {
        let mut matches = outcome.pairing.matches;
        matches.sort_by(|a, b| b.compatibility.total_cmp(&a.compatibility));

        Self {
            run_id: run_id::get().to_string(),
            generated_at: Utc::now(),
            respondents,
            total_compatibility: outcome.total_compatibility,
            seed_compatibility: outcome.seed_compatibility,
            matches,
            unmatched: outcome.pairing.unmatched,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, BatchError> {
    let raw = fs::read_to_string(path).map_err(|source| BatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| BatchError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Score, optimize and emit one cohort. Nothing is written unless every
/// step succeeds.
pub fn run(cli: &Cli, base: MatcherConfig) -> Result<MatchDocument, BatchError> {
    let config = cli.matcher_config(base);
    let catalog = match &cli.catalog {
        Some(path) => read_json::<QuestionCatalog>(path)?,
        None => QuestionCatalog::survey_default(),
    };
    let respondents: Vec<Respondent> = read_json(&cli.responses)?;

    info!(
        run_id = run_id::get(),
        respondents = respondents.len(),
        questions = catalog.len(),
        steps = config.evolution.steps,
        seed = ?config.evolution.seed,
        "starting match run"
    );

    let engine = MatchingEngine::new(catalog, config)?;
    let table = engine.score_table(&respondents)?;
    for pair in table.closest(cli.top) {
        info!(
            first = %pair.first,
            second = %pair.second,
            compatibility = pair.compatibility,
            "top pair"
        );
    }

    let outcome = engine.run_on_table(table)?;
    let document = MatchDocument::new(respondents.len(), outcome);
    let encoded = serde_json::to_string_pretty(&document)?;

    match &cli.output {
        Some(path) => {
            fs::write(path, encoded).map_err(|source| BatchError::Write {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), matches = document.matches.len(), "wrote matches");
        }
        None => {
            debug!("writing matches to stdout");
            println!("{encoded}");
        }
    }

    Ok(document)
}
