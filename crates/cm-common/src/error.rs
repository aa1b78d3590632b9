use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("respondent {respondent} has {actual} answers but the catalog has {expected} questions")]
    DimensionMismatch {
        respondent: String,
        expected: usize,
        actual: usize,
    },
    #[error("unknown question: {0}")]
    UnknownQuestion(String),
    #[error("respondent {respondent} answered {value} outside the {min}..={max} scale")]
    AnswerOutOfRange {
        respondent: String,
        value: u8,
        min: u8,
        max: u8,
    },
    #[error("duplicate respondent: {0}")]
    DuplicateRespondent(String),
    #[error("no score-table entry for pair {0} / {1}")]
    PairingNotFound(String, String),
    #[error("population is empty")]
    EmptyPopulation,
    #[error("cohort of {0} respondents cannot be split into disjoint pairs")]
    OddCohort(usize),
    #[error("no fitness criteria registered")]
    NoFitnessCriteria,
    #[error("no agents registered")]
    NoAgents,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type MatchResult<T> = Result<T, MatchError>;
