use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};

/// Name + email of a respondent. Unique within one run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Respondent {
    #[serde(flatten)]
    pub identity: Identity,
    /// One answer per catalog question, in catalog order.
    pub answers: Vec<u8>,
    /// Topic key of the question this respondent values most.
    pub first_factor: String,
    /// Topic key of the runner-up question.
    pub second_factor: String,
}

impl Respondent {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        answers: Vec<u8>,
        first_factor: impl Into<String>,
        second_factor: impl Into<String>,
    ) -> Self {
        Self {
            identity: Identity::new(name, email),
            answers,
            first_factor: first_factor.into(),
            second_factor: second_factor.into(),
        }
    }
}

/// Whether agreement or complementarity on a question signals compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Direct,
    Inverse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Short topic key, e.g. `"Politics"`. Used to name most-valued picks.
    pub key: String,
    pub text: String,
    pub polarity: Polarity,
}

impl Question {
    pub fn new(key: impl Into<String>, text: impl Into<String>, polarity: Polarity) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            polarity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerScale {
    pub min: u8,
    pub max: u8,
}

impl Default for AnswerScale {
    fn default() -> Self {
        Self { min: 1, max: 6 }
    }
}

impl AnswerScale {
    pub fn contains(&self, value: u8) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Mirror a value across the scale: on 1..=6, 1 <-> 6, 2 <-> 5, 3 <-> 4.
    /// Values off the scale are clamped to it first.
    pub fn reflect(&self, value: u8) -> u8 {
        let value = value.clamp(self.min, self.max.max(self.min));
        self.max.saturating_sub(value - self.min)
    }

    /// A scale must start at 1 or above and not be inverted.
    pub fn validate(&self) -> MatchResult<()> {
        if self.min == 0 || self.min > self.max {
            return Err(MatchError::InvalidConfig(format!(
                "answer scale {}..={} must satisfy 1 <= min <= max",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Ordered question catalog. Position `i` is the answer index `i` for every respondent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
    #[serde(default)]
    scale: AnswerScale,
}

impl QuestionCatalog {
    pub fn new(questions: Vec<Question>, scale: AnswerScale) -> Self {
        Self { questions, scale }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn scale(&self) -> AnswerScale {
        self.scale
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn polarity(&self, index: usize) -> Option<Polarity> {
        self.questions.get(index).map(|q| q.polarity)
    }

    pub fn index_of(&self, key: &str) -> MatchResult<usize> {
        self.questions
            .iter()
            .position(|q| q.key == key)
            .ok_or_else(|| MatchError::UnknownQuestion(key.to_string()))
    }

    /// Checks answer count, answer range and most-valued picks of one respondent.
    pub fn validate(&self, respondent: &Respondent) -> MatchResult<()> {
        self.scale.validate()?;
        if respondent.answers.len() != self.len() {
            return Err(MatchError::DimensionMismatch {
                respondent: respondent.identity.to_string(),
                expected: self.len(),
                actual: respondent.answers.len(),
            });
        }

        if let Some(&value) = respondent.answers.iter().find(|v| !self.scale.contains(**v)) {
            return Err(MatchError::AnswerOutOfRange {
                respondent: respondent.identity.to_string(),
                value,
                min: self.scale.min,
                max: self.scale.max,
            });
        }

        self.index_of(&respondent.first_factor)?;
        self.index_of(&respondent.second_factor)?;
        Ok(())
    }

    /// The survey the cohort answered: 23 statements on a 1..=6 agree scale.
    pub fn survey_default() -> Self {
        use Polarity::{Direct, Inverse};

        let entries: [(&str, &str, Polarity); 23] = [
            ("Conversation Starter", "I usually find myself starting conversations", Inverse),
            ("Extraversion", "My ideal evening after a busy day is going to a party", Direct),
            ("Clinginess", "I need to be around someone constantly to feel close to them", Direct),
            ("Deep Conversations", "I enjoy having deep conversations", Direct),
            ("Introspection", "I like to reflect on the state of my life often", Direct),
            ("Materialism", "I value my material possessions", Direct),
            ("Politics", "Political beliefs (disagree = left, agree = right)", Direct),
            ("Structure", "I prefer to make plans rather than deciding in the moment", Direct),
            (
                "Judgementalness",
                "I consider myself to be open-minded to people different than me",
                Direct,
            ),
            ("Optimism", "I tend to see the glass half full", Direct),
            ("Altruism", "I will help someone else even if it's at my own detriment", Direct),
            ("Spontaneity", "I enjoy trying new things outside of my comfort zone", Direct),
            ("Money", "I prefer expensive activities or experiences over saving money", Direct),
            (
                "Sentimentality",
                "The monetary value of a gift matters more than the sentimentality",
                Direct,
            ),
            ("Career", "I am most motivated by professional achievements", Direct),
            (
                "Confrontation",
                "If I'm angry at a friend, I prefer to confront them in person",
                Direct,
            ),
            ("Openness", "I find it easy to open up to new people about my personal life", Direct),
            ("Energy", "I prefer low energy activities", Direct),
            (
                "Control",
                "I prefer to be in charge of plans rather than letting someone else take the reins",
                Inverse,
            ),
            ("Mistakes", "If I make a mistake, my first instinct is to laugh about it", Direct),
            ("Dark Humor", "I have a dark sense of humor", Direct),
            ("Listening", "I like to listen rather than share my thoughts", Inverse),
            ("Temper", "I have a short temper", Direct),
        ];

        let questions = entries
            .into_iter()
            .map(|(key, text, polarity)| Question::new(key, text, polarity))
            .collect();

        Self::new(questions, AnswerScale::default())
    }
}
