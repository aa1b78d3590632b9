use std::collections::HashSet;

use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use super::scoring::{PairScore, ScoreTable};
use crate::{
    error::{MatchError, MatchResult},
    survey::Identity,
};

/// What to do with a cohort that cannot be split into pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddCohortPolicy {
    /// Fail with `OddCohort`.
    #[default]
    Reject,
    /// Leave one randomly chosen respondent unmatched.
    LeaveOneOut,
}

/// A matching: no identity appears in more than one entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pairing {
    pub matches: Vec<PairScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<Identity>,
}

impl Pairing {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn total_compatibility(&self) -> f64 {
        self.matches.iter().map(|m| m.compatibility).sum()
    }

    /// True when every identity of `table` is matched exactly once, or left
    /// as the single `unmatched` respondent.
    pub fn covers(&self, table: &ScoreTable) -> bool {
        let mut seen = HashSet::new();
        let matched = self
            .matches
            .iter()
            .flat_map(|m| [&m.first, &m.second])
            .chain(self.unmatched.as_ref());

        for identity in matched {
            if !seen.insert(identity) {
                return false;
            }
        }

        seen.len() == table.identities().len()
            && table.identities().iter().all(|id| seen.contains(id))
    }

    /// Exchange partners between entries `i` (A-B) and `j` (C-D), giving
    /// A-C and B-D with their scores taken from `table`.
    pub fn swap_partners(&self, i: usize, j: usize, table: &ScoreTable) -> MatchResult<Pairing> {
        if i == j || i >= self.len() || j >= self.len() {
            return Ok(self.clone());
        }

        let (ab, cd) = (&self.matches[i], &self.matches[j]);
        let ac = table.lookup(&ab.first, &cd.first)?.clone();
        let bd = table.lookup(&ab.second, &cd.second)?.clone();

        let mut matches: Vec<PairScore> = self
            .matches
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != i && *k != j)
            .map(|(_, m)| m.clone())
            .collect();
        matches.push(ac);
        matches.push(bd);

        Ok(Pairing {
            matches,
            unmatched: self.unmatched.clone(),
        })
    }

    /// Swap partners between two randomly chosen entries.
    pub fn swap_random(&self, table: &ScoreTable, rng: &mut StdRng) -> MatchResult<Pairing> {
        if self.len() < 2 {
            return Ok(self.clone());
        }

        let i = rng.gen_range(0..self.len());
        let mut j = rng.gen_range(0..self.len() - 1);
        if j >= i {
            j += 1;
        }
        self.swap_partners(i, j, table)
    }

    /// Swap partners between the two least compatible entries.
    pub fn swap_worst(&self, table: &ScoreTable) -> MatchResult<Pairing> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            self.matches[a]
                .compatibility
                .total_cmp(&self.matches[b].compatibility)
        });

        match order.as_slice() {
            [worst, second_worst, ..] => self.swap_partners(*worst, *second_worst, table),
            _ => Ok(self.clone()),
        }
    }
}

/// Seed pairing: shuffle all table entries and greedily accept those whose
/// two respondents are both still free.
pub fn random_pairing(
    table: &ScoreTable,
    policy: OddCohortPolicy,
    rng: &mut StdRng,
) -> MatchResult<Pairing> {
    let identities = table.identities();
    let mut claimed: HashSet<&Identity> = HashSet::with_capacity(identities.len());

    let leftover = if identities.len() % 2 == 1 {
        match policy {
            OddCohortPolicy::Reject => return Err(MatchError::OddCohort(identities.len())),
            OddCohortPolicy::LeaveOneOut => identities.choose(rng),
        }
    } else {
        None
    };
    if let Some(leftover) = leftover {
        claimed.insert(leftover);
    }

    let mut entries: Vec<&PairScore> = table.entries().iter().collect();
    entries.shuffle(rng);

    let mut matches = Vec::with_capacity(identities.len() / 2);
    for entry in entries {
        if claimed.len() == identities.len() {
            break;
        }
        if claimed.contains(&entry.first) || claimed.contains(&entry.second) {
            continue;
        }
        claimed.insert(&entry.first);
        claimed.insert(&entry.second);
        matches.push(entry.clone());
    }

    let mut free = identities.iter().filter(|id| !claimed.contains(id));
    if let (Some(a), Some(b)) = (free.next(), free.next()) {
        return Err(MatchError::PairingNotFound(a.to_string(), b.to_string()));
    }

    Ok(Pairing {
        matches,
        unmatched: leftover.cloned(),
    })
}

/// Fitness: sum of compatibility over all matches.
pub fn total_compatibility(pairing: &Pairing) -> f64 {
    pairing.total_compatibility()
}

/// Agent: random partner swap on the first pick.
pub fn switch_random(
    picks: &[Pairing],
    table: &ScoreTable,
    rng: &mut StdRng,
) -> MatchResult<Pairing> {
    match picks.first() {
        Some(pairing) => pairing.swap_random(table, rng),
        None => Err(MatchError::EmptyPopulation),
    }
}

/// Agent: swap partners of the two weakest matches of the first pick.
pub fn switch_worst_partners(
    picks: &[Pairing],
    table: &ScoreTable,
    _rng: &mut StdRng,
) -> MatchResult<Pairing> {
    match picks.first() {
        Some(pairing) => pairing.swap_worst(table),
        None => Err(MatchError::EmptyPopulation),
    }
}
