use log::debug;

use std::collections::HashMap;

use crate::ballot_log::BallotLog;
use crate::catalog::CatalogSnapshot;
use crate::config::{Ballot, Position};
use crate::errors::StoreResult;

/// The standing of one position.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Standing {
    /// No ballot has a choice for this position, and it has no candidates
    /// configured (or they could not be read).
    NoCandidates,
    /// Candidates are configured but nobody voted for this position yet.
    NoVotes,
    /// The leading candidates, most votes first.
    Ranked(Vec<(String, u64)>),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PositionTally {
    pub position: String,
    pub standing: Standing,
}

/// Counts the votes of a position, in order of first appearance in the ballots.
pub fn count_votes(ballots: &[Ballot], position: &str) -> Vec<(String, u64)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, u64)> = Vec::new();
    for cand in ballots.iter().filter_map(|b| b.choice(position)) {
        match index.get(cand) {
            Some(idx) => counts[*idx].1 += 1,
            None => {
                index.insert(cand, counts.len());
                counts.push((cand.to_string(), 1));
            }
        }
    }
    counts
}

/// The `n` candidates with the most votes. Ties keep the order of first
/// appearance in the ballots.
pub fn top_n(ballots: &[Ballot], position: &str, n: usize) -> Vec<(String, u64)> {
    let mut counts = count_votes(ballots, position);
    // Stable sort: the first-appearance order survives among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}

/// Read-only aggregation over the ballot log. Holds no state of its own:
/// every call reads the log again.
pub struct TallyEngine<'a> {
    log: &'a BallotLog,
}

impl<'a> TallyEngine<'a> {
    pub fn new(log: &'a BallotLog) -> TallyEngine<'a> {
        TallyEngine { log }
    }

    pub fn top_n(&self, position: &str, n: usize) -> StoreResult<Vec<(String, u64)>> {
        let ballots = self.log.all()?;
        Ok(top_n(&ballots, position, n))
    }

    /// The standing of every position, in configuration order.
    pub fn standings(
        &self,
        positions: &[Position],
        catalogs: &CatalogSnapshot,
        n: usize,
    ) -> StoreResult<Vec<PositionTally>> {
        let ballots = self.log.all()?;
        debug!("TallyEngine: {} ballots", ballots.len());
        let res = positions
            .iter()
            .map(|pos| {
                let leaders = top_n(&ballots, &pos.name, n);
                let has_candidates = catalogs
                    .catalog(&pos.name)
                    .map(|c| !c.is_empty())
                    .unwrap_or(false);
                let standing = if !leaders.is_empty() {
                    Standing::Ranked(leaders)
                } else if has_candidates {
                    Standing::NoVotes
                } else {
                    Standing::NoCandidates
                };
                PositionTally {
                    position: pos.name.clone(),
                    standing,
                }
            })
            .collect();
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot_log::MemoryStore;
    use crate::catalog::{Catalog, StaticCandidates};
    use crate::config::VoterCode;

    fn ballot(code: &str, a: &str) -> Ballot {
        Ballot {
            code: VoterCode::parse(code).unwrap(),
            choices: vec![("A".to_string(), a.to_string())],
        }
    }

    #[test]
    fn counts_and_ranks() {
        let ballots = vec![ballot("1", "X"), ballot("2", "X"), ballot("3", "Y")];
        assert_eq!(
            top_n(&ballots, "A", 2),
            vec![("X".to_string(), 2), ("Y".to_string(), 1)]
        );
        assert_eq!(top_n(&ballots, "A", 1), vec![("X".to_string(), 2)]);
        assert!(top_n(&ballots, "B", 7).is_empty());
    }

    #[test]
    fn ties_keep_first_appearance() {
        let ballots = vec![
            ballot("1", "Zed"),
            ballot("2", "Amy"),
            ballot("3", "Bob"),
            ballot("4", "Amy"),
            ballot("5", "Zed"),
        ];
        let expected = vec![
            ("Zed".to_string(), 2),
            ("Amy".to_string(), 2),
            ("Bob".to_string(), 1),
        ];
        assert_eq!(top_n(&ballots, "A", 7), expected);
        // Pure: the same input gives the same output.
        assert_eq!(top_n(&ballots, "A", 7), expected);
    }

    #[test]
    fn standings_distinguish_no_votes_from_no_candidates() {
        let positions = vec![Position::flat("A"), Position::flat("B"), Position::flat("C")];
        let log = BallotLog::new(&positions[..1], Box::new(MemoryStore::new()));
        let source = StaticCandidates::new()
            .with(
                "A",
                Catalog::new(vec![("all".to_string(), vec!["X".to_string()])]),
            )
            .with(
                "B",
                Catalog::new(vec![("all".to_string(), vec!["Y".to_string()])]),
            );
        let snap = CatalogSnapshot::take(&source, &positions);
        let engine = TallyEngine::new(&log);

        let empty = engine.standings(&positions, &snap, 7).unwrap();
        assert_eq!(empty[0].standing, Standing::NoVotes);
        assert_eq!(empty[1].standing, Standing::NoVotes);
        assert_eq!(empty[2].standing, Standing::NoCandidates);

        log.append(&ballot("1", "X")).unwrap();
        let after = engine.standings(&positions, &snap, 7).unwrap();
        assert_eq!(
            after[0].standing,
            Standing::Ranked(vec![("X".to_string(), 1)])
        );
        assert_eq!(after[1].standing, Standing::NoVotes);
        assert_eq!(engine.top_n("A", 3).unwrap(), vec![("X".to_string(), 1)]);
    }
}
