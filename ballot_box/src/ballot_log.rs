use log::{debug, info, warn};
use snafu::ensure;

use std::sync::{Mutex, MutexGuard};

use crate::config::{Ballot, Position, VoterCode, CODE_COLUMN};
use crate::errors::*;

/// Durable storage of the ballots.
///
/// Implementations only store. Uniqueness of the codes and completeness of
/// the ballots are enforced by `BallotLog`, which is the only caller.
///
/// A failed `append` or `erase` must leave the storage as it was before the
/// call.
pub trait BallotStore: Send {
    /// Nonexistent or empty storage means nobody has voted.
    fn has_voted(&self, code: &VoterCode) -> StoreResult<bool>;
    /// Adds one record after all the existing ones.
    fn append(&mut self, ballot: &Ballot) -> StoreResult<()>;
    /// All the records, in insertion order.
    fn all(&self) -> StoreResult<Vec<Ballot>>;
    /// Deletes every record.
    fn erase(&mut self) -> StoreResult<()>;
    /// The raw content, as downloaded by the admin.
    fn export(&self) -> StoreResult<Vec<u8>>;
}

/// Ballots kept in memory. Used for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    ballots: Vec<Ballot>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl BallotStore for MemoryStore {
    fn has_voted(&self, code: &VoterCode) -> StoreResult<bool> {
        Ok(self.ballots.iter().any(|b| b.code == *code))
    }

    fn append(&mut self, ballot: &Ballot) -> StoreResult<()> {
        self.ballots.push(ballot.clone());
        Ok(())
    }

    fn all(&self) -> StoreResult<Vec<Ballot>> {
        Ok(self.ballots.clone())
    }

    fn erase(&mut self) -> StoreResult<()> {
        self.ballots.clear();
        Ok(())
    }

    fn export(&self) -> StoreResult<Vec<u8>> {
        let mut columns: Vec<String> = vec![CODE_COLUMN.to_string()];
        for b in self.ballots.iter() {
            for (pos, _) in b.choices.iter() {
                if !columns.contains(pos) {
                    columns.push(pos.clone());
                }
            }
        }
        if self.ballots.is_empty() {
            return Ok(Vec::new());
        }
        let mut lines: Vec<String> = vec![columns.join(",")];
        for b in self.ballots.iter() {
            let row: Vec<&str> = columns
                .iter()
                .map(|col| {
                    if col == CODE_COLUMN {
                        b.code.as_str()
                    } else {
                        b.choice(col).unwrap_or("")
                    }
                })
                .collect();
            lines.push(row.join(","));
        }
        Ok(format!("{}\n", lines.join("\n")).into_bytes())
    }
}

/// The gate in front of the ballot storage.
///
/// Every access goes through one mutex, so that the "has this code voted"
/// check and the append form a single critical section, and an erase never
/// interleaves with an append.
pub struct BallotLog {
    positions: Vec<String>,
    store: Mutex<Box<dyn BallotStore>>,
}

impl BallotLog {
    pub fn new(positions: &[Position], store: Box<dyn BallotStore>) -> BallotLog {
        BallotLog {
            positions: positions.iter().map(|p| p.name.clone()).collect(),
            store: Mutex::new(store),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Box<dyn BallotStore>>> {
        self.store.lock().map_err(|_| StoreError::LockPoisoned {})
    }

    pub fn has_voted(&self, code: &VoterCode) -> StoreResult<bool> {
        self.lock()?.has_voted(code)
    }

    /// Records a ballot.
    ///
    /// The ballot must have a non-empty choice for every configured position.
    /// The code is checked again under the lock: a code that has voted in the
    /// meantime gets `CodeUsed` and nothing is written.
    pub fn append(&self, ballot: &Ballot) -> Result<(), LogError> {
        let missing: Vec<String> = self
            .positions
            .iter()
            .filter(|pos| ballot.choice(pos).is_none())
            .cloned()
            .collect();
        ensure!(missing.is_empty(), IncompleteSnafu { missing });

        let mut store = self.lock()?;
        if store.has_voted(&ballot.code)? {
            warn!("BallotLog: refused a second ballot for one code");
            return CodeUsedSnafu {}.fail();
        }
        store.append(ballot)?;
        debug!("BallotLog: recorded the ballot of {}", ballot.code);
        Ok(())
    }

    pub fn all(&self) -> StoreResult<Vec<Ballot>> {
        self.lock()?.all()
    }

    /// Irreversibly deletes every ballot.
    pub fn erase(&self) -> StoreResult<()> {
        let mut store = self.lock()?;
        store.erase()?;
        info!("BallotLog: all the ballots were erased");
        Ok(())
    }

    pub fn export(&self) -> StoreResult<Vec<u8>> {
        self.lock()?.export()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn ballot(code: &str, choices: &[(&str, &str)]) -> Ballot {
        Ballot {
            code: VoterCode::parse(code).unwrap(),
            choices: choices
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        }
    }

    fn log() -> BallotLog {
        BallotLog::new(
            &[Position::two_step("pozA"), Position::flat("pozB")],
            Box::new(MemoryStore::new()),
        )
    }

    #[test]
    fn empty_log_nobody_voted() {
        let log = log();
        assert!(!log.has_voted(&VoterCode::parse("AB12C").unwrap()).unwrap());
        assert!(log.all().unwrap().is_empty());
        assert!(log.export().unwrap().is_empty());
    }

    #[test]
    fn partial_ballot_is_never_written() {
        let log = log();
        let res = log.append(&ballot("AB12C", &[("pozA", "Alice"), ("pozB", "")]));
        match res {
            Err(LogError::Incomplete { missing }) => assert_eq!(missing, vec!["pozB"]),
            x => panic!("unexpected {:?}", x),
        }
        assert!(log.all().unwrap().is_empty());
        assert!(!log.has_voted(&VoterCode::parse("AB12C").unwrap()).unwrap());
    }

    #[test]
    fn one_ballot_per_code() {
        let log = log();
        log.append(&ballot("AB12C", &[("pozA", "Alice"), ("pozB", "Bob")]))
            .unwrap();
        let res = log.append(&ballot("AB12C", &[("pozA", "Bob"), ("pozB", "Bob")]));
        assert!(matches!(res, Err(LogError::CodeUsed {})));
        let all = log.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].choice("pozA"), Some("Alice"));
    }

    #[test]
    fn erase_empties_the_log() {
        let log = log();
        log.append(&ballot("AB12C", &[("pozA", "Alice"), ("pozB", "Bob")]))
            .unwrap();
        log.append(&ballot("XY34Z", &[("pozA", "Bob"), ("pozB", "Bob")]))
            .unwrap();
        log.erase().unwrap();
        assert!(log.all().unwrap().is_empty());
        assert!(!log.has_voted(&VoterCode::parse("AB12C").unwrap()).unwrap());
        // The code can be used again after a wipe.
        log.append(&ballot("AB12C", &[("pozA", "Bob"), ("pozB", "Bob")]))
            .unwrap();
        assert_eq!(log.all().unwrap().len(), 1);
    }

    #[test]
    fn memory_export_is_tabular() {
        let log = log();
        log.append(&ballot("AB12C", &[("pozA", "Alice"), ("pozB", "Bob")]))
            .unwrap();
        let out = String::from_utf8(log.export().unwrap()).unwrap();
        assert_eq!(out, "code,pozA,pozB\nAB12C,Alice,Bob\n");
    }

    #[test]
    fn concurrent_appends_same_code() {
        let log = Arc::new(log());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let cand = format!("Cand{}", i);
                    let b = ballot("AB12C", &[("pozA", cand.as_str()), ("pozB", "Bob")]);
                    barrier.wait();
                    log.append(&b).is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(log.all().unwrap().len(), 1);
    }

    #[test]
    fn erase_and_appends_do_not_interleave() {
        let log = Arc::new(log());
        let barrier = Arc::new(Barrier::new(9));
        let appenders: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    (0..20)
                        .filter(|j| {
                            let code = format!("C{}x{}", i, j);
                            let b = ballot(&code, &[("pozA", "Alice"), ("pozB", "Bob")]);
                            log.append(&b).is_ok()
                        })
                        .count()
                })
            })
            .collect();
        let eraser = {
            let log = log.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..5 {
                    log.erase().unwrap();
                    thread::yield_now();
                }
            })
        };
        let appended: usize = appenders.into_iter().map(|h| h.join().unwrap()).sum();
        eraser.join().unwrap();
        assert_eq!(appended, 160);

        let all = log.all().unwrap();
        assert!(all.len() <= 160);
        for i in 0..8 {
            for j in 0..20 {
                let code = VoterCode::parse(&format!("C{}x{}", i, j)).unwrap();
                let listed = all.iter().filter(|b| b.code == code).count();
                assert!(listed <= 1);
                assert_eq!(log.has_voted(&code).unwrap(), listed == 1);
            }
        }
        assert!(all
            .iter()
            .all(|b| b.choice("pozA") == Some("Alice") && b.choice("pozB") == Some("Bob")));

        log.erase().unwrap();
        assert!(log.all().unwrap().is_empty());
    }
}
