use log::info;
use snafu::{ensure, OptionExt};

use std::collections::HashSet;

use crate::ballot_log::{BallotLog, BallotStore};
use crate::catalog::{CandidateCatalog, CandidateSource};
use crate::config::{ElectionSettings, WipePolicy, CODE_COLUMN};
use crate::credentials::{CodeSet, CredentialStore};
use crate::errors::*;
use crate::Election;

/// Assembles an election.
///
/// The settings are checked when the builder is created; the code set, the
/// candidate source and the ballot store are plugged in afterwards.
///
/// ```
/// use ballot_box::builder::Builder;
/// use ballot_box::*;
///
/// let settings = ElectionSettings::new("ADMIN1", vec![Position::two_step("pozA")]);
/// let teams = Catalog::new(vec![(
///     "Team1".to_string(),
///     vec!["Alice".to_string(), "Bob".to_string()],
/// )]);
/// let election = Builder::new(settings)?
///     .codes(CodeSet::from_codes(&["AB12C"]))
///     .candidates(Box::new(StaticCandidates::new().with("pozA", teams)))
///     .store(Box::new(MemoryStore::new()))
///     .build()?;
///
/// let mut session = Session::new(&election);
/// session.login(&election, "AB12C")?;
/// session.choose_subcategory(&election, "pozA", "Team1")?;
/// session.choose_candidate(&election, "pozA", "Alice")?;
/// session.submit(&election)?;
/// assert_eq!(session.phase(), Phase::Submitted);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Builder {
    settings: ElectionSettings,
    codes: CodeSet,
    candidates: Option<Box<dyn CandidateSource>>,
    store: Option<Box<dyn BallotStore>>,
}

impl Builder {
    pub fn new(settings: ElectionSettings) -> Result<Builder, BuildError> {
        validate(&settings)?;
        Ok(Builder {
            settings,
            codes: CodeSet::Loaded(HashSet::new()),
            candidates: None,
            store: None,
        })
    }

    pub fn codes(self, codes: CodeSet) -> Builder {
        Builder { codes, ..self }
    }

    pub fn candidates(self, source: Box<dyn CandidateSource>) -> Builder {
        Builder {
            candidates: Some(source),
            ..self
        }
    }

    pub fn store(self, store: Box<dyn BallotStore>) -> Builder {
        Builder {
            store: Some(store),
            ..self
        }
    }

    pub fn build(self) -> Result<Election, BuildError> {
        let store = self.store.context(MissingStoreSnafu {})?;
        let source = self.candidates.context(MissingCandidatesSnafu {})?;
        let settings = self.settings;
        info!(
            "Builder: election with {} positions, {} voter codes",
            settings.positions.len(),
            self.codes.len()
        );
        let credentials = CredentialStore::new(
            self.codes,
            settings.admin_secret.clone(),
            settings.wipe_secret.clone(),
        );
        let catalogs = CandidateCatalog::new(source, settings.catalog_refresh);
        let log = BallotLog::new(&settings.positions, store);
        Ok(Election {
            settings,
            credentials,
            catalogs,
            log,
        })
    }
}

/// Checks the settings on their own, before any collaborator is plugged in.
pub fn validate(settings: &ElectionSettings) -> Result<(), BuildError> {
    ensure!(!settings.admin_secret.is_empty(), EmptyAdminSecretSnafu {});
    ensure!(!settings.positions.is_empty(), NoPositionsSnafu {});
    let mut seen: HashSet<&str> = HashSet::new();
    for pos in settings.positions.iter() {
        let name = pos.name.as_str();
        ensure!(
            !name.trim().is_empty() && name != CODE_COLUMN,
            ReservedPositionSnafu { name }
        );
        ensure!(seen.insert(name), DuplicatePositionSnafu { name });
    }
    ensure!(settings.top_n > 0, ZeroTopNSnafu {});
    if let WipePolicy::Clicks { steps } = settings.wipe_policy {
        ensure!(
            (1..=WipePolicy::MAX_STEPS).contains(&steps),
            WipeStepsSnafu {
                steps,
                max: WipePolicy::MAX_STEPS
            }
        );
    }
    Ok(())
}
