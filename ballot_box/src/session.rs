use log::{debug, info, warn};
use snafu::{ensure, OptionExt, ResultExt};

use std::sync::Arc;

use crate::catalog::CatalogSnapshot;
use crate::config::{Ballot, SelectionMode, VoterCode};
use crate::credentials::Resolution;
use crate::errors::*;
use crate::tally::PositionTally;
use crate::wipe::{WipeProtocol, WipeState, WipeStep};
use crate::Election;

/// Where a session stands.
///
/// ```text
/// LoggedOut --login(voter)--> Voting --submit--> Submitted --new session--> LoggedOut
/// LoggedOut --login(admin)--> [AdminPending --unlock-->] AdminUnlocked --logout--> LoggedOut
/// ```
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Phase {
    LoggedOut,
    Voting,
    Submitted,
    /// The admin secret was accepted once and must be entered again.
    AdminPending,
    AdminUnlocked,
}

/// The in-progress choice of a voter for one position.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PendingSelection {
    pub subcategory: Option<String>,
    pub candidate: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// The state of one user at one terminal.
///
/// A session holds everything bound to the user (phase, code, selections,
/// candidate snapshot, wipe confirmation) and nothing else: all the
/// coordination between sessions goes through the ballot log of the
/// `Election` passed to each operation.
#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    code: Option<VoterCode>,
    selections: Vec<(String, PendingSelection)>,
    catalogs: Option<Arc<CatalogSnapshot>>,
    wipe: WipeProtocol,
    receipt: Option<Ballot>,
}

impl Session {
    pub fn new(election: &Election) -> Session {
        Session {
            phase: Phase::LoggedOut,
            code: None,
            selections: Vec::new(),
            catalogs: None,
            wipe: WipeProtocol::new(election.settings().wipe_policy),
            receipt: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The code this session is voting with.
    pub fn code(&self) -> Option<&VoterCode> {
        self.code.as_ref()
    }

    /// The candidate lists this voting session works with.
    pub fn catalogs(&self) -> Option<&CatalogSnapshot> {
        self.catalogs.as_deref()
    }

    pub fn selection(&self, position: &str) -> Option<&PendingSelection> {
        self.selections
            .iter()
            .find(|(pos, _)| pos == position)
            .map(|(_, sel)| sel)
    }

    pub fn wipe_state(&self) -> WipeState {
        self.wipe.state()
    }

    /// The ballot recorded by this session, once submitted.
    pub fn receipt(&self) -> Option<&Ballot> {
        self.receipt.as_ref()
    }

    fn require(&self, phase: Phase, action: &str) -> Result<(), SessionError> {
        ensure!(
            self.phase == phase,
            WrongPhaseSnafu {
                action,
                phase: self.phase
            }
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.phase = Phase::LoggedOut;
        self.code = None;
        self.selections.clear();
        self.catalogs = None;
        self.wipe.cancel();
        self.receipt = None;
    }

    // ******** Login ********

    pub fn login(&mut self, election: &Election, raw: &str) -> Result<Phase, SessionError> {
        self.require(Phase::LoggedOut, "log in")?;
        match election.credentials().resolve(raw) {
            Resolution::Admin => {
                self.phase = if election.settings().require_admin_reentry {
                    Phase::AdminPending
                } else {
                    Phase::AdminUnlocked
                };
                info!("Session: admin login, now {:?}", self.phase);
            }
            Resolution::Voter(code) => {
                if election.log().has_voted(&code).context(StorageSnafu {})? {
                    warn!("Session: refused login of a code that already voted");
                    return AlreadyVotedSnafu {}.fail();
                }
                let positions = &election.settings().positions;
                self.selections = positions
                    .iter()
                    .map(|p| (p.name.clone(), PendingSelection::default()))
                    .collect();
                self.catalogs = Some(election.snapshot());
                debug!("Session: voter {} logged in", code);
                self.code = Some(code);
                self.phase = Phase::Voting;
                info!("Session: voter login, now {:?}", self.phase);
            }
            Resolution::Invalid if !election.credentials().codes_available() => {
                warn!("Session: login attempted while the voter codes are unavailable");
                return CodesUnavailableSnafu {}.fail();
            }
            Resolution::Invalid => {
                return InvalidCodeSnafu {}.fail();
            }
        }
        Ok(self.phase)
    }

    /// The second entry of the admin secret, when the election requires it.
    /// A wrong secret logs the session out.
    pub fn unlock_admin(&mut self, election: &Election, raw: &str) -> Result<Phase, SessionError> {
        self.require(Phase::AdminPending, "unlock the dashboard")?;
        if !election.credentials().is_admin_secret(raw) {
            warn!("Session: wrong admin secret at re-entry");
            self.reset();
            return WrongAdminSecretSnafu {}.fail();
        }
        self.phase = Phase::AdminUnlocked;
        info!("Session: admin dashboard unlocked");
        Ok(self.phase)
    }

    // ******** Ballot composition ********

    fn pending_mut(
        &mut self,
        election: &Election,
        position: &str,
    ) -> Result<(SelectionMode, &mut PendingSelection), SessionError> {
        let mode = election
            .settings()
            .position(position)
            .context(UnknownPositionSnafu { position })?
            .mode;
        let sel = self
            .selections
            .iter_mut()
            .find(|(pos, _)| pos == position)
            .map(|(_, sel)| sel)
            .context(UnknownPositionSnafu { position })?;
        Ok((mode, sel))
    }

    /// Picks (or clears, with an empty value) the subcategory of a two-step
    /// position. The candidate is dropped if it is not in the new subcategory.
    pub fn choose_subcategory(
        &mut self,
        election: &Election,
        position: &str,
        subcategory: &str,
    ) -> Result<(), SessionError> {
        self.require(Phase::Voting, "choose a sub-category")?;
        let catalogs = self.catalogs.clone();
        let (mode, sel) = self.pending_mut(election, position)?;
        ensure!(mode == SelectionMode::TwoStep, FlatPositionSnafu { position });
        let value = non_empty(subcategory);
        if let Some(sub) = value.as_deref() {
            let catalog = catalogs
                .as_deref()
                .and_then(|c| c.catalog(position))
                .context(PositionUnavailableSnafu { position })?;
            let cands = catalog.candidates(sub).context(UnknownChoiceSnafu {
                position,
                choice: sub,
            })?;
            if let Some(cand) = sel.candidate.as_ref() {
                if !cands.contains(cand) {
                    sel.candidate = None;
                }
            }
        } else {
            sel.candidate = None;
        }
        sel.subcategory = value;
        Ok(())
    }

    /// Picks (or clears, with an empty value) the candidate of a position.
    pub fn choose_candidate(
        &mut self,
        election: &Election,
        position: &str,
        candidate: &str,
    ) -> Result<(), SessionError> {
        self.require(Phase::Voting, "choose a candidate")?;
        let catalogs = self.catalogs.clone();
        let (mode, sel) = self.pending_mut(election, position)?;
        let value = non_empty(candidate);
        if let Some(cand) = value.as_deref() {
            let catalog = catalogs
                .as_deref()
                .and_then(|c| c.catalog(position))
                .context(PositionUnavailableSnafu { position })?;
            let listed = match mode {
                SelectionMode::Flat => catalog.contains(cand),
                SelectionMode::TwoStep => {
                    let sub = sel
                        .subcategory
                        .as_deref()
                        .context(SubcategoryFirstSnafu { position })?;
                    catalog
                        .candidates(sub)
                        .map(|cands| cands.iter().any(|c| c == cand))
                        .unwrap_or(false)
                }
            };
            ensure!(
                listed,
                UnknownChoiceSnafu {
                    position,
                    choice: cand
                }
            );
        }
        sel.candidate = value;
        Ok(())
    }

    /// Checks every position against the snapshot and assembles the ballot.
    /// All the problems are reported at once.
    fn compose(&self, election: &Election, code: &VoterCode) -> Result<Ballot, SessionError> {
        let mut problems: Vec<String> = Vec::new();
        let mut choices: Vec<(String, String)> = Vec::new();
        let empty = PendingSelection::default();
        for pos in election.settings().positions.iter() {
            let name = pos.name.as_str();
            let sel = self.selection(name).unwrap_or(&empty);
            let catalog = match self.catalogs.as_deref().and_then(|c| c.catalog(name)) {
                Some(catalog) if !catalog.is_empty() => catalog,
                _ => {
                    problems.push(format!("No candidates available for {}", name));
                    continue;
                }
            };
            let listed: Vec<&str> = match pos.mode {
                SelectionMode::Flat => catalog.pooled(),
                SelectionMode::TwoStep => match sel.subcategory.as_deref() {
                    None => {
                        problems.push(format!("Choose sub-category for {}", name));
                        continue;
                    }
                    Some(sub) => match catalog.candidates(sub) {
                        Some(cands) => cands.iter().map(|c| c.as_str()).collect(),
                        None => {
                            problems.push(format!("Unknown sub-category {} for {}", sub, name));
                            continue;
                        }
                    },
                },
            };
            match sel.candidate.as_deref() {
                None => problems.push(format!("Choose candidate for {}", name)),
                Some(cand) if !listed.contains(&cand) => {
                    problems.push(format!("Unknown candidate {} for {}", cand, name))
                }
                Some(cand) => choices.push((name.to_string(), cand.to_string())),
            }
        }
        ensure!(problems.is_empty(), IncompleteBallotSnafu { problems });
        Ok(Ballot {
            code: code.clone(),
            choices,
        })
    }

    /// Submits the ballot. On success the session is `Submitted` and the
    /// ballot is in the log; on a validation or storage error nothing was
    /// recorded and the session keeps voting.
    pub fn submit(&mut self, election: &Election) -> Result<&Ballot, SessionError> {
        self.require(Phase::Voting, "submit a ballot")?;
        let code = self.code.clone().context(WrongPhaseSnafu {
            action: "submit a ballot",
            phase: self.phase,
        })?;
        let ballot = match self.compose(election, &code) {
            Ok(ballot) => ballot,
            Err(e) => {
                debug!("Session: ballot refused: {}", e);
                return Err(e);
            }
        };
        match election.log().append(&ballot) {
            Ok(()) => {}
            Err(LogError::CodeUsed {}) => {
                // The code is spent: the other submission won.
                self.reset();
                return DuplicateBallotSnafu {}.fail();
            }
            Err(LogError::Incomplete { missing }) => {
                return IncompleteBallotSnafu {
                    problems: missing
                        .iter()
                        .map(|pos| format!("Choose candidate for {}", pos))
                        .collect::<Vec<String>>(),
                }
                .fail();
            }
            Err(LogError::Store { source }) => {
                warn!("Session: the ballot could not be stored: {}", source);
                return Err(SessionError::Storage { source });
            }
        }
        info!("Session: ballot submitted");
        self.phase = Phase::Submitted;
        self.selections.clear();
        self.catalogs = None;
        let receipt: &Ballot = self.receipt.insert(ballot);
        Ok(receipt)
    }

    /// The only way out of `Submitted`.
    pub fn start_new_session(&mut self) -> Result<(), SessionError> {
        self.require(Phase::Submitted, "start a new session")?;
        self.reset();
        Ok(())
    }

    /// Back to `LoggedOut` from anywhere, clearing everything.
    pub fn logout(&mut self) {
        if self.phase != Phase::LoggedOut {
            info!("Session: logout from {:?}", self.phase);
        }
        self.reset();
    }

    // ******** Admin dashboard ********

    pub fn tally(&self, election: &Election) -> Result<Vec<PositionTally>, SessionError> {
        self.require(Phase::AdminUnlocked, "view the tally")?;
        election.tally().context(StorageSnafu {})
    }

    pub fn export(&self, election: &Election) -> Result<Vec<u8>, SessionError> {
        self.require(Phase::AdminUnlocked, "export the ballots")?;
        election.log().export().context(StorageSnafu {})
    }

    /// "Clear all votes". Never erases anything by itself.
    pub fn request_wipe(&mut self) -> Result<WipeStep, SessionError> {
        self.require(Phase::AdminUnlocked, "clear the votes")?;
        Ok(self.wipe.request())
    }

    fn complete_wipe(&mut self, election: &Election, step: WipeStep) -> Result<WipeStep, SessionError> {
        if step == WipeStep::Erase {
            election.log().erase().context(StorageSnafu {})?;
        }
        Ok(step)
    }

    /// "Yes, really". Returns `WipeStep::Erase` once the log has been erased.
    pub fn confirm_wipe(&mut self, election: &Election) -> Result<WipeStep, SessionError> {
        self.require(Phase::AdminUnlocked, "confirm the wipe")?;
        let step = self.wipe.affirm()?;
        self.complete_wipe(election, step)
    }

    /// The wipe password. Returns `WipeStep::Erase` once the log has been erased.
    pub fn submit_wipe_secret(
        &mut self,
        election: &Election,
        secret: &str,
    ) -> Result<WipeStep, SessionError> {
        self.require(Phase::AdminUnlocked, "confirm the wipe")?;
        let step = self.wipe.submit_secret(election.credentials(), secret)?;
        self.complete_wipe(election, step)
    }

    pub fn cancel_wipe(&mut self) {
        self.wipe.cancel();
    }
}
