//! A single-election ballot box.
//!
//! Voters authenticate with one-time codes, pick one candidate per
//! configured position, and submit exactly once. An administrator sees the
//! running tally, downloads the raw ballots, and can erase them all behind a
//! multi-step confirmation.
//!
//! The entry point is an [`Election`], assembled with [`builder::Builder`]
//! and shared between any number of [`Session`]s, one per terminal.

mod ballot_log;
mod catalog;
mod config;
mod credentials;
mod errors;
mod session;
mod tally;
mod wipe;

pub mod builder;

use log::debug;

use std::sync::Arc;

pub use crate::ballot_log::{BallotLog, BallotStore, MemoryStore};
pub use crate::catalog::{
    Availability, CandidateCatalog, CandidateSource, Catalog, CatalogSnapshot, StaticCandidates,
};
pub use crate::config::*;
pub use crate::credentials::{CodeSet, CredentialStore, Resolution};
pub use crate::errors::*;
pub use crate::session::{PendingSelection, Phase, Session};
pub use crate::tally::{count_votes, top_n, PositionTally, Standing, TallyEngine};
pub use crate::wipe::{WipeProtocol, WipeState, WipeStep};

/// Everything shared by the sessions of one election.
///
/// An `Election` is `Sync`: wrap it in an `Arc` and hand it to as many
/// concurrent sessions as needed.
pub struct Election {
    settings: ElectionSettings,
    credentials: CredentialStore,
    catalogs: CandidateCatalog,
    log: BallotLog,
}

impl Election {
    pub fn settings(&self) -> &ElectionSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn log(&self) -> &BallotLog {
        &self.log
    }

    /// The candidate lists, according to the refresh policy.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.catalogs.snapshot(&self.settings.positions)
    }

    /// The standing of every position, limited to the configured number of
    /// leading candidates.
    pub fn tally(&self) -> StoreResult<Vec<PositionTally>> {
        let snapshot = self.snapshot();
        let res = TallyEngine::new(&self.log).standings(
            &self.settings.positions,
            &snapshot,
            self.settings.top_n,
        )?;
        debug!("tally: {} positions", res.len());
        Ok(res)
    }
}
