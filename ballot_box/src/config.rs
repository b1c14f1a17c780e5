// ********* Input data structures ***********

use std::fmt::{Debug, Display};

/// The column of the ballot log holding the voter code.
pub const CODE_COLUMN: &str = "code";

/// A one-time voter code.
///
/// Codes are compared by exact, case-sensitive match after trimming the
/// surrounding whitespace.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct VoterCode(String);

impl VoterCode {
    /// Trims the input. Returns None if nothing is left.
    pub fn parse(raw: &str) -> Option<VoterCode> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(VoterCode(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VoterCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A configuration-provided secret (admin login, wipe password).
///
/// The debug representation is redacted so that a configuration can be
/// logged as a whole.
#[derive(Eq, PartialEq, Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: &str) -> Secret {
        Secret(s.trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact match after trimming the presented value.
    pub fn matches(&self, presented: &str) -> bool {
        !self.0.is_empty() && self.0 == presented.trim()
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// How a voter picks a candidate for a position.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SelectionMode {
    /// All the subcategories are pooled into a single list of candidates.
    Flat,
    /// The voter first narrows down to a subcategory, then picks within it.
    TwoStep,
}

/// A named voting slot. Every ballot carries exactly one candidate per position.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Position {
    pub name: String,
    pub mode: SelectionMode,
}

impl Position {
    pub fn flat(name: &str) -> Position {
        Position {
            name: name.to_string(),
            mode: SelectionMode::Flat,
        }
    }

    pub fn two_step(name: &str) -> Position {
        Position {
            name: name.to_string(),
            mode: SelectionMode::TwoStep,
        }
    }
}

/// One cast vote: the code and one candidate per position, in the
/// order of the configured positions.
///
/// Ballots read back from storage may carry extra columns (positions that
/// were configured at some point) and may miss some (positions that were
/// added later).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub code: VoterCode,
    pub choices: Vec<(String, String)>,
}

impl Ballot {
    /// The candidate chosen for the given position, if any.
    pub fn choice(&self, position: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|(pos, _)| pos == position)
            .map(|(_, cand)| cand.as_str())
            .filter(|cand| !cand.is_empty())
    }
}

// ********* Configuration **********

/// The confirmation required before all the ballots are erased.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum WipePolicy {
    /// "Clear votes", then `steps` affirming clicks. The erase happens on the last one.
    Clicks { steps: u8 },
    /// "Clear votes", then the wipe secret.
    Password,
}

impl WipePolicy {
    pub const MAX_STEPS: u8 = 3;
    pub const DEFAULT: WipePolicy = WipePolicy::Clicks { steps: 1 };
}

/// When the candidate lists are read from their source.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CatalogRefresh {
    /// A fresh snapshot is taken at every voter login.
    PerSession,
    /// The first complete snapshot is kept for the lifetime of the process.
    Once,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionSettings {
    pub admin_secret: Secret,
    /// Falls back to the admin secret when not provided.
    pub wipe_secret: Option<Secret>,
    /// The admin secret must be entered a second time before the dashboard unlocks.
    pub require_admin_reentry: bool,
    pub wipe_policy: WipePolicy,
    pub positions: Vec<Position>,
    pub top_n: usize,
    pub catalog_refresh: CatalogRefresh,
}

impl ElectionSettings {
    pub const DEFAULT_TOP_N: usize = 7;

    pub fn new(admin_secret: &str, positions: Vec<Position>) -> ElectionSettings {
        ElectionSettings {
            admin_secret: Secret::new(admin_secret),
            wipe_secret: None,
            require_admin_reentry: false,
            wipe_policy: WipePolicy::DEFAULT,
            positions,
            top_n: ElectionSettings::DEFAULT_TOP_N,
            catalog_refresh: CatalogRefresh::PerSession,
        }
    }

    pub fn position(&self, name: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.name == name)
    }

    pub fn position_names(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.name.clone()).collect()
    }
}
