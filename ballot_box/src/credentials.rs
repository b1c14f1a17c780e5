use log::{debug, warn};

use std::collections::HashSet;

use crate::config::{Secret, VoterCode};

/// What a presented code turned out to be.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Resolution {
    Admin,
    Voter(VoterCode),
    Invalid,
}

/// The set of provisioned voter codes.
///
/// A code set that failed to load is kept as `Unavailable` rather than
/// silently empty, so the login path can report it to the operator.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CodeSet {
    Loaded(HashSet<VoterCode>),
    Unavailable(String),
}

impl CodeSet {
    pub fn from_codes<S: AsRef<str>>(codes: &[S]) -> CodeSet {
        CodeSet::Loaded(
            codes
                .iter()
                .filter_map(|c| VoterCode::parse(c.as_ref()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            CodeSet::Loaded(codes) => codes.len(),
            CodeSet::Unavailable(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds the voter codes and the admin credentials. Membership queries only.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    codes: CodeSet,
    admin_secret: Secret,
    wipe_secret: Option<Secret>,
}

impl CredentialStore {
    pub fn new(codes: CodeSet, admin_secret: Secret, wipe_secret: Option<Secret>) -> Self {
        if let CodeSet::Unavailable(reason) = &codes {
            warn!("CredentialStore: voter codes unavailable: {}", reason);
        }
        CredentialStore {
            codes,
            admin_secret,
            wipe_secret,
        }
    }

    /// Resolves a presented code. The admin secret takes precedence over a
    /// voter code with the same value.
    ///
    /// Whether the code has already voted is not checked here.
    pub fn resolve(&self, raw: &str) -> Resolution {
        if self.admin_secret.matches(raw) {
            return Resolution::Admin;
        }
        let code = match VoterCode::parse(raw) {
            Some(code) => code,
            None => return Resolution::Invalid,
        };
        match &self.codes {
            CodeSet::Loaded(codes) if codes.contains(&code) => {
                debug!("resolve: {} is a voter code", code);
                Resolution::Voter(code)
            }
            _ => Resolution::Invalid,
        }
    }

    pub fn codes_available(&self) -> bool {
        matches!(self.codes, CodeSet::Loaded(_))
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    pub fn is_admin_secret(&self, presented: &str) -> bool {
        self.admin_secret.matches(presented)
    }

    /// The wipe secret, or the admin secret when no distinct one is configured.
    pub fn is_wipe_secret(&self, presented: &str) -> bool {
        match &self.wipe_secret {
            Some(secret) => secret.matches(presented),
            None => self.admin_secret.matches(presented),
        }
    }
}
