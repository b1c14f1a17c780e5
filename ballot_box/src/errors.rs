use snafu::Snafu;

use crate::session::Phase;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the durable storage behind the ballot log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("I/O error on the ballot log {path}"))]
    Io {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("{message}"))]
    Backend { message: String, source: BoxedError },
    #[snafu(display(
        "The ballot log has no column for {}; export and wipe it before adding positions",
        missing.join(", ")
    ))]
    SchemaMismatch { missing: Vec<String> },
    #[snafu(display("The ballot log is unavailable after a failed operation"))]
    LockPoisoned {},
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures to obtain the candidates of one position.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CatalogError {
    #[snafu(display("No candidates available for {position}"))]
    Unavailable { position: String, source: BoxedError },
    #[snafu(display("No candidates available for {position}"))]
    NotConfigured { position: String },
}

/// Refusals of the ballot log gate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LogError {
    #[snafu(display("The ballot has no choice for {}", missing.join(", ")))]
    Incomplete { missing: Vec<String> },
    #[snafu(display("That code has already voted."))]
    CodeUsed {},
    #[snafu(context(false), display("{source}"))]
    Store { source: StoreError },
}

/// The taxonomy of the errors surfaced to the users of a session.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorClass {
    /// Invalid code, already voted, wrong admin secret.
    Authentication,
    /// Missing code source, candidates or credentials. Blocks the affected path.
    Configuration,
    /// Incomplete or inconsistent ballot.
    Validation,
    /// Lost a double-submission race.
    Conflict,
    /// Wrong wipe secret or wipe not in progress. Nothing was deleted.
    DestructiveAction,
    /// The storage failed. The log is left as it was before the operation.
    Storage,
    /// The operation is not available in the current phase.
    Protocol,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    #[snafu(display("Invalid code."))]
    InvalidCode {},
    #[snafu(display("That code has already voted."))]
    AlreadyVoted {},
    #[snafu(display("Wrong admin password."))]
    WrongAdminSecret {},
    #[snafu(display("Voting is unavailable: the voter codes could not be loaded."))]
    CodesUnavailable {},
    #[snafu(display("{}", problems.join(" • ")))]
    IncompleteBallot { problems: Vec<String> },
    #[snafu(display("Unknown position {position}"))]
    UnknownPosition { position: String },
    #[snafu(display("{position} has no subcategories to choose from"))]
    FlatPosition { position: String },
    #[snafu(display("Choose a sub-category for {position} first"))]
    SubcategoryFirst { position: String },
    #[snafu(display("{choice} is not a choice for {position}"))]
    UnknownChoice { position: String, choice: String },
    #[snafu(display("No candidates available for {position}"))]
    PositionUnavailable { position: String },
    #[snafu(display("That code has already voted."))]
    DuplicateBallot {},
    #[snafu(display("Cannot {action} while {phase:?}"))]
    WrongPhase { action: String, phase: Phase },
    #[snafu(display("Wrong wipe password. Nothing was deleted."))]
    WrongWipeSecret {},
    #[snafu(display("No wipe is in progress."))]
    NoWipeInProgress {},
    #[snafu(display("This wipe requires {expected}"))]
    WrongWipeStep { expected: String },
    #[snafu(display("{source}"))]
    Storage { source: StoreError },
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::InvalidCode {}
            | SessionError::AlreadyVoted {}
            | SessionError::WrongAdminSecret {} => ErrorClass::Authentication,
            SessionError::CodesUnavailable {} | SessionError::PositionUnavailable { .. } => {
                ErrorClass::Configuration
            }
            SessionError::IncompleteBallot { .. }
            | SessionError::UnknownPosition { .. }
            | SessionError::FlatPosition { .. }
            | SessionError::SubcategoryFirst { .. }
            | SessionError::UnknownChoice { .. } => ErrorClass::Validation,
            SessionError::DuplicateBallot {} => ErrorClass::Conflict,
            SessionError::WrongWipeSecret {}
            | SessionError::NoWipeInProgress {}
            | SessionError::WrongWipeStep { .. } => ErrorClass::DestructiveAction,
            SessionError::Storage { .. } => ErrorClass::Storage,
            SessionError::WrongPhase { .. } => ErrorClass::Protocol,
        }
    }
}

/// Invalid election set-ups, detected before any session starts.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BuildError {
    #[snafu(display("The admin secret must not be empty"))]
    EmptyAdminSecret {},
    #[snafu(display("At least one position must be configured"))]
    NoPositions {},
    #[snafu(display("Position {name} is configured twice"))]
    DuplicatePosition { name: String },
    #[snafu(display("Position name {name:?} is reserved"))]
    ReservedPosition { name: String },
    #[snafu(display("The tally must show at least one candidate per position"))]
    ZeroTopN {},
    #[snafu(display("The wipe confirmation takes between 1 and {max} clicks, not {steps}"))]
    WipeSteps { steps: u8, max: u8 },
    #[snafu(display("No ballot store was provided"))]
    MissingStore {},
    #[snafu(display("No candidate source was provided"))]
    MissingCandidates {},
}
