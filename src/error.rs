use mongodb::bson::{de::Error as BsonDeError, ser::Error as BsonSerError};
use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::asm::{AsmKind, ConfigurationError};
use crate::model::CountyId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonSer(#[from] BsonSerError),
    #[error(transparent)]
    BsonDe(#[from] BsonDeError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// A machine definition is malformed. Only ever raised at startup.
    #[error("Malformed machine definition: {0}")]
    Configuration(#[from] ConfigurationError),
    /// The event is not legal in the machine's current state; nothing was changed.
    #[error("Illegal transition for {kind} {identity}: {event} in state {state}")]
    IllegalTransition {
        kind: AsmKind,
        identity: String,
        state: String,
        event: String,
    },
    /// A draw is not covered by any manifest record: either it is out of range,
    /// or the manifest has a gap.
    #[error("Could not find a ballot manifest for county {county_id} covering random number {draw}")]
    MissingManifest { county_id: CountyId, draw: u64 },
    /// A bulk CVR lookup did not return one record per draw.
    #[error("Expected {expected} cast vote records for county {county_id}, found {found}")]
    MissingCvrCount {
        county_id: CountyId,
        expected: usize,
        found: usize,
    },
    #[error("Ballot manifest for county {county_id} is inconsistent: {reason}")]
    ManifestIntegrity { county_id: CountyId, reason: String },
    #[error("Persisted {kind} {identity} has unknown state {state}")]
    CorruptState {
        kind: AsmKind,
        identity: String,
        state: String,
    },
    /// Another process saved the same machine instance between our load and save.
    #[error("Concurrent modification of {kind} {identity}")]
    ConcurrentModification { kind: AsmKind, identity: String },
    #[error("Random number generation failed: {0}")]
    Prng(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Was this operation rejected because the workflow was in the wrong state?
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalTransition { .. })
    }
}
