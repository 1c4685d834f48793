//! Drives the audit protocol: machine load-step-save, round start and ballot
//! selection.

mod asm;
pub mod ballot_selection;
mod round;
mod workflow;

pub use asm::{AsmController, IdentityLocks};
pub use ballot_selection::{dedup, select_ballots, select_ballots_bulk};
pub use round::{CountyRoundStatus, RoundSize, RoundStartReport, MAX_ROUND_SIZE};
pub use workflow::{AuditCompletion, AuditWorkflow, MIN_SEED_LENGTH};
