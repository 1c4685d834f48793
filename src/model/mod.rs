pub mod asm_state;
pub mod audit;
pub mod ballot_style;
pub mod cvr;
pub mod dashboard;
pub mod manifest;
pub mod mongodb;

pub use asm_state::PersistentAsmState;
pub use audit::{display_order, CvrToAudit};
pub use ballot_style::{BallotStyle, BallotStyleCache};
pub use cvr::{CastVoteRecord, ConsensusValue, CvrContestInfo, RecordType};
pub use dashboard::{AuditInfo, CountyDashboard, DosDashboard, Round};
pub use manifest::BallotManifestInfo;

/// Counties are identified by their number in the state's county list.
pub type CountyId = u32;
