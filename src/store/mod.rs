//! The persistence collaborator: everything the engine reads or writes.
//!
//! All calls are synchronous. Implementations must be safe to share between
//! threads; the workflow layer serialises access per machine identity.

use crate::asm::AsmKind;
use crate::error::Result;
use crate::model::{
    BallotManifestInfo, CastVoteRecord, CountyDashboard, CountyId, DosDashboard,
    PersistentAsmState,
};

mod memory;
mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

/// Durable machine instances.
pub trait AsmStore: Send + Sync {
    /// Load the instance of `kind` bound to `identity`, if one was ever saved.
    fn load_asm(&self, kind: AsmKind, identity: &str) -> Result<Option<PersistentAsmState>>;

    /// Save an instance, returning its new version.
    ///
    /// `loaded_version` is the version the caller loaded (`None` for a fresh
    /// instance). If the stored version has moved on since, nothing is written
    /// and [`crate::error::Error::ConcurrentModification`] is returned.
    fn save_asm(&self, state: PersistentAsmState, loaded_version: Option<u64>) -> Result<u64>;
}

/// Ballot manifests.
pub trait ManifestStore: Send + Sync {
    /// The batch of `county_id`'s manifest holding ballot number `draw`.
    fn find_manifest_covering(
        &self,
        county_id: CountyId,
        draw: u64,
    ) -> Result<Option<BallotManifestInfo>>;

    /// Total ballots in the county's manifest, or `None` if none was imported.
    fn count_ballots(&self, county_id: CountyId) -> Result<Option<u64>>;

    /// Replace the county's manifest. The records must cover `[1, total]`
    /// exactly; returns the total.
    fn import_manifest(&self, county_id: CountyId, records: Vec<BallotManifestInfo>) -> Result<u64>;
}

/// Cast vote records.
pub trait CvrStore: Send + Sync {
    fn find_cvr(
        &self,
        county_id: CountyId,
        scanner_id: u32,
        batch_id: &str,
        record_id: u32,
    ) -> Result<Option<CastVoteRecord>>;

    /// The records whose sequence numbers are in `draws`, in the order of
    /// `draws`. Draws without a record are left out, so callers can detect a
    /// shortfall by length.
    fn find_cvrs_for_county(&self, county_id: CountyId, draws: &[u64]) -> Result<Vec<CastVoteRecord>>;

    /// Replace the county's records; returns how many were imported.
    fn import_cvrs(&self, county_id: CountyId, cvrs: Vec<CastVoteRecord>) -> Result<usize>;
}

/// Dashboards: audit-wide and per-county progress data.
pub trait DashboardStore: Send + Sync {
    /// The state authority's dashboard, or a blank one.
    fn dos_dashboard(&self) -> Result<DosDashboard>;

    fn save_dos_dashboard(&self, dashboard: &DosDashboard) -> Result<()>;

    fn county_dashboard(&self, county_id: CountyId) -> Result<Option<CountyDashboard>>;

    fn save_county_dashboard(&self, dashboard: &CountyDashboard) -> Result<()>;

    /// Every county with a dashboard, ascending.
    fn county_ids(&self) -> Result<Vec<CountyId>>;

    /// The published audit seed, if there is one yet.
    fn current_audit_seed(&self) -> Result<Option<String>> {
        Ok(self.dos_dashboard()?.seed)
    }
}

/// Everything the workflow needs from persistence.
pub trait Store: AsmStore + ManifestStore + CvrStore + DashboardStore {}

impl<T> Store for T where T: AsmStore + ManifestStore + CvrStore + DashboardStore {}

/// Reject records that do not belong to the county they are imported for.
fn check_county<'a, T: 'a>(
    county_id: CountyId,
    records: impl IntoIterator<Item = &'a T>,
    owner: impl Fn(&T) -> CountyId,
) -> Result<()> {
    for record in records {
        let found = owner(record);
        if found != county_id {
            return Err(crate::error::Error::BadRequest(format!(
                "record for county {found} imported into county {county_id}"
            )));
        }
    }
    Ok(())
}
