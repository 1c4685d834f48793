use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::asm::AsmKind;
use crate::error::{Error, Result};
use crate::model::{
    manifest::validate_coverage, BallotManifestInfo, BallotStyleCache, CastVoteRecord,
    CountyDashboard, CountyId, DosDashboard, PersistentAsmState,
};

use super::{check_county, AsmStore, CvrStore, DashboardStore, ManifestStore};

/// A county's records with the two lookups the engine needs.
#[derive(Debug, Default)]
struct CountyCvrs {
    records: Vec<CastVoteRecord>,
    by_position: HashMap<(u32, String, u32), usize>,
    by_sequence: HashMap<u64, usize>,
}

/// A thread-safe store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    asms: RwLock<HashMap<String, PersistentAsmState>>,
    manifests: RwLock<HashMap<CountyId, Vec<BallotManifestInfo>>>,
    cvrs: RwLock<HashMap<CountyId, CountyCvrs>>,
    county_dashboards: RwLock<BTreeMap<CountyId, CountyDashboard>>,
    dos_dashboard: RwLock<Option<DosDashboard>>,
    ballot_styles: BallotStyleCache,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ballot styles seen in imported records.
    pub fn ballot_styles(&self) -> &BallotStyleCache {
        &self.ballot_styles
    }
}

impl AsmStore for InMemoryStore {
    fn load_asm(&self, kind: AsmKind, identity: &str) -> Result<Option<PersistentAsmState>> {
        let key = PersistentAsmState::key(kind, identity);
        Ok(read(&self.asms).get(&key).cloned())
    }

    fn save_asm(&self, mut state: PersistentAsmState, loaded_version: Option<u64>) -> Result<u64> {
        let mut asms = write(&self.asms);
        let stored_version = asms.get(&state.id).map(|s| s.version);
        if stored_version != loaded_version {
            return Err(Error::ConcurrentModification {
                kind: state.kind,
                identity: state.identity,
            });
        }
        state.version = loaded_version.map_or(1, |v| v + 1);
        let version = state.version;
        asms.insert(state.id.clone(), state);
        Ok(version)
    }
}

impl ManifestStore for InMemoryStore {
    fn find_manifest_covering(
        &self,
        county_id: CountyId,
        draw: u64,
    ) -> Result<Option<BallotManifestInfo>> {
        Ok(read(&self.manifests)
            .get(&county_id)
            .and_then(|records| records.iter().find(|r| r.covers(draw)))
            .cloned())
    }

    fn count_ballots(&self, county_id: CountyId) -> Result<Option<u64>> {
        Ok(read(&self.manifests)
            .get(&county_id)
            .map(|records| records.iter().map(|r| u64::from(r.batch_size)).sum()))
    }

    fn import_manifest(&self, county_id: CountyId, records: Vec<BallotManifestInfo>) -> Result<u64> {
        let total = validate_coverage(county_id, &records)?;
        write(&self.manifests).insert(county_id, records);
        Ok(total)
    }
}

impl CvrStore for InMemoryStore {
    fn find_cvr(
        &self,
        county_id: CountyId,
        scanner_id: u32,
        batch_id: &str,
        record_id: u32,
    ) -> Result<Option<CastVoteRecord>> {
        let cvrs = read(&self.cvrs);
        Ok(cvrs.get(&county_id).and_then(|county| {
            county
                .by_position
                .get(&(scanner_id, batch_id.to_string(), record_id))
                .map(|&i| county.records[i].clone())
        }))
    }

    fn find_cvrs_for_county(&self, county_id: CountyId, draws: &[u64]) -> Result<Vec<CastVoteRecord>> {
        let cvrs = read(&self.cvrs);
        let Some(county) = cvrs.get(&county_id) else {
            return Ok(Vec::new());
        };
        Ok(draws
            .iter()
            .filter_map(|draw| county.by_sequence.get(draw))
            .map(|&i| county.records[i].clone())
            .collect())
    }

    fn import_cvrs(&self, county_id: CountyId, cvrs: Vec<CastVoteRecord>) -> Result<usize> {
        check_county(county_id, &cvrs, |cvr| cvr.county_id)?;

        let mut county = CountyCvrs::default();
        for (i, cvr) in cvrs.iter().enumerate() {
            let position = (cvr.scanner_id, cvr.batch_id.clone(), cvr.record_id);
            if county.by_position.insert(position, i).is_some() {
                return Err(Error::BadRequest(format!(
                    "duplicate record at scanner {} batch {} position {}",
                    cvr.scanner_id, cvr.batch_id, cvr.record_id
                )));
            }
            county.by_sequence.insert(cvr.sequence_number, i);
            self.ballot_styles
                .intern(&cvr.ballot_type, cvr.contest_names());
        }
        county.records = cvrs;

        let count = county.records.len();
        write(&self.cvrs).insert(county_id, county);
        Ok(count)
    }
}

impl DashboardStore for InMemoryStore {
    fn dos_dashboard(&self) -> Result<DosDashboard> {
        Ok(read(&self.dos_dashboard).clone().unwrap_or_default())
    }

    fn save_dos_dashboard(&self, dashboard: &DosDashboard) -> Result<()> {
        *write(&self.dos_dashboard) = Some(dashboard.clone());
        Ok(())
    }

    fn county_dashboard(&self, county_id: CountyId) -> Result<Option<CountyDashboard>> {
        Ok(read(&self.county_dashboards).get(&county_id).cloned())
    }

    fn save_county_dashboard(&self, dashboard: &CountyDashboard) -> Result<()> {
        write(&self.county_dashboards).insert(dashboard.county_id, dashboard.clone());
        Ok(())
    }

    fn county_ids(&self) -> Result<Vec<CountyId>> {
        Ok(read(&self.county_dashboards).keys().copied().collect())
    }
}
