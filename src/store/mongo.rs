use std::collections::HashMap;

use mongodb::{
    bson::{doc, Bson},
    options::ReplaceOptions,
    sync::{Client, Database},
};

use crate::asm::AsmKind;
use crate::error::{Error, Result};
use crate::model::{
    manifest::validate_coverage,
    mongodb::{ensure_indexes_exist, errors::is_duplicate_key_error, u32_filter, u64_bson, Coll},
    BallotManifestInfo, BallotStyleCache, CastVoteRecord, CountyDashboard, CountyId, DosDashboard,
    PersistentAsmState,
};
use crate::Config;

use super::{check_county, AsmStore, CvrStore, DashboardStore, ManifestStore};

/// A store backed by MongoDB, using the synchronous driver.
pub struct MongoStore {
    asm_states: Coll<PersistentAsmState>,
    manifests: Coll<BallotManifestInfo>,
    cvrs: Coll<CastVoteRecord>,
    county_dashboards: Coll<CountyDashboard>,
    dos_dashboards: Coll<DosDashboard>,
    ballot_styles: BallotStyleCache,
}

impl MongoStore {
    /// Connect to the configured database and make sure its indexes exist.
    pub fn connect(config: &Config) -> Result<Self> {
        info!("Connecting to database {}...", config.database());
        let client = Client::with_uri_str(config.db_uri())?;
        let db = client.database(config.database());
        ensure_indexes_exist(&db)?;
        info!("...database connection online!");
        Ok(Self::new(&db))
    }

    /// Use an already-prepared database.
    pub fn new(db: &Database) -> Self {
        Self {
            asm_states: Coll::from_db(db),
            manifests: Coll::from_db(db),
            cvrs: Coll::from_db(db),
            county_dashboards: Coll::from_db(db),
            dos_dashboards: Coll::from_db(db),
            ballot_styles: BallotStyleCache::new(),
        }
    }

    /// Ballot styles seen in records imported through this store.
    pub fn ballot_styles(&self) -> &BallotStyleCache {
        &self.ballot_styles
    }
}

fn upsert() -> ReplaceOptions {
    ReplaceOptions::builder().upsert(true).build()
}

impl AsmStore for MongoStore {
    fn load_asm(&self, kind: AsmKind, identity: &str) -> Result<Option<PersistentAsmState>> {
        let key = PersistentAsmState::key(kind, identity);
        Ok(self.asm_states.find_one(doc! {"_id": key}, None)?)
    }

    fn save_asm(&self, mut state: PersistentAsmState, loaded_version: Option<u64>) -> Result<u64> {
        let conflict = |state: &PersistentAsmState| Error::ConcurrentModification {
            kind: state.kind,
            identity: state.identity.clone(),
        };

        match loaded_version {
            None => {
                state.version = 1;
                match self.asm_states.insert_one(&state, None) {
                    Ok(_) => Ok(1),
                    Err(e) if is_duplicate_key_error(&e) => Err(conflict(&state)),
                    Err(e) => Err(e.into()),
                }
            }
            Some(version) => {
                state.version = version + 1;
                let filter = doc! {"_id": state.id.as_str(), "version": u64_bson(version)?};
                let result = self.asm_states.replace_one(filter, &state, None)?;
                if result.matched_count == 0 {
                    return Err(conflict(&state));
                }
                Ok(state.version)
            }
        }
    }
}

impl ManifestStore for MongoStore {
    fn find_manifest_covering(
        &self,
        county_id: CountyId,
        draw: u64,
    ) -> Result<Option<BallotManifestInfo>> {
        let draw = u64_bson(draw)?;
        let filter = doc! {
            "county_id": i64::from(county_id),
            "sequence_start": {"$lte": draw.clone()},
            "sequence_end": {"$gte": draw},
        };
        Ok(self.manifests.find_one(filter, None)?)
    }

    fn count_ballots(&self, county_id: CountyId) -> Result<Option<u64>> {
        let mut total = None;
        for record in self.manifests.find(u32_filter("county_id", county_id), None)? {
            *total.get_or_insert(0) += u64::from(record?.batch_size);
        }
        Ok(total)
    }

    fn import_manifest(&self, county_id: CountyId, records: Vec<BallotManifestInfo>) -> Result<u64> {
        let total = validate_coverage(county_id, &records)?;
        self.manifests
            .delete_many(u32_filter("county_id", county_id), None)?;
        if !records.is_empty() {
            self.manifests.insert_many(&records, None)?;
        }
        debug!("Imported {} manifest batches for county {county_id}", records.len());
        Ok(total)
    }
}

impl CvrStore for MongoStore {
    fn find_cvr(
        &self,
        county_id: CountyId,
        scanner_id: u32,
        batch_id: &str,
        record_id: u32,
    ) -> Result<Option<CastVoteRecord>> {
        let filter = doc! {
            "county_id": i64::from(county_id),
            "scanner_id": i64::from(scanner_id),
            "batch_id": batch_id,
            "record_id": i64::from(record_id),
        };
        Ok(self.cvrs.find_one(filter, None)?)
    }

    fn find_cvrs_for_county(&self, county_id: CountyId, draws: &[u64]) -> Result<Vec<CastVoteRecord>> {
        let sequence_numbers = draws
            .iter()
            .map(|&d| u64_bson(d))
            .collect::<Result<Vec<Bson>>>()?;
        let filter = doc! {
            "county_id": i64::from(county_id),
            "sequence_number": {"$in": sequence_numbers},
        };
        let mut by_sequence = HashMap::new();
        for cvr in self.cvrs.find(filter, None)? {
            let cvr = cvr?;
            by_sequence.insert(cvr.sequence_number, cvr);
        }
        Ok(draws
            .iter()
            .filter_map(|draw| by_sequence.get(draw).cloned())
            .collect())
    }

    fn import_cvrs(&self, county_id: CountyId, cvrs: Vec<CastVoteRecord>) -> Result<usize> {
        check_county(county_id, &cvrs, |cvr| cvr.county_id)?;
        self.cvrs.delete_many(u32_filter("county_id", county_id), None)?;
        if !cvrs.is_empty() {
            self.cvrs.insert_many(&cvrs, None).map_err(|e| {
                if is_duplicate_key_error(&e) {
                    Error::BadRequest(format!("duplicate ballot position in county {county_id}"))
                } else {
                    e.into()
                }
            })?;
        }
        for cvr in &cvrs {
            self.ballot_styles.intern(&cvr.ballot_type, cvr.contest_names());
        }
        debug!("Imported {} CVRs for county {county_id}", cvrs.len());
        Ok(cvrs.len())
    }
}

impl DashboardStore for MongoStore {
    fn dos_dashboard(&self) -> Result<DosDashboard> {
        let default = DosDashboard::default();
        Ok(self
            .dos_dashboards
            .find_one(doc! {"_id": default.id.as_str()}, None)?
            .unwrap_or(default))
    }

    fn save_dos_dashboard(&self, dashboard: &DosDashboard) -> Result<()> {
        self.dos_dashboards
            .replace_one(doc! {"_id": dashboard.id.as_str()}, dashboard, upsert())?;
        Ok(())
    }

    fn county_dashboard(&self, county_id: CountyId) -> Result<Option<CountyDashboard>> {
        Ok(self
            .county_dashboards
            .find_one(u32_filter("_id", county_id), None)?)
    }

    fn save_county_dashboard(&self, dashboard: &CountyDashboard) -> Result<()> {
        self.county_dashboards.replace_one(
            u32_filter("_id", dashboard.county_id),
            dashboard,
            upsert(),
        )?;
        Ok(())
    }

    fn county_ids(&self) -> Result<Vec<CountyId>> {
        let mut ids = self
            .county_dashboards
            .find(doc! {}, None)?
            .map(|dashboard| dashboard.map(|d| d.county_id))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids.sort_unstable();
        Ok(ids)
    }
}
