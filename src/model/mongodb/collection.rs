use std::ops::Deref;

use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::IndexOptions,
    sync::{Collection, Database},
    IndexModel,
};

use crate::model::{
    BallotManifestInfo, CastVoteRecord, CountyDashboard, DosDashboard, PersistentAsmState,
};

/// A persisted type with a collection of its own.
pub trait MongoCollection {
    const NAME: &'static str;
}

/// The typed collection holding every persisted `T`.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for PersistentAsmState {
    const NAME: &'static str = "asm_states";
}

impl MongoCollection for BallotManifestInfo {
    const NAME: &'static str = "ballot_manifests";
}

impl MongoCollection for CastVoteRecord {
    const NAME: &'static str = "cast_vote_records";
}

impl MongoCollection for CountyDashboard {
    const NAME: &'static str = "county_dashboards";
}

impl MongoCollection for DosDashboard {
    const NAME: &'static str = "dos_dashboards";
}

/// Create the indexes the stores rely on, if missing. Idempotent.
pub fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Manifest batches never overlap within a county.
    let manifest_index = IndexModel::builder()
        .keys(doc! {"county_id": 1, "sequence_start": 1})
        .options(unique.clone())
        .build();
    Coll::<BallotManifestInfo>::from_db(db).create_index(manifest_index, None)?;

    // One record per ballot position.
    let cvr_position_index = IndexModel::builder()
        .keys(doc! {"county_id": 1, "scanner_id": 1, "batch_id": 1, "record_id": 1})
        .options(unique.clone())
        .build();
    Coll::<CastVoteRecord>::from_db(db).create_index(cvr_position_index, None)?;

    // Bulk lookups by upload order.
    let cvr_sequence_index = IndexModel::builder()
        .keys(doc! {"county_id": 1, "sequence_number": 1})
        .build();
    Coll::<CastVoteRecord>::from_db(db).create_index(cvr_sequence_index, None)?;

    Ok(())
}
