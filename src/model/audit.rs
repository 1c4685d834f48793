use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{BallotManifestInfo, CastVoteRecord};

/// One ballot an audit board must retrieve and compare against its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvrToAudit {
    /// Index of the ballot in deduplicated draw order. Never changed by sorting.
    pub audit_sequence_number: usize,
    pub scanner_id: u32,
    pub batch_id: String,
    pub record_id: u32,
    pub imprinted_id: String,
    pub cvr_number: u32,
    pub cvr_id: u64,
    pub ballot_type: String,
    pub storage_location: String,
    pub audit_flag: bool,
}

impl CvrToAudit {
    /// Join a manifest batch, the ballot's position in it, and its record.
    pub fn new(
        audit_sequence_number: usize,
        manifest: &BallotManifestInfo,
        position: u32,
        cvr: &CastVoteRecord,
    ) -> Self {
        Self {
            audit_sequence_number,
            scanner_id: manifest.scanner_id,
            batch_id: manifest.batch_id.clone(),
            record_id: position,
            imprinted_id: manifest.imprinted_id(position),
            cvr_number: cvr.cvr_number,
            cvr_id: cvr.id,
            ballot_type: cvr.ballot_type.clone(),
            storage_location: manifest.storage_location.clone(),
            audit_flag: cvr.audit_flag,
        }
    }
}

/// Order in which ballots are presented to an audit board: by scanner, then
/// batch, then position in the batch.
///
/// Numeric batch ids come first, in numeric order, followed by the rest in
/// text order.
pub fn display_order(a: &CvrToAudit, b: &CvrToAudit) -> Ordering {
    a.scanner_id
        .cmp(&b.scanner_id)
        .then_with(|| compare_batch_ids(&a.batch_id, &b.batch_id))
        .then_with(|| a.record_id.cmp(&b.record_id))
}

fn compare_batch_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
