use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::CountyId;

/// One batch of physical ballots, as listed in a county's ballot manifest.
///
/// Each batch covers the inclusive range `[sequence_start, sequence_end]` of the
/// county's ballot sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotManifestInfo {
    pub county_id: CountyId,
    pub scanner_id: u32,
    pub batch_id: String,
    pub batch_size: u32,
    /// Where the batch is physically stored.
    pub storage_location: String,
    pub sequence_start: u64,
    pub sequence_end: u64,
}

impl BallotManifestInfo {
    pub fn new(
        county_id: CountyId,
        scanner_id: u32,
        batch_id: impl Into<String>,
        batch_size: u32,
        storage_location: impl Into<String>,
        sequence_start: u64,
    ) -> Self {
        Self {
            county_id,
            scanner_id,
            batch_id: batch_id.into(),
            batch_size,
            storage_location: storage_location.into(),
            sequence_start,
            sequence_end: (sequence_start + u64::from(batch_size)).saturating_sub(1),
        }
    }

    /// Does this batch hold the ballot with the given sequence number?
    pub fn covers(&self, sequence_number: u64) -> bool {
        self.sequence_start <= sequence_number && sequence_number <= self.sequence_end
    }

    /// 1-based position of a covered ballot within the batch.
    pub fn ballot_position(&self, sequence_number: u64) -> Option<u32> {
        if !self.covers(sequence_number) {
            return None;
        }
        u32::try_from(sequence_number - self.sequence_start + 1).ok()
    }

    /// The identifier imprinted on the ballot at `position` by the scanner.
    pub fn imprinted_id(&self, position: u32) -> String {
        format!("{}-{}-{}", self.scanner_id, self.batch_id, position)
    }
}

/// Check that a county's manifest records partition `[1, total]` with no
/// gaps or overlaps, and return the total ballot count.
pub fn validate_coverage(county_id: CountyId, records: &[BallotManifestInfo]) -> Result<u64> {
    let integrity = |reason: String| Error::ManifestIntegrity { county_id, reason };

    let mut sorted: Vec<&BallotManifestInfo> = records.iter().collect();
    sorted.sort_by_key(|r| r.sequence_start);

    let mut next = 1;
    for record in sorted {
        if record.county_id != county_id {
            return Err(integrity(format!(
                "batch {} belongs to county {}",
                record.batch_id, record.county_id
            )));
        }
        if record.batch_size == 0 {
            return Err(integrity(format!("batch {} is empty", record.batch_id)));
        }
        if record.sequence_start != next {
            let kind = if record.sequence_start > next {
                "gap"
            } else {
                "overlap"
            };
            return Err(integrity(format!(
                "{kind} at sequence number {next}: batch {} starts at {}",
                record.batch_id, record.sequence_start
            )));
        }
        if record.sequence_end != record.sequence_start + u64::from(record.batch_size) - 1 {
            return Err(integrity(format!(
                "batch {} of size {} cannot end at {}",
                record.batch_id, record.batch_size, record.sequence_end
            )));
        }
        next = record.sequence_end + 1;
    }
    Ok(next - 1)
}

#[cfg(test)]
mod examples {
    use super::*;

    impl BallotManifestInfo {
        /// Three batches of 10, 25 and 5 ballots on two scanners.
        pub fn county_examples(county_id: CountyId) -> Vec<Self> {
            vec![
                Self::new(county_id, 1, "1", 10, "Bin 1", 1),
                Self::new(county_id, 1, "2", 25, "Bin 1", 11),
                Self::new(county_id, 2, "1", 5, "Bin 2", 36),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_and_imprinted_ids() {
        let batch = BallotManifestInfo::new(1, 1, "1", 10, "Bin 1", 1);
        assert_eq!(batch.sequence_end, 10);
        assert_eq!(batch.ballot_position(7), Some(7));
        assert_eq!(batch.imprinted_id(7), "1-1-7");
        assert_eq!(batch.ballot_position(11), None);

        let batch = BallotManifestInfo::new(1, 4, "B7", 25, "Bin 3", 11);
        assert!(batch.covers(11));
        assert!(batch.covers(35));
        assert!(!batch.covers(36));
        assert_eq!(batch.ballot_position(11), Some(1));
        assert_eq!(batch.imprinted_id(25), "4-B7-25");
    }

    #[test]
    fn complete_manifest_is_accepted() {
        let mut records = BallotManifestInfo::county_examples(3);
        records.reverse();
        assert_eq!(validate_coverage(3, &records).unwrap(), 40);
        assert_eq!(validate_coverage(3, &[]).unwrap(), 0);
    }

    #[test]
    fn broken_manifests_are_rejected() {
        // Gap.
        let mut records = BallotManifestInfo::county_examples(3);
        records.remove(1);
        let err = validate_coverage(3, &records).unwrap_err();
        assert!(matches!(err, Error::ManifestIntegrity { .. }), "{err}");

        // Overlap.
        let mut records = BallotManifestInfo::county_examples(3);
        records.push(BallotManifestInfo::new(3, 3, "9", 2, "Bin 4", 40));
        records.push(BallotManifestInfo::new(3, 3, "8", 2, "Bin 4", 41));
        assert!(validate_coverage(3, &records).is_err());

        // Wrong county.
        let records = BallotManifestInfo::county_examples(4);
        assert!(validate_coverage(3, &records).is_err());

        // Does not start at 1.
        let records = vec![BallotManifestInfo::new(3, 1, "1", 10, "Bin 1", 2)];
        assert!(validate_coverage(3, &records).is_err());

        // Inconsistent end.
        let mut records = BallotManifestInfo::county_examples(3);
        records[0].sequence_end = 9;
        assert!(validate_coverage(3, &records).is_err());
    }
}
