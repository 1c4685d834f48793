use serde::{Deserialize, Serialize};

use crate::model::CountyId;

/// Where a cast vote record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    /// Exported by the county's tabulation system.
    Uploaded,
    /// Entered by an audit board from the paper ballot.
    AuditorEntered,
    Reaudited,
    /// Stands in for a ballot with no record.
    PhantomRecord,
}

/// An audit board's agreement on a contest's interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusValue {
    Yes,
    No,
}

/// The choices recorded for a single contest on a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvrContestInfo {
    pub contest: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub consensus: Option<ConsensusValue>,
    pub choices: Vec<String>,
}

/// A cast vote record: the digital tabulation of one ballot.
///
/// Addressed by `(county_id, scanner_id, batch_id, record_id)`, where
/// `record_id` is the ballot's 1-based position in its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteRecord {
    pub id: u64,
    pub record_type: RecordType,
    pub county_id: CountyId,
    pub cvr_number: u32,
    /// Position in the county's upload, used by bulk lookups.
    pub sequence_number: u64,
    pub scanner_id: u32,
    pub batch_id: String,
    pub record_id: u32,
    pub imprinted_id: String,
    pub ballot_type: String,
    #[serde(default)]
    pub audit_flag: bool,
    #[serde(default)]
    pub contest_info: Vec<CvrContestInfo>,
}

impl CastVoteRecord {
    pub const NOT_FOUND_BALLOT_TYPE: &'static str = "NOT FOUND";

    /// Placeholder for a manifest position that has no record.
    pub fn not_found() -> Self {
        Self {
            id: 0,
            record_type: RecordType::PhantomRecord,
            county_id: 0,
            cvr_number: 0,
            sequence_number: 0,
            scanner_id: 0,
            batch_id: String::new(),
            record_id: 0,
            imprinted_id: String::new(),
            ballot_type: Self::NOT_FOUND_BALLOT_TYPE.to_string(),
            audit_flag: false,
            contest_info: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.record_type == RecordType::PhantomRecord && self.id == 0
    }

    /// Names of the contests on this ballot, in ballot order.
    pub fn contest_names(&self) -> Vec<String> {
        self.contest_info.iter().map(|c| c.contest.clone()).collect()
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::BallotManifestInfo;

    impl CastVoteRecord {
        /// An uploaded record at the given address.
        pub fn example(
            id: u64,
            county_id: CountyId,
            scanner_id: u32,
            batch_id: &str,
            record_id: u32,
            sequence_number: u64,
        ) -> Self {
            Self {
                id,
                record_type: RecordType::Uploaded,
                county_id,
                cvr_number: id as u32,
                sequence_number,
                scanner_id,
                batch_id: batch_id.to_string(),
                record_id,
                imprinted_id: format!("{scanner_id}-{batch_id}-{record_id}"),
                ballot_type: "Ballot 1".to_string(),
                audit_flag: true,
                contest_info: vec![CvrContestInfo {
                    contest: "Governor".to_string(),
                    comment: None,
                    consensus: None,
                    choices: vec!["Alice".to_string()],
                }],
            }
        }

        /// One record for every ballot in `manifests`.
        pub fn for_manifest(county_id: CountyId, manifests: &[BallotManifestInfo]) -> Vec<Self> {
            manifests
                .iter()
                .flat_map(|batch| {
                    (batch.sequence_start..=batch.sequence_end).map(move |sequence| {
                        let position = (sequence - batch.sequence_start + 1) as u32;
                        Self::example(
                            u64::from(county_id) * 1000 + sequence,
                            county_id,
                            batch.scanner_id,
                            &batch.batch_id,
                            position,
                            sequence,
                        )
                    })
                })
                .collect()
        }
    }
}
