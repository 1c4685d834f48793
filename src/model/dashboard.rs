use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asm::DOS_IDENTITY;
use crate::model::{CountyId, CvrToAudit};

/// Parameters of the audit, entered by the state authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub election_type: Option<String>,
    pub election_date: Option<DateTime<Utc>>,
    pub public_meeting_date: Option<DateTime<Utc>>,
    pub risk_limit: Option<f64>,
}

impl AuditInfo {
    /// Is every parameter needed to publish a seed present?
    pub fn is_complete(&self) -> bool {
        self.election_type.is_some()
            && self.election_date.is_some()
            && self.public_meeting_date.is_some()
            && self.risk_limit.is_some()
    }

    /// Overwrite the parameters present in `other`.
    pub fn update(&mut self, other: AuditInfo) {
        if other.election_type.is_some() {
            self.election_type = other.election_type;
        }
        if other.election_date.is_some() {
            self.election_date = other.election_date;
        }
        if other.public_meeting_date.is_some() {
            self.public_meeting_date = other.public_meeting_date;
        }
        if other.risk_limit.is_some() {
            self.risk_limit = other.risk_limit;
        }
    }
}

/// The state authority's audit-wide data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosDashboard {
    #[serde(rename = "_id")]
    pub id: String,
    pub audit_info: AuditInfo,
    /// The published random seed; immutable once set.
    pub seed: Option<String>,
}

impl Default for DosDashboard {
    fn default() -> Self {
        Self {
            id: DOS_IDENTITY.to_string(),
            audit_info: AuditInfo::default(),
            seed: None,
        }
    }
}

/// One round of a county's audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based.
    pub number: u32,
    /// Number of draws taken for this round.
    pub expected_count: u64,
    /// PRNG index of the first draw (inclusive).
    pub start_index: u64,
    /// PRNG index after the last draw (exclusive).
    pub end_index: u64,
    /// Ballots to audit, in display order.
    pub ballots: Vec<CvrToAudit>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Round {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A county's audit progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountyDashboard {
    #[serde(rename = "_id")]
    pub county_id: CountyId,
    pub manifest_upload_timestamp: Option<DateTime<Utc>>,
    pub cvr_upload_timestamp: Option<DateTime<Utc>>,
    /// Contests whose outcome determines how many ballots must be audited.
    pub driving_contests: Vec<String>,
    /// Externally estimated number of ballots still to audit.
    pub estimated_samples_to_audit: u64,
    pub rounds: Vec<Round>,
    pub audit_board_signed_in: bool,
    pub audited_ballot_count: u64,
}

impl CountyDashboard {
    pub fn new(county_id: CountyId) -> Self {
        Self {
            county_id,
            manifest_upload_timestamp: None,
            cvr_upload_timestamp: None,
            driving_contests: Vec::new(),
            estimated_samples_to_audit: 0,
            rounds: Vec::new(),
            audit_board_signed_in: false,
            audited_ballot_count: 0,
        }
    }

    /// The round in progress, if any.
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last().filter(|round| round.is_open())
    }

    /// PRNG index at which the next round's draws begin.
    pub fn draw_cursor(&self) -> u64 {
        self.rounds.last().map_or(0, |round| round.end_index)
    }

    /// Record a new round covering draws `[start_index, start_index + count)`.
    pub fn begin_round(&mut self, count: u64, ballots: Vec<CvrToAudit>, now: DateTime<Utc>) -> &Round {
        let start_index = self.draw_cursor();
        let number = self.rounds.len() as u32 + 1;
        self.rounds.push(Round {
            number,
            expected_count: count,
            start_index,
            end_index: start_index + count,
            ballots,
            start_time: now,
            end_time: None,
        });
        &self.rounds[self.rounds.len() - 1]
    }

    /// Close the round in progress. Returns `false` if none was open.
    pub fn end_round(&mut self, now: DateTime<Utc>) -> bool {
        match self.rounds.last_mut() {
            Some(round) if round.is_open() => {
                round.end_time = Some(now);
                true
            }
            _ => false,
        }
    }
}
