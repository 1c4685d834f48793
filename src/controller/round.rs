use std::collections::BTreeMap;

use chrono::Utc;

use crate::asm::{
    Asm, AuditBoardDashboardEvent, AuditBoardDashboardMachine, CountyDashboardEvent,
    CountyDashboardMachine, CountyDashboardState, DosDashboardEvent, DosDashboardMachine,
    DosDashboardState, DOS_IDENTITY,
};
use crate::controller::ballot_selection::select_ballots;
use crate::controller::AuditWorkflow;
use crate::error::{Error, Result};
use crate::logging::traced;
use crate::model::{CountyDashboard, CountyId};
use crate::service::CountyService;
use crate::store::Store;

/// Largest number of draws a county may make in one round.
pub const MAX_ROUND_SIZE: u64 = 1_000_000;

/// How many ballots each county draws in a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundSize {
    /// Each county's externally estimated sample size, for every county.
    Estimated,
    /// Explicit sizes; only the named counties start a round.
    ///
    /// Ignored for the first round, which always uses the estimates.
    PerCounty(BTreeMap<CountyId, u64>),
}

/// What starting a round did to one county.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountyRoundStatus {
    Started { round: u32, ballots: usize },
    /// The county has nothing to audit, so its audit is already complete.
    NoBallotsToAudit,
    /// The county had not uploaded its files in time and cannot be audited.
    DeadlineMissed,
    /// A zero-size round: the risk limit has been met.
    RiskLimitAchieved,
    /// The county's audit board is not taking part in the audit.
    Skipped,
}

/// Per-county outcomes of one round start.
#[derive(Debug)]
pub struct RoundStartReport {
    /// Whether this started the audit's first round.
    pub round_one: bool,
    pub counties: BTreeMap<CountyId, Result<CountyRoundStatus>>,
}

impl RoundStartReport {
    pub fn status(&self, county_id: CountyId) -> Option<&Result<CountyRoundStatus>> {
        self.counties.get(&county_id)
    }

    /// Counties that started a round.
    pub fn started(&self) -> impl Iterator<Item = CountyId> + '_ {
        self.counties.iter().filter_map(|(&id, status)| {
            matches!(status, Ok(CountyRoundStatus::Started { .. })).then_some(id)
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (CountyId, &Error)> + '_ {
        self.counties
            .iter()
            .filter_map(|(&id, status)| status.as_ref().err().map(|e| (id, e)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl<S: Store> AuditWorkflow<S> {
    /// Start the next audit round.
    ///
    /// Fails as a whole only if the state authority cannot start a round.
    /// Otherwise each county is started independently and its outcome
    /// reported; a county that fails is left as it was.
    pub fn start_round(&self, size: RoundSize) -> Result<RoundStartReport> {
        traced("start_round", format!("{size:?}"), || {
            self.asms
                .with_asm::<DosDashboardMachine, _>(DOS_IDENTITY, |dos| {
                    let round_one = dos.current_state() == DosDashboardState::SeedPublished;
                    dos.step(DosDashboardEvent::StartRound)?;

                    let mut counties = BTreeMap::new();
                    if round_one {
                        for county_id in self.store().county_ids()? {
                            let status = self.with_county(county_id, |county, dashboard| {
                                self.begin_county_audit(county_id, county, dashboard)
                            });
                            counties.insert(county_id, status);
                        }
                    } else {
                        let county_ids = match &size {
                            RoundSize::Estimated => self.store().county_ids()?,
                            RoundSize::PerCounty(sizes) => sizes.keys().copied().collect(),
                        };
                        for county_id in county_ids {
                            let explicit = match &size {
                                RoundSize::Estimated => None,
                                RoundSize::PerCounty(sizes) => sizes.get(&county_id).copied(),
                            };
                            counties.insert(county_id, self.start_county_round(county_id, explicit));
                        }
                    }

                    let report = RoundStartReport {
                        round_one,
                        counties,
                    };
                    for (county_id, e) in report.failures() {
                        error!("County {county_id} could not start its round: {e}");
                    }
                    Ok(report)
                })
        })
    }

    /// Take a county into its audit: round one, or its first round after a
    /// failed attempt.
    fn begin_county_audit(
        &self,
        county_id: CountyId,
        county: &mut Asm<CountyDashboardMachine>,
        dashboard: &mut CountyDashboard,
    ) -> Result<CountyRoundStatus> {
        let identity = county_id.to_string();
        if dashboard.cvr_upload_timestamp.is_none() {
            warn!("County {county_id} missed the file upload deadline");
        }
        let event = if county.is_enabled(CountyDashboardEvent::StartAudit) {
            CountyDashboardEvent::StartAudit
        } else {
            CountyDashboardEvent::DeadlineMissed
        };
        county.step(event)?;

        if county.current_state() != CountyDashboardState::AuditUnderway {
            self.asms.step::<AuditBoardDashboardMachine>(
                &identity,
                AuditBoardDashboardEvent::CountyDeadlineMissed,
            )?;
            return Ok(CountyRoundStatus::DeadlineMissed);
        }

        if dashboard.driving_contests.is_empty() || dashboard.estimated_samples_to_audit == 0 {
            info!("County {county_id} has no ballots to audit");
            county.step(CountyDashboardEvent::AuditComplete)?;
            self.asms.step::<AuditBoardDashboardMachine>(
                &identity,
                AuditBoardDashboardEvent::NoContestsToAudit,
            )?;
            return Ok(CountyRoundStatus::NoBallotsToAudit);
        }

        let size = dashboard.estimated_samples_to_audit;
        self.asms
            .with_asm::<AuditBoardDashboardMachine, _>(&identity, |board| {
                board.step(AuditBoardDashboardEvent::RoundStart)?;
                self.materialize_round(county_id, dashboard, size)
            })
    }

    /// Start a round after the first for one county.
    fn start_county_round(&self, county_id: CountyId, explicit: Option<u64>) -> Result<CountyRoundStatus> {
        self.with_county(county_id, |county, dashboard| {
            if county.is_enabled(CountyDashboardEvent::StartAudit) {
                return self.begin_county_audit(county_id, county, dashboard);
            }
            if county.current_state() != CountyDashboardState::AuditUnderway {
                debug!("Skipping county {county_id} in {}", county.current_state());
                return Ok(CountyRoundStatus::Skipped);
            }
            self.asms
                .with_asm::<AuditBoardDashboardMachine, _>(&county_id.to_string(), |board| {
                    if board.is_in_initial_state() || board.is_in_final_state() {
                        debug!("Skipping county {county_id} in {}", board.current_state());
                        return Ok(CountyRoundStatus::Skipped);
                    }
                    if let Some(round) = dashboard.current_round() {
                        return Err(Error::InvariantViolation(format!(
                            "county {county_id} round {} is still in progress",
                            round.number
                        )));
                    }

                    let size = explicit.unwrap_or(dashboard.estimated_samples_to_audit);
                    if size == 0 {
                        board.step(AuditBoardDashboardEvent::RiskLimitAchieved)?;
                        county.step(CountyDashboardEvent::AuditComplete)?;
                        return Ok(CountyRoundStatus::RiskLimitAchieved);
                    }
                    board.step(AuditBoardDashboardEvent::RoundStart)?;
                    self.materialize_round(county_id, dashboard, size)
                })
        })
    }

    /// Draw the county's next `size` random numbers and record the round's ballots.
    fn materialize_round(
        &self,
        county_id: CountyId,
        dashboard: &mut CountyDashboard,
        size: u64,
    ) -> Result<CountyRoundStatus> {
        if size > MAX_ROUND_SIZE {
            return Err(Error::BadRequest(format!(
                "round of {size} ballots for county {county_id} exceeds {MAX_ROUND_SIZE}"
            )));
        }
        let from = dashboard.draw_cursor();
        let to = from.checked_add(size).ok_or_else(|| {
            Error::BadRequest(format!("round of {size} ballots for county {county_id} overflows"))
        })?;
        let index = |i: u64| {
            usize::try_from(i).map_err(|_| Error::Prng(format!("draw index {i} is out of range")))
        };
        let store = self.store().as_ref();
        let draws = CountyService::new(store, county_id).random_numbers(index(from)?, index(to)?)?;
        let ballots = select_ballots(store, &draws, county_id)?;

        let round = dashboard.begin_round(size, ballots, Utc::now());
        info!(
            "County {county_id} round {} covers draws [{}, {}): {} ballots",
            round.number,
            round.start_index,
            round.end_index,
            round.ballots.len()
        );
        Ok(CountyRoundStatus::Started {
            round: round.number,
            ballots: round.ballots.len(),
        })
    }
}
