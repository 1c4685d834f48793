use std::sync::Arc;

use chrono::Utc;

use crate::asm::{
    Asm, AuditBoardDashboardEvent, AuditBoardDashboardMachine, AuditBoardDashboardState,
    CountyDashboardEvent, CountyDashboardMachine, CountyDashboardState, DosDashboardEvent,
    DosDashboardMachine, DosDashboardState, DOS_IDENTITY,
};
use crate::controller::AsmController;
use crate::error::{Error, Result};
use crate::logging::traced;
use crate::model::{
    AuditInfo, BallotManifestInfo, CastVoteRecord, CountyDashboard, CountyId, CvrToAudit,
    DosDashboard,
};
use crate::store::Store;

/// Published seeds are strings of decimal digits at least this long.
pub const MIN_SEED_LENGTH: usize = 20;

/// How a county's audit reached its goal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuditCompletion {
    RiskLimitAchieved,
    BallotsExhausted,
}

impl From<AuditCompletion> for AuditBoardDashboardEvent {
    fn from(completion: AuditCompletion) -> Self {
        match completion {
            AuditCompletion::RiskLimitAchieved => Self::RiskLimitAchieved,
            AuditCompletion::BallotsExhausted => Self::BallotsExhausted,
        }
    }
}

/// The audit protocol's external triggers.
///
/// Each trigger loads the machines it needs, steps them, and saves them along
/// with the dashboard data it changed; if any step is illegal, nothing the
/// trigger touched is saved. Triggers for different counties run in parallel.
pub struct AuditWorkflow<S> {
    pub(super) asms: AsmController<S>,
}

impl<S: Store> AuditWorkflow<S> {
    pub fn new(store: Arc<S>) -> Result<Self> {
        Ok(Self {
            asms: AsmController::new(store)?,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        self.asms.store()
    }

    pub fn asms(&self) -> &AsmController<S> {
        &self.asms
    }

    pub fn dos_state(&self) -> Result<DosDashboardState> {
        self.asms.current_state::<DosDashboardMachine>(DOS_IDENTITY)
    }

    pub fn county_state(&self, county_id: CountyId) -> Result<CountyDashboardState> {
        self.asms
            .current_state::<CountyDashboardMachine>(&county_id.to_string())
    }

    pub fn audit_board_state(&self, county_id: CountyId) -> Result<AuditBoardDashboardState> {
        self.asms
            .current_state::<AuditBoardDashboardMachine>(&county_id.to_string())
    }

    pub fn dos_dashboard(&self) -> Result<DosDashboard> {
        self.store().dos_dashboard()
    }

    pub fn county_dashboard(&self, county_id: CountyId) -> Result<CountyDashboard> {
        self.store()
            .county_dashboard(county_id)?
            .ok_or_else(|| Error::not_found(format!("county {county_id}")))
    }

    /// Run `f` with the county's machine and dashboard held, saving both if
    /// it succeeds.
    pub(super) fn with_county<T>(
        &self,
        county_id: CountyId,
        f: impl FnOnce(&mut Asm<CountyDashboardMachine>, &mut CountyDashboard) -> Result<T>,
    ) -> Result<T> {
        self.asms
            .with_asm::<CountyDashboardMachine, _>(&county_id.to_string(), |county| {
                let mut dashboard = self.county_dashboard(county_id)?;
                let output = f(county, &mut dashboard)?;
                self.store().save_county_dashboard(&dashboard)?;
                Ok(output)
            })
    }

    /// Run `f` with the county's machine, its audit board's machine and its
    /// dashboard held.
    fn with_audit_board<T>(
        &self,
        county_id: CountyId,
        f: impl FnOnce(&mut Asm<AuditBoardDashboardMachine>, &mut CountyDashboard) -> Result<T>,
    ) -> Result<T> {
        self.with_county(county_id, |_, dashboard| {
            self.asms
                .with_asm::<AuditBoardDashboardMachine, _>(&county_id.to_string(), |board| {
                    f(board, dashboard)
                })
        })
    }

    /// Create a dashboard for each county that does not have one yet.
    pub fn register_counties(&self, county_ids: &[CountyId]) -> Result<()> {
        traced("register_counties", format!("{county_ids:?}"), || {
            for &county_id in county_ids {
                self.asms
                    .with_asm::<CountyDashboardMachine, _>(&county_id.to_string(), |_| {
                        if self.store().county_dashboard(county_id)?.is_none() {
                            debug!("Registering county {county_id}");
                            self.store()
                                .save_county_dashboard(&CountyDashboard::new(county_id))?;
                        }
                        Ok(())
                    })?;
            }
            Ok(())
        })
    }

    /// Merge `info` into the audit parameters.
    pub fn submit_audit_info(&self, info: AuditInfo) -> Result<DosDashboardState> {
        traced("submit_audit_info", "", || {
            self.asms
                .with_asm::<DosDashboardMachine, _>(DOS_IDENTITY, |dos| {
                    let mut dashboard = self.store().dos_dashboard()?;
                    dashboard.audit_info.update(info);
                    let event = if dashboard.audit_info.is_complete() {
                        DosDashboardEvent::CompleteAuditInfo
                    } else {
                        DosDashboardEvent::PartialAuditInfo
                    };
                    let state = dos.step(event)?;
                    self.store().save_dos_dashboard(&dashboard)?;
                    Ok(state)
                })
        })
    }

    /// Publish the audit's random seed. It cannot be changed afterwards.
    pub fn publish_seed(&self, seed: &str) -> Result<()> {
        traced("publish_seed", seed, || {
            if seed.len() < MIN_SEED_LENGTH || !seed.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::BadRequest(format!(
                    "seed must be at least {MIN_SEED_LENGTH} decimal digits"
                )));
            }
            self.asms
                .with_asm::<DosDashboardMachine, _>(DOS_IDENTITY, |dos| {
                    dos.step(DosDashboardEvent::PublicSeed)?;
                    let mut dashboard = self.store().dos_dashboard()?;
                    dashboard.seed = Some(seed.to_string());
                    self.store().save_dos_dashboard(&dashboard)
                })
        })
    }

    /// Record the contests driving a county's audit and the estimated number
    /// of ballots needed to reach the risk limit.
    pub fn set_audit_targets(
        &self,
        county_id: CountyId,
        driving_contests: Vec<String>,
        estimated_samples_to_audit: u64,
    ) -> Result<()> {
        traced("set_audit_targets", county_id, || {
            self.with_county(county_id, |_, dashboard| {
                dashboard.driving_contests = driving_contests;
                dashboard.estimated_samples_to_audit = estimated_samples_to_audit;
                Ok(())
            })
        })
    }

    /// A county's ballot manifest has been parsed. Returns its ballot count.
    pub fn ballot_manifest_uploaded(
        &self,
        county_id: CountyId,
        records: Vec<BallotManifestInfo>,
    ) -> Result<u64> {
        traced("ballot_manifest_uploaded", county_id, || {
            self.with_county(county_id, |county, dashboard| {
                county.step(CountyDashboardEvent::UploadBallotManifest)?;
                let total = self.store().import_manifest(county_id, records)?;
                dashboard.manifest_upload_timestamp = Some(Utc::now());
                info!("County {county_id} manifest covers {total} ballots");
                Ok(total)
            })
        })
    }

    /// A county's cast vote records have been parsed. Returns how many.
    pub fn cvrs_uploaded(&self, county_id: CountyId, cvrs: Vec<CastVoteRecord>) -> Result<usize> {
        traced("cvrs_uploaded", county_id, || {
            self.with_county(county_id, |county, dashboard| {
                county.step(CountyDashboardEvent::UploadCvrs)?;
                let count = self.store().import_cvrs(county_id, cvrs)?;
                dashboard.cvr_upload_timestamp = Some(Utc::now());
                info!("County {county_id} uploaded {count} CVRs");
                Ok(count)
            })
        })
    }

    pub fn sign_in_audit_board(&self, county_id: CountyId) -> Result<AuditBoardDashboardState> {
        traced("sign_in_audit_board", county_id, || {
            self.with_audit_board(county_id, |board, dashboard| {
                let state = board.step(AuditBoardDashboardEvent::SignIn)?;
                dashboard.audit_board_signed_in = true;
                Ok(state)
            })
        })
    }

    pub fn sign_out_audit_board(&self, county_id: CountyId) -> Result<AuditBoardDashboardState> {
        traced("sign_out_audit_board", county_id, || {
            self.with_audit_board(county_id, |board, dashboard| {
                let state = board.step(AuditBoardDashboardEvent::SignOut)?;
                dashboard.audit_board_signed_in = false;
                Ok(state)
            })
        })
    }

    /// Record that the audit board has interpreted a ballot of the current round.
    pub fn report_markings(&self, county_id: CountyId, imprinted_id: &str) -> Result<()> {
        traced("report_markings", format!("{county_id} {imprinted_id}"), || {
            self.report_ballot(county_id, imprinted_id, AuditBoardDashboardEvent::ReportMarkings)
        })
    }

    /// Record that a ballot of the current round could not be found.
    pub fn report_ballot_not_found(&self, county_id: CountyId, imprinted_id: &str) -> Result<()> {
        traced("report_ballot_not_found", format!("{county_id} {imprinted_id}"), || {
            self.report_ballot(
                county_id,
                imprinted_id,
                AuditBoardDashboardEvent::ReportBallotNotFound,
            )
        })
    }

    fn report_ballot(
        &self,
        county_id: CountyId,
        imprinted_id: &str,
        event: AuditBoardDashboardEvent,
    ) -> Result<()> {
        self.with_audit_board(county_id, |board, dashboard| {
            board.step(event)?;
            let round = dashboard.current_round().ok_or_else(|| {
                Error::InvariantViolation(format!("county {county_id} has no round in progress"))
            })?;
            if !round.ballots.iter().any(|b| b.imprinted_id == imprinted_id) {
                return Err(Error::BadRequest(format!(
                    "ballot {imprinted_id} is not in round {} of county {county_id}",
                    round.number
                )));
            }
            dashboard.audited_ballot_count += 1;
            Ok(())
        })?;
        self.asms
            .step::<DosDashboardMachine>(DOS_IDENTITY, DosDashboardEvent::Audit)?;
        Ok(())
    }

    pub fn submit_investigation_report(&self, county_id: CountyId, report: &str) -> Result<()> {
        traced("submit_investigation_report", county_id, || {
            self.with_audit_board(county_id, |board, _| {
                board.step(AuditBoardDashboardEvent::SubmitInvestigationReport)?;
                info!("County {county_id} investigation report: {report}");
                Ok(())
            })?;
            self.asms
                .step::<DosDashboardMachine>(DOS_IDENTITY, DosDashboardEvent::Audit)?;
            Ok(())
        })
    }

    /// The audit board has finished the current round. Once no county has a
    /// round open, the state authority's round is complete too.
    pub fn complete_round(&self, county_id: CountyId) -> Result<AuditBoardDashboardState> {
        traced("complete_round", county_id, || {
            let state = self.with_audit_board(county_id, |board, dashboard| {
                let state = board.step(AuditBoardDashboardEvent::RoundComplete)?;
                if !dashboard.end_round(Utc::now()) {
                    return Err(Error::InvariantViolation(format!(
                        "county {county_id} has no round in progress"
                    )));
                }
                Ok(state)
            })?;

            self.asms
                .with_asm::<DosDashboardMachine, _>(DOS_IDENTITY, |dos| {
                    if dos.current_state() != DosDashboardState::AuditOngoing {
                        return Ok(());
                    }
                    for id in self.store().county_ids()? {
                        let open = self
                            .store()
                            .county_dashboard(id)?
                            .map_or(false, |d| d.current_round().is_some());
                        if open {
                            return Ok(());
                        }
                    }
                    info!("Every county has completed its round");
                    dos.step(DosDashboardEvent::RoundComplete).map(|_| ())
                })?;
            Ok(state)
        })
    }

    pub fn sign_off_round(&self, county_id: CountyId) -> Result<AuditBoardDashboardState> {
        traced("sign_off_round", county_id, || {
            self.with_audit_board(county_id, |board, _| {
                board.step(AuditBoardDashboardEvent::RoundSignOff)
            })
        })
    }

    /// End a county's audit successfully.
    pub fn finish_county_audit(&self, county_id: CountyId, completion: AuditCompletion) -> Result<()> {
        traced("finish_county_audit", format!("{county_id} {completion:?}"), || {
            self.with_county(county_id, |county, _| {
                county.step(CountyDashboardEvent::AuditComplete)?;
                self.asms
                    .with_asm::<AuditBoardDashboardMachine, _>(&county_id.to_string(), |board| {
                        board.step(completion.into())
                    })?;
                Ok(())
            })?;

            self.asms
                .with_asm::<DosDashboardMachine, _>(DOS_IDENTITY, |dos| {
                    if dos.is_enabled(DosDashboardEvent::CountyAuditComplete) {
                        dos.step(DosDashboardEvent::CountyAuditComplete)?;
                    }
                    Ok(())
                })
        })
    }

    /// Stop a county's audit board for good, closing any round in progress.
    pub fn abort_audit(&self, county_id: CountyId) -> Result<AuditBoardDashboardState> {
        traced("abort_audit", county_id, || {
            self.with_audit_board(county_id, |board, dashboard| {
                let state = board.step(AuditBoardDashboardEvent::AbortAudit)?;
                if dashboard.end_round(Utc::now()) {
                    warn!("County {county_id} aborted with a round in progress");
                }
                Ok(state)
            })
        })
    }

    pub fn complete_audit(&self) -> Result<DosDashboardState> {
        traced("complete_audit", "", || {
            self.asms
                .step::<DosDashboardMachine>(DOS_IDENTITY, DosDashboardEvent::AuditComplete)
        })
    }

    pub fn publish_audit_report(&self) -> Result<DosDashboardState> {
        traced("publish_audit_report", "", || {
            self.asms
                .step::<DosDashboardMachine>(DOS_IDENTITY, DosDashboardEvent::PublishAuditReport)
        })
    }

    /// The ballots of round `round` (1-based), or of the round in progress.
    pub fn ballots_to_audit(&self, county_id: CountyId, round: Option<u32>) -> Result<Vec<CvrToAudit>> {
        let dashboard = self.county_dashboard(county_id)?;
        let round = match round {
            Some(number) => number
                .checked_sub(1)
                .and_then(|i| dashboard.rounds.get(i as usize)),
            None => dashboard.current_round(),
        };
        round
            .map(|r| r.ballots.clone())
            .ok_or_else(|| Error::not_found(format!("round for county {county_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::{InMemoryStore, ManifestStore};

    const SEED: &str = "31415926535897932384";

    fn workflow() -> AuditWorkflow<InMemoryStore> {
        log4rs_test_utils::test_logging::init_logging_once_for(["rla_engine"], None, None);
        AuditWorkflow::new(Arc::new(InMemoryStore::new())).unwrap()
    }

    #[test]
    fn audit_info_then_seed() {
        let workflow = workflow();
        let partial = AuditInfo {
            election_type: Some("general".to_string()),
            ..Default::default()
        };
        assert_eq!(
            workflow.submit_audit_info(partial).unwrap(),
            DosDashboardState::PartialAuditInfoSet
        );
        // A seed cannot be published before the audit parameters are complete.
        assert!(workflow.publish_seed(SEED).unwrap_err().is_illegal_transition());

        assert_eq!(
            workflow.submit_audit_info(AuditInfo::example()).unwrap(),
            DosDashboardState::CompleteAuditInfoSet
        );
        assert!(matches!(
            workflow.publish_seed("123").unwrap_err(),
            Error::BadRequest(_)
        ));
        assert!(matches!(
            workflow.publish_seed("3141592653589793238x").unwrap_err(),
            Error::BadRequest(_)
        ));

        workflow.publish_seed(SEED).unwrap();
        assert_eq!(workflow.dos_state().unwrap(), DosDashboardState::SeedPublished);
        assert_eq!(workflow.dos_dashboard().unwrap().seed.as_deref(), Some(SEED));

        // The seed is immutable.
        let err = workflow.publish_seed("27182818284590452353").unwrap_err();
        assert!(err.is_illegal_transition());
        assert_eq!(workflow.dos_dashboard().unwrap().seed.as_deref(), Some(SEED));
        // So are the audit parameters.
        assert!(workflow
            .submit_audit_info(AuditInfo::example())
            .unwrap_err()
            .is_illegal_transition());
    }

    #[test]
    fn uploads_are_recorded() {
        let workflow = workflow();
        assert!(matches!(
            workflow.cvrs_uploaded(3, Vec::new()).unwrap_err(),
            Error::NotFound(_)
        ));
        workflow.register_counties(&[3]).unwrap();

        let manifest = BallotManifestInfo::county_examples(3);
        let cvrs = CastVoteRecord::for_manifest(3, &manifest);
        assert_eq!(workflow.cvrs_uploaded(3, cvrs).unwrap(), 40);
        assert_eq!(workflow.county_state(3).unwrap(), CountyDashboardState::CvrsOk);
        assert_eq!(workflow.ballot_manifest_uploaded(3, manifest).unwrap(), 40);
        assert_eq!(
            workflow.county_state(3).unwrap(),
            CountyDashboardState::ManifestAndCvrsOk
        );

        let dashboard = workflow.county_dashboard(3).unwrap();
        assert!(dashboard.manifest_upload_timestamp.is_some());
        assert!(dashboard.cvr_upload_timestamp.is_some());
    }

    #[test]
    fn rejected_upload_changes_nothing() {
        let workflow = workflow();
        workflow.register_counties(&[3]).unwrap();

        let mut manifest = BallotManifestInfo::county_examples(3);
        manifest.remove(1);
        assert!(matches!(
            workflow.ballot_manifest_uploaded(3, manifest).unwrap_err(),
            Error::ManifestIntegrity { .. }
        ));
        assert_eq!(workflow.county_state(3).unwrap(), CountyDashboardState::Initial);
        assert!(workflow
            .county_dashboard(3)
            .unwrap()
            .manifest_upload_timestamp
            .is_none());
        assert_eq!(workflow.store().count_ballots(3).unwrap(), None);
    }

    #[test]
    fn board_sign_in_is_tracked() {
        let workflow = workflow();
        workflow.register_counties(&[8]).unwrap();
        assert_eq!(
            workflow.sign_in_audit_board(8).unwrap(),
            AuditBoardDashboardState::WaitingWithBoard
        );
        assert!(workflow.county_dashboard(8).unwrap().audit_board_signed_in);
        assert!(workflow.sign_in_audit_board(8).unwrap_err().is_illegal_transition());

        assert_eq!(
            workflow.sign_out_audit_board(8).unwrap(),
            AuditBoardDashboardState::WaitingNoBoard
        );
        assert!(!workflow.county_dashboard(8).unwrap().audit_board_signed_in);
    }

    #[test]
    fn audit_completion_requires_an_audit() {
        let workflow = workflow();
        workflow.register_counties(&[2]).unwrap();
        // The board could complete from its initial state, but the county
        // has not started auditing.
        let err = workflow
            .finish_county_audit(2, AuditCompletion::RiskLimitAchieved)
            .unwrap_err();
        assert!(err.is_illegal_transition());
        assert_eq!(
            workflow.audit_board_state(2).unwrap(),
            AuditBoardDashboardState::Initial
        );

        assert!(workflow.complete_audit().unwrap_err().is_illegal_transition());
        assert!(workflow.publish_audit_report().unwrap_err().is_illegal_transition());
    }

    #[test]
    fn abort_is_final() {
        let workflow = workflow();
        workflow.register_counties(&[6]).unwrap();
        assert_eq!(
            workflow.abort_audit(6).unwrap(),
            AuditBoardDashboardState::Aborted
        );
        assert!(workflow.sign_in_audit_board(6).unwrap_err().is_illegal_transition());
        assert!(workflow.abort_audit(6).unwrap_err().is_illegal_transition());
    }

    #[test]
    fn rounds_are_looked_up_by_number() {
        let workflow = workflow();
        workflow.register_counties(&[1]).unwrap();
        assert!(matches!(
            workflow.ballots_to_audit(1, None).unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(workflow.ballots_to_audit(1, Some(0)).is_err());
        assert!(workflow.ballots_to_audit(2, None).is_err());
    }
}
