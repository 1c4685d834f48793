use super::AsmTransition;

/// Marker for the county dashboard machine; one instance per county.
#[derive(Debug, Clone, Copy)]
pub struct CountyDashboardMachine;

vocabulary! {
    /// States of a county's dashboard.
    pub enum CountyDashboardState {
        Initial => "COUNTY_INITIAL_STATE",
        ManifestOk => "BALLOT_MANIFEST_OK",
        CvrsOk => "CVRS_OK",
        ManifestAndCvrsOk => "BALLOT_MANIFEST_AND_CVRS_OK",
        AuditUnderway => "COUNTY_AUDIT_UNDERWAY",
        AuditComplete => "COUNTY_AUDIT_COMPLETE",
        DeadlineMissed => "DEADLINE_MISSED",
    }
}

vocabulary! {
    /// Events observed by a county's dashboard.
    pub enum CountyDashboardEvent {
        UploadBallotManifest => "UPLOAD_BALLOT_MANIFEST_EVENT",
        UploadCvrs => "UPLOAD_CVRS_EVENT",
        StartAudit => "COUNTY_START_AUDIT_EVENT",
        AuditComplete => "COUNTY_AUDIT_COMPLETE_EVENT",
        /// The upload deadline passed before both files were accepted.
        DeadlineMissed => "COUNTY_DEADLINE_MISSED_EVENT",
    }
}

pub(super) fn transitions() -> Vec<AsmTransition<CountyDashboardState, CountyDashboardEvent>> {
    use CountyDashboardEvent::*;
    use CountyDashboardState as S;

    vec![
        AsmTransition::new([S::Initial], [UploadBallotManifest], S::ManifestOk),
        AsmTransition::new([S::Initial], [UploadCvrs], S::CvrsOk),
        AsmTransition::new([S::ManifestOk], [UploadCvrs], S::ManifestAndCvrsOk),
        AsmTransition::new([S::ManifestOk], [UploadBallotManifest], S::ManifestOk),
        AsmTransition::new([S::CvrsOk], [UploadBallotManifest], S::ManifestAndCvrsOk),
        AsmTransition::new([S::CvrsOk], [UploadCvrs], S::CvrsOk),
        AsmTransition::new(
            [S::ManifestAndCvrsOk],
            [UploadBallotManifest, UploadCvrs],
            S::ManifestAndCvrsOk,
        ),
        AsmTransition::new([S::ManifestAndCvrsOk], [StartAudit], S::AuditUnderway),
        AsmTransition::new([S::AuditUnderway], [AuditComplete], S::AuditComplete),
        AsmTransition::new(
            [S::Initial, S::ManifestOk, S::CvrsOk],
            [DeadlineMissed],
            S::DeadlineMissed,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{Asm, Machine};
    use crate::error::Error;
    use std::sync::Arc;

    fn asm() -> Asm<CountyDashboardMachine> {
        Asm::new(Arc::new(CountyDashboardMachine::definition().unwrap()), "7")
    }

    #[test]
    fn uploads_then_start() {
        use CountyDashboardEvent::*;

        let mut asm = asm();
        assert!(asm.is_in_initial_state());
        assert_eq!(asm.step(UploadCvrs).unwrap(), CountyDashboardState::CvrsOk);
        assert_eq!(asm.step(UploadCvrs).unwrap(), CountyDashboardState::CvrsOk);
        assert_eq!(
            asm.step(UploadBallotManifest).unwrap(),
            CountyDashboardState::ManifestAndCvrsOk
        );
        assert_eq!(
            asm.step(UploadBallotManifest).unwrap(),
            CountyDashboardState::ManifestAndCvrsOk
        );
        assert_eq!(asm.step(StartAudit).unwrap(), CountyDashboardState::AuditUnderway);
        assert_eq!(asm.step(AuditComplete).unwrap(), CountyDashboardState::AuditComplete);
        assert!(asm.is_in_final_state());
    }

    #[test]
    fn deadline_missed_is_terminal() {
        use CountyDashboardEvent::*;

        let mut asm = asm();
        assert_eq!(asm.step(DeadlineMissed).unwrap(), CountyDashboardState::DeadlineMissed);
        assert!(asm.is_in_final_state());
        for &event in CountyDashboardEvent::ALL {
            asm.step(event).unwrap_err();
        }
        assert_eq!(asm.current_state(), CountyDashboardState::DeadlineMissed);
    }

    #[test]
    fn start_requires_both_files() {
        use CountyDashboardEvent::*;

        let mut asm = asm();
        asm.step(UploadBallotManifest).unwrap();
        match asm.step(StartAudit) {
            Err(Error::IllegalTransition { state, event, .. }) => {
                assert_eq!(state, "BALLOT_MANIFEST_OK");
                assert_eq!(event, "COUNTY_START_AUDIT_EVENT");
            }
            other => panic!("expected illegal transition, got {other:?}"),
        }
        assert_eq!(asm.current_state(), CountyDashboardState::ManifestOk);

        // Once ready, the deadline can no longer be missed.
        asm.step(UploadCvrs).unwrap();
        asm.step(DeadlineMissed).unwrap_err();
        assert_eq!(asm.current_state(), CountyDashboardState::ManifestAndCvrsOk);
    }
}
