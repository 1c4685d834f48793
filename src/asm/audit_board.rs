use super::AsmTransition;

/// Marker for the audit board dashboard machine; one instance per county.
#[derive(Debug, Clone, Copy)]
pub struct AuditBoardDashboardMachine;

vocabulary! {
    /// States of a county audit board's dashboard.
    pub enum AuditBoardDashboardState {
        Initial => "AUDIT_INITIAL_STATE",
        WaitingNoBoard => "WAITING_FOR_ROUND_START_NO_AUDIT_BOARD",
        WaitingWithBoard => "WAITING_FOR_ROUND_START",
        RoundInProgress => "ROUND_IN_PROGRESS",
        RoundInProgressNoBoard => "ROUND_IN_PROGRESS_NO_AUDIT_BOARD",
        WaitingSignOff => "WAITING_FOR_ROUND_SIGN_OFF",
        WaitingSignOffNoBoard => "WAITING_FOR_ROUND_SIGN_OFF_NO_AUDIT_BOARD",
        AuditComplete => "AUDIT_COMPLETE",
        UnableToAudit => "UNABLE_TO_AUDIT",
        Aborted => "AUDIT_ABORTED",
    }
}

vocabulary! {
    /// Events observed by a county audit board's dashboard.
    pub enum AuditBoardDashboardEvent {
        RoundStart => "ROUND_START_EVENT",
        SignIn => "SIGN_IN_AUDIT_BOARD_EVENT",
        SignOut => "SIGN_OUT_AUDIT_BOARD_EVENT",
        NoContestsToAudit => "NO_CONTESTS_TO_AUDIT_EVENT",
        RiskLimitAchieved => "RISK_LIMIT_ACHIEVED_EVENT",
        BallotsExhausted => "BALLOTS_EXHAUSTED_EVENT",
        CountyDeadlineMissed => "COUNTY_DEADLINE_MISSED_EVENT",
        ReportMarkings => "REPORT_MARKINGS_EVENT",
        ReportBallotNotFound => "REPORT_BALLOT_NOT_FOUND_EVENT",
        SubmitInvestigationReport => "SUBMIT_AUDIT_INVESTIGATION_REPORT_EVENT",
        RoundComplete => "ROUND_COMPLETE_EVENT",
        RoundSignOff => "ROUND_SIGN_OFF_EVENT",
        AbortAudit => "ABORT_AUDIT_EVENT",
    }
}

pub(super) fn transitions(
) -> Vec<AsmTransition<AuditBoardDashboardState, AuditBoardDashboardEvent>> {
    use AuditBoardDashboardEvent::*;
    use AuditBoardDashboardState as S;

    vec![
        AsmTransition::new(
            [S::Initial, S::WaitingNoBoard],
            [RoundStart],
            S::RoundInProgressNoBoard,
        ),
        AsmTransition::new([S::Initial, S::WaitingNoBoard], [SignIn], S::WaitingWithBoard),
        // Round-one outcomes may arrive after an early sign-in.
        AsmTransition::new(
            [S::Initial, S::WaitingNoBoard, S::WaitingWithBoard],
            [NoContestsToAudit],
            S::AuditComplete,
        ),
        AsmTransition::new([S::Initial], [RiskLimitAchieved], S::AuditComplete),
        AsmTransition::new(
            [S::Initial, S::WaitingNoBoard, S::WaitingWithBoard],
            [CountyDeadlineMissed],
            S::UnableToAudit,
        ),
        AsmTransition::new([S::WaitingWithBoard], [RoundStart], S::RoundInProgress),
        AsmTransition::new([S::WaitingWithBoard], [SignOut], S::WaitingNoBoard),
        AsmTransition::new([S::WaitingWithBoard], [RiskLimitAchieved], S::AuditComplete),
        AsmTransition::new(
            [S::RoundInProgress],
            [ReportMarkings, ReportBallotNotFound, SubmitInvestigationReport],
            S::RoundInProgress,
        ),
        AsmTransition::new([S::RoundInProgress], [SignOut], S::RoundInProgressNoBoard),
        AsmTransition::new([S::RoundInProgress], [RoundComplete], S::WaitingSignOff),
        AsmTransition::new([S::RoundInProgressNoBoard], [SignIn], S::RoundInProgress),
        AsmTransition::new([S::WaitingSignOff], [SignOut], S::WaitingSignOffNoBoard),
        AsmTransition::new([S::WaitingSignOff], [RoundSignOff], S::WaitingWithBoard),
        AsmTransition::new(
            [S::WaitingSignOff],
            [RiskLimitAchieved, BallotsExhausted],
            S::AuditComplete,
        ),
        AsmTransition::new([S::WaitingSignOffNoBoard], [SignIn], S::WaitingSignOff),
        AsmTransition::new(
            [
                S::Initial,
                S::WaitingWithBoard,
                S::WaitingNoBoard,
                S::RoundInProgress,
                S::RoundInProgressNoBoard,
                S::WaitingSignOff,
                S::WaitingSignOffNoBoard,
            ],
            [AbortAudit],
            S::Aborted,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{Asm, Machine};
    use std::sync::Arc;

    use AuditBoardDashboardEvent::*;
    use AuditBoardDashboardState as S;

    fn asm() -> Asm<AuditBoardDashboardMachine> {
        Asm::new(Arc::new(AuditBoardDashboardMachine::definition().unwrap()), "7")
    }

    #[test]
    fn round_cycle_with_board() {
        let mut asm = asm();
        assert_eq!(asm.step(SignIn).unwrap(), S::WaitingWithBoard);
        assert_eq!(asm.step(RoundStart).unwrap(), S::RoundInProgress);
        assert_eq!(asm.step(ReportMarkings).unwrap(), S::RoundInProgress);
        assert_eq!(asm.step(ReportBallotNotFound).unwrap(), S::RoundInProgress);
        assert_eq!(asm.step(RoundComplete).unwrap(), S::WaitingSignOff);
        assert_eq!(asm.step(RoundSignOff).unwrap(), S::WaitingWithBoard);
        assert_eq!(asm.step(RoundStart).unwrap(), S::RoundInProgress);
        assert_eq!(asm.step(RoundComplete).unwrap(), S::WaitingSignOff);
        assert_eq!(asm.step(BallotsExhausted).unwrap(), S::AuditComplete);
        assert!(asm.is_in_final_state());
    }

    #[test]
    fn board_may_step_away() {
        let mut asm = asm();
        assert_eq!(asm.step(RoundStart).unwrap(), S::RoundInProgressNoBoard);
        // Nothing can be reported without a board.
        asm.step(ReportMarkings).unwrap_err();
        assert_eq!(asm.step(SignIn).unwrap(), S::RoundInProgress);
        assert_eq!(asm.step(SignOut).unwrap(), S::RoundInProgressNoBoard);
        assert_eq!(asm.step(SignIn).unwrap(), S::RoundInProgress);
        assert_eq!(asm.step(RoundComplete).unwrap(), S::WaitingSignOff);
        assert_eq!(asm.step(SignOut).unwrap(), S::WaitingSignOffNoBoard);
        asm.step(RoundSignOff).unwrap_err();
        assert_eq!(asm.step(SignIn).unwrap(), S::WaitingSignOff);
        assert_eq!(asm.step(RoundSignOff).unwrap(), S::WaitingWithBoard);
        assert_eq!(asm.step(SignOut).unwrap(), S::WaitingNoBoard);
        assert_eq!(asm.step(RoundStart).unwrap(), S::RoundInProgressNoBoard);
    }

    #[test]
    fn deadline_missed_before_any_round() {
        let mut asm = asm();
        assert_eq!(asm.step(CountyDeadlineMissed).unwrap(), S::UnableToAudit);
        assert!(asm.is_in_final_state());

        let mut asm = self::asm();
        asm.step(SignIn).unwrap();
        assert_eq!(asm.step(CountyDeadlineMissed).unwrap(), S::UnableToAudit);

        let mut asm = self::asm();
        asm.step(SignIn).unwrap();
        asm.step(SignOut).unwrap();
        assert_eq!(asm.step(CountyDeadlineMissed).unwrap(), S::UnableToAudit);

        let mut asm = self::asm();
        asm.step(RoundStart).unwrap();
        asm.step(CountyDeadlineMissed).unwrap_err();
        assert_eq!(asm.current_state(), S::RoundInProgressNoBoard);
    }

    #[test]
    fn abort_from_any_live_state() {
        for &state in AuditBoardDashboardState::ALL {
            let definition = AuditBoardDashboardMachine::definition().unwrap();
            let expected = if definition.is_final(state) {
                None
            } else {
                Some(S::Aborted)
            };
            assert_eq!(definition.next_state(state, AbortAudit), expected, "{state}");
        }
    }

    #[test]
    fn nothing_to_audit_completes_immediately() {
        let mut asm = asm();
        assert_eq!(asm.step(NoContestsToAudit).unwrap(), S::AuditComplete);
        asm.step(AbortAudit).unwrap_err();

        let mut asm = self::asm();
        asm.step(SignIn).unwrap();
        assert_eq!(asm.step(NoContestsToAudit).unwrap(), S::AuditComplete);
    }
}
