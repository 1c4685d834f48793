use super::AsmTransition;

/// The state authority's machine is a singleton with this identity.
pub const DOS_IDENTITY: &str = "DoS";

/// Marker for the Department of State (state authority) dashboard machine.
#[derive(Debug, Clone, Copy)]
pub struct DosDashboardMachine;

vocabulary! {
    /// States of the state authority's dashboard.
    pub enum DosDashboardState {
        Initial => "DOS_INITIAL_STATE",
        PartialAuditInfoSet => "PARTIAL_AUDIT_INFO_SET",
        CompleteAuditInfoSet => "COMPLETE_AUDIT_INFO_SET",
        SeedPublished => "RANDOM_SEED_PUBLISHED",
        AuditOngoing => "DOS_AUDIT_ONGOING",
        RoundComplete => "DOS_ROUND_COMPLETE",
        AuditComplete => "DOS_AUDIT_COMPLETE",
        ResultsPublished => "AUDIT_RESULTS_PUBLISHED",
    }
}

vocabulary! {
    /// Events observed by the state authority's dashboard.
    pub enum DosDashboardEvent {
        PartialAuditInfo => "PARTIAL_AUDIT_INFO_EVENT",
        CompleteAuditInfo => "COMPLETE_AUDIT_INFO_EVENT",
        PublicSeed => "PUBLIC_SEED_EVENT",
        StartRound => "DOS_START_ROUND_EVENT",
        /// A ballot was audited somewhere in the state.
        Audit => "AUDIT_EVENT",
        CountyAuditComplete => "DOS_COUNTY_AUDIT_COMPLETE_EVENT",
        RoundComplete => "DOS_ROUND_COMPLETE_EVENT",
        AuditComplete => "DOS_AUDIT_COMPLETE_EVENT",
        PublishAuditReport => "PUBLISH_AUDIT_REPORT_EVENT",
    }
}

pub(super) fn transitions() -> Vec<AsmTransition<DosDashboardState, DosDashboardEvent>> {
    use DosDashboardEvent::*;
    use DosDashboardState as S;

    vec![
        AsmTransition::new(
            [S::Initial, S::PartialAuditInfoSet],
            [PartialAuditInfo],
            S::PartialAuditInfoSet,
        ),
        AsmTransition::new(
            [S::Initial, S::PartialAuditInfoSet, S::CompleteAuditInfoSet],
            [CompleteAuditInfo],
            S::CompleteAuditInfoSet,
        ),
        AsmTransition::new([S::CompleteAuditInfoSet], [PublicSeed], S::SeedPublished),
        AsmTransition::new([S::SeedPublished], [StartRound], S::AuditOngoing),
        AsmTransition::new(
            [S::AuditOngoing],
            [Audit, CountyAuditComplete, StartRound],
            S::AuditOngoing,
        ),
        AsmTransition::new([S::AuditOngoing], [RoundComplete], S::RoundComplete),
        AsmTransition::new([S::RoundComplete], [StartRound], S::AuditOngoing),
        AsmTransition::new(
            [S::SeedPublished, S::AuditOngoing, S::RoundComplete],
            [AuditComplete],
            S::AuditComplete,
        ),
        AsmTransition::new([S::AuditComplete], [PublishAuditReport], S::ResultsPublished),
    ]
}
