//! Abstract state machines (ASMs) that gate the audit protocol.
//!
//! The engine itself ([`AsmDefinition`], [`Asm`]) knows nothing about audits;
//! the three dashboards instantiate it with closed state and event vocabularies.

use std::sync::Arc;

use thiserror::Error;

#[macro_use]
mod vocabulary;

mod audit_board;
mod county;
mod definition;
mod dos;
mod instance;

pub use audit_board::{AuditBoardDashboardEvent, AuditBoardDashboardMachine, AuditBoardDashboardState};
pub use county::{CountyDashboardEvent, CountyDashboardMachine, CountyDashboardState};
pub use definition::{flatten, AsmDefinition, AsmSymbol, AsmTransition, ConfigurationError};
pub use dos::{DosDashboardEvent, DosDashboardMachine, DosDashboardState, DOS_IDENTITY};
pub use instance::Asm;

/// A name that is not part of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown name {0}")]
pub struct UnknownName(pub String);

vocabulary! {
    /// The kinds of machine; each has its own state and event vocabulary.
    pub enum AsmKind {
        DosDashboard => "DoSDashboardASM",
        CountyDashboard => "CountyDashboardASM",
        AuditBoardDashboard => "AuditBoardDashboardASM",
    }
}

/// One concrete machine: its vocabularies and transition function.
pub trait Machine: Send + Sync + 'static {
    type State: AsmSymbol;
    type Event: AsmSymbol;

    const KIND: AsmKind;

    fn states() -> &'static [Self::State];
    fn events() -> &'static [Self::Event];
    fn transitions() -> Vec<AsmTransition<Self::State, Self::Event>>;
    fn initial_state() -> Self::State;
    fn final_states() -> Vec<Self::State>;

    /// The shared, validated definition for this machine.
    fn definition_in(definitions: &AsmDefinitions) -> &Arc<AsmDefinition<Self::State, Self::Event>>;

    /// Build and validate the definition.
    fn definition() -> Result<AsmDefinition<Self::State, Self::Event>, ConfigurationError> {
        AsmDefinition::from_transitions(
            Self::states().iter().copied(),
            Self::events().iter().copied(),
            &Self::transitions(),
            Self::initial_state(),
            Self::final_states(),
        )
    }
}

/// The validated definitions of all three machines, built once at startup.
#[derive(Debug, Clone)]
pub struct AsmDefinitions {
    dos: Arc<AsmDefinition<DosDashboardState, DosDashboardEvent>>,
    county: Arc<AsmDefinition<CountyDashboardState, CountyDashboardEvent>>,
    audit_board: Arc<AsmDefinition<AuditBoardDashboardState, AuditBoardDashboardEvent>>,
}

impl AsmDefinitions {
    pub fn new() -> Result<Self, ConfigurationError> {
        Ok(Self {
            dos: Arc::new(DosDashboardMachine::definition()?),
            county: Arc::new(CountyDashboardMachine::definition()?),
            audit_board: Arc::new(AuditBoardDashboardMachine::definition()?),
        })
    }

    /// Get the definition for machine `M`.
    pub fn get<M: Machine>(&self) -> &Arc<AsmDefinition<M::State, M::Event>> {
        M::definition_in(self)
    }
}

impl Machine for DosDashboardMachine {
    type State = DosDashboardState;
    type Event = DosDashboardEvent;

    const KIND: AsmKind = AsmKind::DosDashboard;

    fn states() -> &'static [Self::State] {
        DosDashboardState::ALL
    }

    fn events() -> &'static [Self::Event] {
        DosDashboardEvent::ALL
    }

    fn transitions() -> Vec<AsmTransition<Self::State, Self::Event>> {
        dos::transitions()
    }

    fn initial_state() -> Self::State {
        DosDashboardState::Initial
    }

    fn final_states() -> Vec<Self::State> {
        vec![DosDashboardState::ResultsPublished]
    }

    fn definition_in(definitions: &AsmDefinitions) -> &Arc<AsmDefinition<Self::State, Self::Event>> {
        &definitions.dos
    }
}

impl Machine for CountyDashboardMachine {
    type State = CountyDashboardState;
    type Event = CountyDashboardEvent;

    const KIND: AsmKind = AsmKind::CountyDashboard;

    fn states() -> &'static [Self::State] {
        CountyDashboardState::ALL
    }

    fn events() -> &'static [Self::Event] {
        CountyDashboardEvent::ALL
    }

    fn transitions() -> Vec<AsmTransition<Self::State, Self::Event>> {
        county::transitions()
    }

    fn initial_state() -> Self::State {
        CountyDashboardState::Initial
    }

    fn final_states() -> Vec<Self::State> {
        vec![
            CountyDashboardState::AuditComplete,
            CountyDashboardState::DeadlineMissed,
        ]
    }

    fn definition_in(definitions: &AsmDefinitions) -> &Arc<AsmDefinition<Self::State, Self::Event>> {
        &definitions.county
    }
}

impl Machine for AuditBoardDashboardMachine {
    type State = AuditBoardDashboardState;
    type Event = AuditBoardDashboardEvent;

    const KIND: AsmKind = AsmKind::AuditBoardDashboard;

    fn states() -> &'static [Self::State] {
        AuditBoardDashboardState::ALL
    }

    fn events() -> &'static [Self::Event] {
        AuditBoardDashboardEvent::ALL
    }

    fn transitions() -> Vec<AsmTransition<Self::State, Self::Event>> {
        audit_board::transitions()
    }

    fn initial_state() -> Self::State {
        AuditBoardDashboardState::Initial
    }

    fn final_states() -> Vec<Self::State> {
        vec![
            AuditBoardDashboardState::AuditComplete,
            AuditBoardDashboardState::UnableToAudit,
            AuditBoardDashboardState::Aborted,
        ]
    }

    fn definition_in(definitions: &AsmDefinitions) -> &Arc<AsmDefinition<Self::State, Self::Event>> {
        &definitions.audit_board
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every declared transition must be unambiguous, and every state must be
    /// either final or have some way out.
    fn check_machine<M: Machine>() {
        let definition = M::definition().unwrap();
        for &state in M::states() {
            let enabled = definition.enabled_events(state);
            if definition.is_final(state) {
                assert!(enabled.is_empty(), "final state {state} has transitions");
            } else {
                assert!(!enabled.is_empty(), "non-final state {state} is a dead end");
            }
        }
    }

    #[test]
    fn all_machines_are_well_formed() {
        AsmDefinitions::new().unwrap();
        check_machine::<DosDashboardMachine>();
        check_machine::<CountyDashboardMachine>();
        check_machine::<AuditBoardDashboardMachine>();
    }

    #[test]
    fn machine_kinds_have_stable_names() {
        assert_eq!(AsmKind::DosDashboard.to_string(), "DoSDashboardASM");
        assert_eq!(
            "AuditBoardDashboardASM".parse::<AsmKind>().unwrap(),
            AsmKind::AuditBoardDashboard
        );
    }
}
