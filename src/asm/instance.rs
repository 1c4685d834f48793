use std::sync::Arc;

use thiserror::Error;

use crate::error::{Error, Result};
use crate::model::PersistentAsmState;

use super::{AsmDefinition, Machine};

/// An event witnessed in a state with no transition for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition: {event} in state {state}")]
pub struct IllegalTransition<S: std::fmt::Display, E: std::fmt::Display> {
    pub state: S,
    pub event: E,
}

/// A live machine bound to one identity.
#[derive(Debug, Clone)]
pub struct Asm<M: Machine> {
    definition: Arc<AsmDefinition<M::State, M::Event>>,
    identity: String,
    current_state: M::State,
    /// Version of the persisted record this instance was loaded from, if any.
    version: Option<u64>,
}

impl<M: Machine> Asm<M> {
    /// A fresh machine in its initial state.
    pub fn new(definition: Arc<AsmDefinition<M::State, M::Event>>, identity: impl Into<String>) -> Self {
        let current_state = definition.initial_state();
        Self {
            definition,
            identity: identity.into(),
            current_state,
            version: None,
        }
    }

    /// Rebuild a machine from its persisted record.
    pub fn restore(
        definition: Arc<AsmDefinition<M::State, M::Event>>,
        persisted: &PersistentAsmState,
    ) -> Result<Self> {
        let corrupt = || Error::CorruptState {
            kind: M::KIND,
            identity: persisted.identity.clone(),
            state: persisted.current_state.clone(),
        };
        if persisted.kind != M::KIND {
            return Err(corrupt());
        }
        let current_state = persisted
            .current_state
            .parse::<M::State>()
            .map_err(|_| corrupt())?;
        if !definition.has_state(current_state) {
            return Err(corrupt());
        }
        Ok(Self {
            definition,
            identity: persisted.identity.clone(),
            current_state,
            version: Some(persisted.version),
        })
    }

    /// Witness `event`, without tagging a failure with the machine's identity.
    pub fn try_step(
        &mut self,
        event: M::Event,
    ) -> std::result::Result<M::State, IllegalTransition<M::State, M::Event>> {
        match self.definition.next_state(self.current_state, event) {
            Some(next) => {
                self.current_state = next;
                Ok(next)
            }
            None => Err(IllegalTransition {
                state: self.current_state,
                event,
            }),
        }
    }

    /// Witness `event`, moving to the next state.
    ///
    /// On an illegal transition the current state is left unchanged.
    pub fn step(&mut self, event: M::Event) -> Result<M::State> {
        let previous = self.current_state;
        self.try_step(event).map_err(|e| {
            warn!(
                "{} {}: illegal transition {} in state {}",
                M::KIND,
                self.identity,
                e.event,
                e.state
            );
            Error::IllegalTransition {
                kind: M::KIND,
                identity: self.identity.clone(),
                state: e.state.to_string(),
                event: e.event.to_string(),
            }
        })
        .map(|next| {
            debug!("{} {}: {event}: {previous} -> {next}", M::KIND, self.identity);
            next
        })
    }

    pub fn current_state(&self) -> M::State {
        self.current_state
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_in_initial_state(&self) -> bool {
        self.current_state == self.definition.initial_state()
    }

    pub fn is_in_final_state(&self) -> bool {
        self.definition.is_final(self.current_state)
    }

    /// Events that are currently legal.
    pub fn enabled_events(&self) -> Vec<M::Event> {
        self.definition.enabled_events(self.current_state)
    }

    pub fn is_enabled(&self, event: M::Event) -> bool {
        self.definition
            .next_state(self.current_state, event)
            .is_some()
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// The record to persist after a step.
    pub fn to_persistent(&self) -> PersistentAsmState {
        PersistentAsmState::new(
            M::KIND,
            self.identity.clone(),
            self.current_state.to_string(),
            self.version.unwrap_or(0),
        )
    }

    /// Record that the store accepted this instance at `version`.
    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }
}
