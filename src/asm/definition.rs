use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use thiserror::Error;

/// Anything usable as a state or event token.
pub trait AsmSymbol:
    Copy + Eq + Hash + Ord + Debug + Display + FromStr + Send + Sync + 'static
{
}

impl<T> AsmSymbol for T where
    T: Copy + Eq + Hash + Ord + Debug + Display + FromStr + Send + Sync + 'static
{
}

/// A machine definition that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("initial state {0} is not a declared state")]
    UnknownInitialState(String),
    #[error("final state {0} is not a declared state")]
    UnknownFinalState(String),
    #[error("transition table references undeclared state {0}")]
    UnknownState(String),
    #[error("transition table references undeclared event {0}")]
    UnknownEvent(String),
    #[error("({state}, {event}) leads to both {first} and {second}")]
    AmbiguousTransition {
        state: String,
        event: String,
        first: String,
        second: String,
    },
}

/// A grouped transition: any of `events` observed in any of `sources` leads to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmTransition<S, E> {
    pub sources: Vec<S>,
    pub events: Vec<E>,
    pub target: S,
}

impl<S: AsmSymbol, E: AsmSymbol> AsmTransition<S, E> {
    pub fn new(
        sources: impl IntoIterator<Item = S>,
        events: impl IntoIterator<Item = E>,
        target: S,
    ) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            events: events.into_iter().collect(),
            target,
        }
    }
}

/// Expand grouped transitions into single `(state, event)` entries.
///
/// Declaring the same pair twice with the same target is harmless; declaring
/// it with two different targets is an error.
pub fn flatten<S: AsmSymbol, E: AsmSymbol>(
    transitions: &[AsmTransition<S, E>],
) -> Result<HashMap<(S, E), S>, ConfigurationError> {
    let mut table = HashMap::new();
    for transition in transitions {
        for &state in &transition.sources {
            for &event in &transition.events {
                if let Some(existing) = table.insert((state, event), transition.target) {
                    if existing != transition.target {
                        return Err(ConfigurationError::AmbiguousTransition {
                            state: state.to_string(),
                            event: event.to_string(),
                            first: existing.to_string(),
                            second: transition.target.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(table)
}

/// A validated machine definition: the vocabularies, the flattened transition
/// table, and the initial and final states.
#[derive(Debug, Clone)]
pub struct AsmDefinition<S, E> {
    states: HashSet<S>,
    events: HashSet<E>,
    table: HashMap<(S, E), S>,
    initial_state: S,
    final_states: HashSet<S>,
}

impl<S: AsmSymbol, E: AsmSymbol> AsmDefinition<S, E> {
    /// Check a definition for internal consistency.
    pub fn new(
        states: HashSet<S>,
        events: HashSet<E>,
        table: HashMap<(S, E), S>,
        initial_state: S,
        final_states: HashSet<S>,
    ) -> Result<Self, ConfigurationError> {
        if !states.contains(&initial_state) {
            return Err(ConfigurationError::UnknownInitialState(
                initial_state.to_string(),
            ));
        }
        if let Some(state) = final_states.iter().find(|s| !states.contains(s)) {
            return Err(ConfigurationError::UnknownFinalState(state.to_string()));
        }
        for ((source, event), target) in &table {
            for state in [source, target] {
                if !states.contains(state) {
                    return Err(ConfigurationError::UnknownState(state.to_string()));
                }
            }
            if !events.contains(event) {
                return Err(ConfigurationError::UnknownEvent(event.to_string()));
            }
        }
        Ok(Self {
            states,
            events,
            table,
            initial_state,
            final_states,
        })
    }

    /// Build a definition from grouped transitions.
    pub fn from_transitions(
        states: impl IntoIterator<Item = S>,
        events: impl IntoIterator<Item = E>,
        transitions: &[AsmTransition<S, E>],
        initial_state: S,
        final_states: impl IntoIterator<Item = S>,
    ) -> Result<Self, ConfigurationError> {
        let table = flatten(transitions)?;
        Self::new(
            states.into_iter().collect(),
            events.into_iter().collect(),
            table,
            initial_state,
            final_states.into_iter().collect(),
        )
    }

    pub fn initial_state(&self) -> S {
        self.initial_state
    }

    pub fn is_final(&self, state: S) -> bool {
        self.final_states.contains(&state)
    }

    pub fn has_state(&self, state: S) -> bool {
        self.states.contains(&state)
    }

    pub fn has_event(&self, event: E) -> bool {
        self.events.contains(&event)
    }

    /// The state reached by witnessing `event` in `state`, if that is legal.
    pub fn next_state(&self, state: S, event: E) -> Option<S> {
        self.table.get(&(state, event)).copied()
    }

    /// The events that are legal in `state`, sorted.
    pub fn enabled_events(&self, state: S) -> Vec<E> {
        let mut events: Vec<E> = self
            .table
            .keys()
            .filter(|(source, _)| *source == state)
            .map(|(_, event)| *event)
            .collect();
        events.sort();
        events
    }

    /// Number of `(state, event)` entries in the flattened table.
    pub fn table_len(&self) -> usize {
        self.table.len()
    }
}
