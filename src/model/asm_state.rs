use serde::{Deserialize, Serialize};

use crate::asm::AsmKind;

/// A machine instance as stored: its kind, identity and current state name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentAsmState {
    /// `{kind}/{identity}`, unique per machine instance.
    #[serde(rename = "_id")]
    pub id: String,
    pub kind: AsmKind,
    pub identity: String,
    pub current_state: String,
    /// Incremented by the store on every successful save.
    pub version: u64,
}

impl PersistentAsmState {
    pub fn new(kind: AsmKind, identity: String, current_state: String, version: u64) -> Self {
        Self {
            id: Self::key(kind, &identity),
            kind,
            identity,
            current_state,
            version,
        }
    }

    /// The unique id of the instance of `kind` bound to `identity`.
    pub fn key(kind: AsmKind, identity: &str) -> String {
        format!("{kind}/{identity}")
    }
}
