use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::asm::{Asm, AsmDefinitions, AsmKind, Machine};
use crate::error::Result;
use crate::store::AsmStore;

/// One mutex per machine instance, created on first use.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<(AsmKind, String), Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    /// The mutex guarding the instance of `kind` bound to `identity`.
    pub fn get(&self, kind: AsmKind, identity: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry((kind, identity.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

/// Loads, steps and saves machine instances.
///
/// Operations on one instance never interleave within this process; the
/// store's version check catches other processes. Operations on different
/// instances do not wait for each other.
///
/// Callers that hold more than one instance at once must take them in the
/// order state authority, county, audit board.
pub struct AsmController<S> {
    store: Arc<S>,
    definitions: AsmDefinitions,
    locks: IdentityLocks,
}

impl<S: AsmStore> AsmController<S> {
    /// Validate every machine definition and attach to `store`.
    pub fn new(store: Arc<S>) -> Result<Self> {
        Ok(Self {
            store,
            definitions: AsmDefinitions::new()?,
            locks: IdentityLocks::default(),
        })
    }

    /// Load the instance of `M` bound to `identity`, or a fresh one.
    pub fn load<M: Machine>(&self, identity: &str) -> Result<Asm<M>> {
        let definition = Arc::clone(self.definitions.get::<M>());
        match self.store.load_asm(M::KIND, identity)? {
            Some(persisted) => Asm::restore(definition, &persisted),
            None => Ok(Asm::new(definition, identity)),
        }
    }

    /// Current state of the instance, without locking.
    pub fn current_state<M: Machine>(&self, identity: &str) -> Result<M::State> {
        Ok(self.load::<M>(identity)?.current_state())
    }

    /// Run `f` against the instance with exclusive access, saving it afterwards
    /// if `f` succeeded and changed its state.
    ///
    /// If `f` fails, nothing is saved.
    pub fn with_asm<M, T>(&self, identity: &str, f: impl FnOnce(&mut Asm<M>) -> Result<T>) -> Result<T>
    where
        M: Machine,
    {
        let lock = self.locks.get(M::KIND, identity);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut asm = self.load::<M>(identity)?;
        let before = asm.current_state();
        let output = f(&mut asm)?;
        if asm.current_state() != before {
            let version = self.store.save_asm(asm.to_persistent(), asm.version())?;
            asm.set_version(version);
        }
        Ok(output)
    }

    /// Load, step once, and save.
    pub fn step<M: Machine>(&self, identity: &str, event: M::Event) -> Result<M::State> {
        self.with_asm::<M, _>(identity, |asm| asm.step(event))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use crate::asm::{
        AuditBoardDashboardEvent, AuditBoardDashboardMachine, AuditBoardDashboardState,
        CountyDashboardEvent, CountyDashboardMachine, CountyDashboardState,
    };
    use crate::error::Error;
    use crate::store::InMemoryStore;

    fn controller() -> AsmController<InMemoryStore> {
        AsmController::new(Arc::new(InMemoryStore::new())).unwrap()
    }

    #[test]
    fn steps_are_persisted() {
        let controller = controller();
        assert_eq!(
            controller.current_state::<CountyDashboardMachine>("1").unwrap(),
            CountyDashboardState::Initial
        );
        controller
            .step::<CountyDashboardMachine>("1", CountyDashboardEvent::UploadCvrs)
            .unwrap();
        assert_eq!(
            controller.current_state::<CountyDashboardMachine>("1").unwrap(),
            CountyDashboardState::CvrsOk
        );
        // Other counties are untouched.
        assert_eq!(
            controller.current_state::<CountyDashboardMachine>("2").unwrap(),
            CountyDashboardState::Initial
        );
    }

    #[test]
    fn failed_closures_save_nothing() {
        let controller = controller();
        let result = controller.with_asm::<CountyDashboardMachine, ()>("1", |asm| {
            asm.step(CountyDashboardEvent::UploadBallotManifest)?;
            Err(Error::InvariantViolation("later failure".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(
            controller.current_state::<CountyDashboardMachine>("1").unwrap(),
            CountyDashboardState::Initial
        );

        let err = controller
            .step::<CountyDashboardMachine>("1", CountyDashboardEvent::StartAudit)
            .unwrap_err();
        assert!(err.is_illegal_transition());
        assert!(controller
            .store()
            .load_asm(AsmKind::CountyDashboard, "1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn nested_instances() {
        let controller = controller();
        controller
            .with_asm::<CountyDashboardMachine, _>("4", |county| {
                county.step(CountyDashboardEvent::UploadCvrs)?;
                controller.with_asm::<AuditBoardDashboardMachine, _>("4", |board| {
                    board.step(AuditBoardDashboardEvent::SignIn)
                })
            })
            .unwrap();
        assert_eq!(
            controller.current_state::<AuditBoardDashboardMachine>("4").unwrap(),
            AuditBoardDashboardState::WaitingWithBoard
        );
    }

    #[test]
    fn concurrent_triggers_do_not_interleave() {
        let controller = Arc::new(controller());
        controller
            .step::<AuditBoardDashboardMachine>("7", AuditBoardDashboardEvent::SignIn)
            .unwrap();
        controller
            .step::<AuditBoardDashboardMachine>("7", AuditBoardDashboardEvent::RoundStart)
            .unwrap();

        // Each trigger toggles the board, so a lost update would show up as a
        // version conflict or a wrong final count.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = Arc::clone(&controller);
                thread::spawn(move || {
                    for _ in 0..10 {
                        controller
                            .with_asm::<AuditBoardDashboardMachine, _>("7", |board| {
                                let event = match board.current_state() {
                                    AuditBoardDashboardState::RoundInProgress => {
                                        AuditBoardDashboardEvent::SignOut
                                    }
                                    _ => AuditBoardDashboardEvent::SignIn,
                                };
                                board.step(event)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let board = controller.load::<AuditBoardDashboardMachine>("7").unwrap();
        assert_eq!(board.current_state(), AuditBoardDashboardState::RoundInProgress);
        assert_eq!(board.version(), Some(82));
    }
}
