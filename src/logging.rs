use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

/// A unique identifier for one externally triggered operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct TriggerId(pub usize);

impl Display for TriggerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TriggerId {
    /// Atomically get the next ID. This wraps around back to zero if you somehow exceed a usize.
    pub fn next() -> TriggerId {
        static TRIGGER_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        TriggerId(TRIGGER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Run a trigger, logging its start and outcome under a fresh [`TriggerId`].
///
/// Rejections caused by the caller are warnings; anything else that fails is
/// an error.
pub fn traced<T>(name: &str, detail: impl Display, run: impl FnOnce() -> Result<T>) -> Result<T> {
    let id = TriggerId::next();
    info!("->trg{id} {name} {detail}");
    let result = run();
    match &result {
        Ok(_) => info!("<-trg{id} {name} ok"),
        Err(
            e @ (Error::IllegalTransition { .. }
            | Error::BadRequest(_)
            | Error::NotFound(_)
            | Error::ConcurrentModification { .. }),
        ) => warn!("<-trg{id} {name} rejected: {e}"),
        Err(e) => error!("<-trg{id} {name} failed: {e}"),
    }
    result
}

/// Initialise log4rs from a YAML file, if it exists.
///
/// Returns whether logging was configured.
pub fn init_from_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if !path.exists() {
        return false;
    }
    match log4rs::init_file(path, Default::default()) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Could not initialise logging from {}: {e}", path.display());
            false
        }
    }
}
