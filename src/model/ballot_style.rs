use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// A ballot style: a name and the contests that appear on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotStyle {
    pub id: u64,
    pub name: String,
    pub contests: Vec<String>,
}

#[derive(Debug, Default)]
struct Interned {
    by_key: HashMap<(String, Vec<String>), Arc<BallotStyle>>,
    by_id: HashMap<u64, Arc<BallotStyle>>,
    next_id: u64,
}

/// Interning table for ballot styles, owned by whichever store imports CVRs.
///
/// Equal `(name, contests)` pairs always resolve to the same [`BallotStyle`].
#[derive(Debug, Default)]
pub struct BallotStyleCache {
    inner: Mutex<Interned>,
}

impl BallotStyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the style with the given name and contests, creating it if needed.
    pub fn intern(&self, name: &str, contests: Vec<String>) -> Arc<BallotStyle> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (name.to_string(), contests);
        if let Some(style) = inner.by_key.get(&key) {
            return Arc::clone(style);
        }
        let style = Arc::new(BallotStyle {
            id: inner.next_id,
            name: key.0.clone(),
            contests: key.1.clone(),
        });
        inner.next_id += 1;
        inner.by_id.insert(style.id, Arc::clone(&style));
        inner.by_key.insert(key, Arc::clone(&style));
        style
    }

    pub fn by_id(&self, id: u64) -> Option<Arc<BallotStyle>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.get(&id).cloned()
    }

    /// All styles with the given name, or every style if `name` is `None`.
    ///
    /// Malformed uploads can produce several styles sharing one name.
    pub fn matching(&self, name: Option<&str>) -> Vec<Arc<BallotStyle>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut styles: Vec<_> = inner
            .by_id
            .values()
            .filter(|style| name.map_or(true, |n| style.name == n))
            .cloned()
            .collect();
        styles.sort_by_key(|style| style.id);
        styles
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contests(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn equal_styles_are_shared() {
        let cache = BallotStyleCache::new();
        let a = cache.intern("Ballot 1", contests(&["Governor", "Mayor"]));
        let b = cache.intern("Ballot 1", contests(&["Governor", "Mayor"]));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let c = cache.intern("Ballot 1", contests(&["Governor"]));
        assert_ne!(a.id, c.id);
        assert_eq!(cache.by_id(c.id).unwrap().contests, contests(&["Governor"]));
        assert_eq!(cache.matching(Some("Ballot 1")).len(), 2);
        assert_eq!(cache.matching(Some("Ballot 2")).len(), 0);
        assert_eq!(cache.matching(None).len(), 2);
    }

    #[test]
    fn caches_are_independent() {
        let first = BallotStyleCache::new();
        let second = BallotStyleCache::new();
        first.intern("Ballot 1", contests(&["Governor"]));
        assert!(second.is_empty());
        assert!(second.by_id(0).is_none());
    }
}
