use crate::crypto::PseudoRandomNumberGenerator;
use crate::error::{Error, Result};
use crate::model::CountyId;
use crate::store::{DashboardStore, ManifestStore};

/// Per-county operations that need the audit-wide seed.
pub struct CountyService<'a, S> {
    store: &'a S,
    county_id: CountyId,
}

impl<'a, S> CountyService<'a, S>
where
    S: ManifestStore + DashboardStore,
{
    /// Ballot draws may repeat; repeats are removed by ballot selection.
    pub const WITH_REPLACEMENT: bool = true;
    /// Ballots are numbered from 1.
    pub const MINIMUM: u64 = 1;

    pub fn new(store: &'a S, county_id: CountyId) -> Self {
        Self { store, county_id }
    }

    /// Draws `[from, to)` of the county's sequence: ballot numbers between 1
    /// and the number of ballots in its manifest, inclusive.
    pub fn random_numbers(&self, from: usize, to: usize) -> Result<Vec<u64>> {
        let count = self.store.count_ballots(self.county_id)?.ok_or_else(|| {
            Error::not_found(format!("ballot manifest for county {}", self.county_id))
        })?;
        let seed = self.store.current_audit_seed()?.ok_or_else(|| {
            Error::InvariantViolation("no random seed has been published".to_string())
        })?;

        let mut prng =
            PseudoRandomNumberGenerator::new(seed, Self::WITH_REPLACEMENT, Self::MINIMUM, count)?;
        prng.get_random_numbers(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::crypto::generate;
    use crate::model::BallotManifestInfo;
    use crate::store::InMemoryStore;

    const SEED: &str = "31415926535897932384";

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .import_manifest(5, BallotManifestInfo::county_examples(5))
            .unwrap();
        store
    }

    #[test]
    fn draws_come_from_the_published_seed() {
        let store = store();
        let mut dos = store.dos_dashboard().unwrap();
        dos.seed = Some(SEED.to_string());
        store.save_dos_dashboard(&dos).unwrap();

        let service = CountyService::new(&store, 5);
        let draws = service.random_numbers(0, 12).unwrap();
        let expected = generate(SEED, 1, 40, true).unwrap().get_random_numbers(0, 12).unwrap();
        assert_eq!(draws, expected);
        assert_eq!(service.random_numbers(4, 12).unwrap(), expected[4..]);
    }

    #[test]
    fn seed_and_manifest_are_required() {
        let store = store();
        let err = CountyService::new(&store, 5).random_numbers(0, 1).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));

        let err = CountyService::new(&store, 6).random_numbers(0, 1).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
