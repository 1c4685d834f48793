use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{display_order, CastVoteRecord, CountyId, CvrToAudit};
use crate::store::{CvrStore, ManifestStore};

/// Remove repeated draws, keeping the first occurrence of each.
///
/// Sampling with replacement draws some ballots twice; each is audited once.
pub fn dedup(draws: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(draws.len());
    draws.iter().copied().filter(|d| seen.insert(*d)).collect()
}

/// Turn a county's random draws into the list of ballots to audit.
///
/// Each distinct draw is resolved through the ballot manifest to a physical
/// ballot and joined to its cast vote record; a ballot without a record gets
/// a placeholder so the discrepancy is visible to the audit board. Entries are
/// numbered in draw order and returned in display order.
///
/// A draw that no manifest batch covers aborts the whole selection.
pub fn select_ballots<S>(store: &S, draws: &[u64], county_id: CountyId) -> Result<Vec<CvrToAudit>>
where
    S: ManifestStore + CvrStore + ?Sized,
{
    let mut ballots = Vec::new();
    for (audit_sequence_number, draw) in dedup(draws).into_iter().enumerate() {
        let missing = || Error::MissingManifest { county_id, draw };
        let manifest = store
            .find_manifest_covering(county_id, draw)?
            .ok_or_else(missing)?;
        let position = manifest.ballot_position(draw).ok_or_else(missing)?;

        let cvr = store
            .find_cvr(county_id, manifest.scanner_id, &manifest.batch_id, position)?
            .unwrap_or_else(|| {
                warn!(
                    "No CVR for county {county_id} ballot {}, using a placeholder",
                    manifest.imprinted_id(position)
                );
                CastVoteRecord::not_found()
            });
        ballots.push(CvrToAudit::new(audit_sequence_number, &manifest, position, &cvr));
    }
    ballots.sort_by(display_order);
    debug!(
        "Selected {} ballots for county {county_id} from {} draws",
        ballots.len(),
        draws.len()
    );
    Ok(ballots)
}

/// Like [`select_ballots`], but fetching the county's records in one query by
/// sequence number.
///
/// Every distinct draw must have a record, and each record must sit at the
/// ballot position the manifest gives for its draw.
pub fn select_ballots_bulk<S>(
    store: &S,
    draws: &[u64],
    county_id: CountyId,
) -> Result<Vec<CvrToAudit>>
where
    S: ManifestStore + CvrStore + ?Sized,
{
    let draws = dedup(draws);
    let cvrs = store.find_cvrs_for_county(county_id, &draws)?;
    if cvrs.len() != draws.len() {
        return Err(Error::MissingCvrCount {
            county_id,
            expected: draws.len(),
            found: cvrs.len(),
        });
    }

    let mut ballots = Vec::with_capacity(draws.len());
    for (audit_sequence_number, (&draw, cvr)) in draws.iter().zip(&cvrs).enumerate() {
        let missing = || Error::MissingManifest { county_id, draw };
        let manifest = store
            .find_manifest_covering(county_id, draw)?
            .ok_or_else(missing)?;
        let position = manifest.ballot_position(draw).ok_or_else(missing)?;
        if (cvr.scanner_id, cvr.batch_id.as_str(), cvr.record_id)
            != (manifest.scanner_id, manifest.batch_id.as_str(), position)
        {
            return Err(Error::InvariantViolation(format!(
                "county {county_id} record for draw {draw} is at {}-{}-{}, manifest says {}",
                cvr.scanner_id,
                cvr.batch_id,
                cvr.record_id,
                manifest.imprinted_id(position)
            )));
        }
        ballots.push(CvrToAudit::new(audit_sequence_number, &manifest, position, cvr));
    }
    ballots.sort_by(display_order);
    Ok(ballots)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::BallotManifestInfo;
    use crate::store::InMemoryStore;

    const COUNTY: CountyId = 1;

    /// The example manifest, with a record for every ballot except 8.
    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let manifests = BallotManifestInfo::county_examples(COUNTY);
        let mut cvrs = Vec::new();
        for manifest in &manifests {
            for sequence in manifest.sequence_start..=manifest.sequence_end {
                if sequence == 8 {
                    continue;
                }
                let position = manifest.ballot_position(sequence).unwrap();
                cvrs.push(CastVoteRecord::example(
                    sequence,
                    COUNTY,
                    manifest.scanner_id,
                    &manifest.batch_id,
                    position,
                    sequence,
                ));
            }
        }
        store.import_manifest(COUNTY, manifests).unwrap();
        store.import_cvrs(COUNTY, cvrs).unwrap();
        store
    }

    #[test]
    fn dedup_keeps_first_occurrences() {
        assert_eq!(dedup(&[5, 5, 7]), vec![5, 7]);
        assert_eq!(dedup(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(dedup(&[]).is_empty());
    }

    #[test]
    fn repeated_draws_are_audited_once() {
        let ballots = select_ballots(&store(), &[5, 5, 7], COUNTY).unwrap();
        assert_eq!(ballots.len(), 2);
        assert_eq!(ballots[0].audit_sequence_number, 0);
        assert_eq!(ballots[0].record_id, 5);
        assert_eq!(ballots[1].audit_sequence_number, 1);
        assert_eq!(ballots[1].record_id, 7);
        assert_eq!(ballots[1].imprinted_id, "1-1-7");
        assert_eq!(ballots[1].storage_location, "Bin 1");
        assert_eq!(ballots[1].cvr_id, 7);
    }

    #[test]
    fn uncovered_draw_aborts_selection() {
        let store = store();
        match select_ballots(&store, &[3, 41, 4], COUNTY) {
            Err(Error::MissingManifest { county_id, draw }) => {
                assert_eq!((county_id, draw), (COUNTY, 41));
            }
            other => panic!("expected a missing manifest, got {other:?}"),
        }
        // Ballot 0 does not exist either.
        assert!(select_ballots(&store, &[0], COUNTY).is_err());
        // Nor does any ballot of a county with no manifest.
        assert!(select_ballots(&store, &[1], 2).is_err());
    }

    #[test]
    fn missing_record_gets_a_placeholder() {
        let ballots = select_ballots(&store(), &[8], COUNTY).unwrap();
        assert_eq!(ballots.len(), 1);
        let ballot = &ballots[0];
        assert_eq!(ballot.cvr_number, 0);
        assert_eq!(ballot.cvr_id, 0);
        assert_eq!(ballot.ballot_type, CastVoteRecord::NOT_FOUND_BALLOT_TYPE);
        assert!(!ballot.audit_flag);
        // The manifest still locates the physical ballot.
        assert_eq!(ballot.imprinted_id, "1-1-8");
        assert_eq!(ballot.storage_location, "Bin 1");
    }

    #[test]
    fn display_order_keeps_draw_numbers() {
        // 38 is scanner 2, 12 is scanner 1 batch 2, 3 is scanner 1 batch 1.
        let ballots = select_ballots(&store(), &[38, 12, 3], COUNTY).unwrap();
        let shown: Vec<(u32, &str, u32, usize)> = ballots
            .iter()
            .map(|b| {
                (
                    b.scanner_id,
                    b.batch_id.as_str(),
                    b.record_id,
                    b.audit_sequence_number,
                )
            })
            .collect();
        assert_eq!(shown, vec![(1, "1", 3, 2), (1, "2", 2, 1), (2, "1", 3, 0)]);
    }

    #[test]
    fn later_draw_sorted_first() {
        // Draws 50 and 10 over a county with two batches of 30.
        let store = InMemoryStore::new();
        store
            .import_manifest(
                COUNTY,
                vec![
                    BallotManifestInfo::new(COUNTY, 1, "1", 30, "Bin 1", 1),
                    BallotManifestInfo::new(COUNTY, 1, "2", 30, "Bin 2", 31),
                ],
            )
            .unwrap();
        store
            .import_cvrs(
                COUNTY,
                vec![
                    CastVoteRecord::example(1, COUNTY, 1, "1", 10, 10),
                    CastVoteRecord::example(2, COUNTY, 1, "2", 20, 50),
                ],
            )
            .unwrap();

        let ballots = select_ballots(&store, &[50, 10], COUNTY).unwrap();
        assert_eq!(ballots[0].cvr_id, 1);
        assert_eq!(ballots[0].audit_sequence_number, 1);
        assert_eq!(ballots[1].cvr_id, 2);
        assert_eq!(ballots[1].audit_sequence_number, 0);
    }

    #[test]
    fn bulk_selection_matches_positional() {
        let store = store();
        let draws = [30, 2, 30, 17];
        let positional = select_ballots(&store, &draws, COUNTY).unwrap();
        let bulk = select_ballots_bulk(&store, &draws, COUNTY).unwrap();
        assert_eq!(positional, bulk);
    }

    #[test]
    fn bulk_selection_requires_every_record() {
        match select_ballots_bulk(&store(), &[2, 8, 2], COUNTY) {
            Err(Error::MissingCvrCount {
                expected, found, ..
            }) => assert_eq!((expected, found), (2, 1)),
            other => panic!("expected a missing CVR count, got {other:?}"),
        }
    }

    #[test]
    fn bulk_selection_rejects_misplaced_records() {
        let store = InMemoryStore::new();
        store
            .import_manifest(COUNTY, vec![BallotManifestInfo::new(COUNTY, 1, "1", 10, "Bin 1", 1)])
            .unwrap();
        // Sequence 5 claims to be the ninth ballot of the batch.
        store
            .import_cvrs(COUNTY, vec![CastVoteRecord::example(1, COUNTY, 1, "1", 9, 5)])
            .unwrap();

        assert!(matches!(
            select_ballots_bulk(&store, &[5], COUNTY),
            Err(Error::InvariantViolation(_))
        ));
    }
}
