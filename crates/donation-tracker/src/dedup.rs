//! Merging record batches without double counting
//!
//! Re-fetching a partial month always returns records that are already
//! stored. The PayPal transaction ID is the only identity used here; two
//! records with the same ID are the same transaction no matter what else
//! differs.

use std::collections::HashSet;

use crate::record::Record;

/// Append every record of `incoming` whose transaction ID is not yet known.
///
/// `existing` is kept in full and in order, new records follow in the order
/// they arrived. The result is not re-sorted. Merging the same batch twice
/// adds nothing the second time.
pub fn merge(existing: &[Record], incoming: &[Record]) -> Vec<Record> {
    let mut seen: HashSet<&str> = existing
        .iter()
        .map(|r| r.transaction_id.as_str())
        .collect();

    let mut result = existing.to_vec();
    for record in incoming {
        if seen.insert(record.transaction_id.as_str()) {
            result.push(record.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::record;
    use proptest::prelude::*;

    fn batch(ids: &[&str]) -> Vec<Record> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                record(
                    id,
                    &format!("2024-06-{:02}T10:00:00Z", i + 1),
                    "Donation",
                    1.0,
                    "USD",
                )
            })
            .collect()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.transaction_id.as_str()).collect()
    }

    #[test]
    fn test_merge_appends_only_new_ids() {
        let existing = batch(&["A", "B", "C"]);
        let incoming = batch(&["B", "D", "C", "E"]);

        let merged = merge(&existing, &incoming);

        assert_eq!(ids(&merged), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let records = batch(&["A", "B"]);
        assert_eq!(merge(&[], &records), records);
        assert_eq!(merge(&records, &[]), records);
        assert!(merge(&[], &[]).is_empty());
    }

    #[test]
    fn test_merge_with_itself() {
        let records = batch(&["A", "B", "C"]);
        assert_eq!(merge(&records, &records), records);
    }

    #[test]
    fn test_repeated_ids_in_incoming_appear_once() {
        let existing = batch(&["A"]);
        let incoming = batch(&["A", "B", "A", "B", "A"]);

        let merged = merge(&existing, &incoming);

        assert_eq!(ids(&merged), vec!["A", "B"]);
    }

    #[test]
    fn test_existing_record_wins_on_conflict() {
        let existing = batch(&["A"]);
        let mut changed = batch(&["A"]);
        changed[0].amt = 500.0;

        let merged = merge(&existing, &changed);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].amt, 1.0);
    }

    proptest! {
        #[test]
        fn test_merge_is_idempotent(
            existing in prop::collection::vec("[A-F]", 0..8),
            incoming in prop::collection::vec("[A-F]", 0..8),
        ) {
            let existing = merge(&[], &batch(&existing.iter().map(String::as_str).collect::<Vec<_>>()));
            let incoming = batch(&incoming.iter().map(String::as_str).collect::<Vec<_>>());

            let once = merge(&existing, &incoming);
            let twice = merge(&once, &incoming);

            prop_assert_eq!(&once, &twice);

            let unique: HashSet<&str> = ids(&once).into_iter().collect();
            prop_assert_eq!(unique.len(), once.len());
            prop_assert_eq!(&once[..existing.len()], &existing[..]);
        }
    }
}
