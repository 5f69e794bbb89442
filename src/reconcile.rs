use std::collections::HashSet;

use crate::record::CanonicalRecord;

/// Records from `full` whose primary key is not yet in the destination,
/// original order preserved. One O(1) membership test per record.
///
/// Two guarantees for the writer downstream: no key in `existing` is ever
/// emitted, and no key is emitted twice even if the fetched set itself
/// contains a duplicate. Records without a usable `id` are dropped — they
/// could never be reconciled on a later run.
pub fn missing_records(
    full: Vec<CanonicalRecord>,
    existing: &HashSet<i64>,
) -> Vec<CanonicalRecord> {
    let mut seen = HashSet::new();
    full.into_iter()
        .filter(|record| match record.id() {
            Some(id) => !existing.contains(&id) && seen.insert(id),
            None => false,
        })
        .collect()
}
