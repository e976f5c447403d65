//! Hash-to-members index over a store snapshot.
//!
//! # Overview
//!
//! Maps each content hash to the set of records sharing it. Insertion
//! is parallel across records (they are independent); the map itself is
//! mutex-guarded so concurrent inserts into the same bucket serialize
//! and every (hash, record) pair lands exactly once. Keys are kept in a
//! `BTreeMap` so iteration order is the lexicographic hash order and
//! reports are reproducible run to run.
//!
//! The index is built once per run from a snapshot and treated as
//! immutable afterwards. Filtering to multi-member groups is a view,
//! not an in-place prune, so the full index stays available.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rayon::prelude::*;

use crate::scanner::ContentHash;
use crate::store::FileRecord;

/// Index from content hash to the records sharing that hash.
#[derive(Debug, Default)]
pub struct HashIndex {
    groups: BTreeMap<ContentHash, Vec<FileRecord>>,
}

impl HashIndex {
    /// Build the index from a snapshot of records.
    ///
    /// Records without a hash are excluded entirely; "unknown hash"
    /// must never form a group, even with other unknowns. Bucket
    /// membership is independent of insertion order: members are
    /// sorted by path once construction finishes.
    #[must_use]
    pub fn build(records: Vec<FileRecord>) -> Self {
        let map: Mutex<BTreeMap<ContentHash, Vec<FileRecord>>> = Mutex::new(BTreeMap::new());

        records.into_par_iter().for_each(|record| {
            let Some(hash) = record.hash else {
                log::debug!("Skipping unhashed record {}", record.path.display());
                return;
            };
            map.lock()
                .expect("index mutex poisoned")
                .entry(hash)
                .or_default()
                .push(record);
        });

        let mut groups = map.into_inner().expect("index mutex poisoned");
        for members in groups.values_mut() {
            members.sort_by(|a, b| a.path.cmp(&b.path));
        }

        log::info!(
            "Indexed {} file(s) under {} unique hash(es)",
            groups.values().map(Vec::len).sum::<usize>(),
            groups.len()
        );

        Self { groups }
    }

    /// Non-destructive view of the buckets with two or more members,
    /// in hash order.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = (&ContentHash, &[FileRecord])> {
        self.groups
            .iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(hash, members)| (hash, members.as_slice()))
    }

    /// Flat list of every record belonging to a multi-member bucket.
    /// Used for reporting duplicate candidates before verification.
    #[must_use]
    pub fn duplicate_candidates(&self) -> Vec<&FileRecord> {
        self.duplicate_groups()
            .flat_map(|(_, members)| members.iter())
            .collect()
    }

    /// Number of distinct hashes in the index.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of multi-member buckets.
    #[must_use]
    pub fn duplicate_group_count(&self) -> usize {
        self.duplicate_groups().count()
    }

    /// Total records indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
