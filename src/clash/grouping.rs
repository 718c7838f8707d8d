//! Day/division grouping index and entry partitioning.

use hashbrown::{HashMap, HashSet};

use crate::{entry::EntryRecord, regatta::DivisionGroup, types::EntryStatus};

#[derive(Debug)]
struct GroupDivisions {
    group: String,
    divisions: HashSet<String>,
}

/// Lookup from (day, division) to the enclosing group name.
///
/// Groups are kept per day in declaration order so that a division listed in
/// two groups on one day resolves to the first-declared group. The upstream
/// data model permits the overlap; the order-dependent tie-break is the
/// documented resolution policy.
#[derive(Debug, Default)]
pub struct GroupIndex {
    days: HashMap<String, Vec<GroupDivisions>>,
}

impl GroupIndex {
    /// Builds the index from raw group declarations.
    ///
    /// Pure restructuring, no validation. Repeated (day, group) names merge
    /// their division sets; the group keeps its first declaration position.
    pub fn build(groups: &[DivisionGroup]) -> Self {
        let mut days: HashMap<String, Vec<GroupDivisions>> = HashMap::new();

        for decl in groups {
            let day = days.entry(decl.day.clone()).or_default();
            if let Some(existing) = day.iter_mut().find(|g| g.group == decl.group) {
                existing.divisions.extend(decl.divisions.iter().cloned());
            } else {
                day.push(GroupDivisions {
                    group: decl.group.clone(),
                    divisions: decl.divisions.iter().cloned().collect(),
                });
            }
        }

        Self { days }
    }

    /// Resolves the group name for a (day, division) pair.
    ///
    /// Scans the day's groups in declaration order and returns the first one
    /// whose division set contains `division`. A division with no group, or
    /// a day with no declarations at all, falls back to the division itself
    /// as an implicit singleton group, so ungrouped divisions never share a
    /// bucket by accident.
    pub fn resolve<'a>(&'a self, day: &str, division: &'a str) -> &'a str {
        match self.days.get(day) {
            Some(groups) => groups
                .iter()
                .find(|g| g.divisions.contains(division))
                .map(|g| g.group.as_str())
                .unwrap_or(division),
            None => division,
        }
    }
}

/// Identity of one equipment-sharing bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// Racing day label.
    pub day: String,
    /// Resolved group name.
    pub group: String,
}

/// Entered entries partitioned by (day, group).
///
/// Bucket iteration follows discovery order (first touch of each key), and
/// entries keep their input order within a bucket, so detector output is
/// deterministic for a given snapshot.
#[derive(Debug, Default)]
pub struct Buckets<'a> {
    order: Vec<BucketKey>,
    map: HashMap<BucketKey, Vec<&'a EntryRecord>>,
}

impl<'a> Buckets<'a> {
    /// Iterates buckets in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &[&'a EntryRecord])> {
        self.order
            .iter()
            .filter_map(move |key| self.map.get(key).map(|entries| (key, entries.as_slice())))
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no entry was bucketed.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Partitions confirmed entries into (day, group) buckets.
///
/// Only `Entered` entries participate. Entries whose day or division is
/// blank are skipped; they cannot be meaningfully grouped.
pub fn partition_entries<'a, I>(entries: I, index: &GroupIndex) -> Buckets<'a>
where
    I: IntoIterator<Item = &'a EntryRecord>,
{
    let mut order = Vec::new();
    let mut map: HashMap<BucketKey, Vec<&'a EntryRecord>> = HashMap::new();

    for entry in entries {
        if entry.status != EntryStatus::Entered {
            continue;
        }
        if entry.day.trim().is_empty() || entry.division.trim().is_empty() {
            continue;
        }

        let group = index.resolve(&entry.day, &entry.division);
        let key = BucketKey {
            day: entry.day.clone(),
            group: group.to_string(),
        };

        match map.get_mut(&key) {
            Some(bucket) => bucket.push(entry),
            None => {
                order.push(key.clone());
                map.insert(key, vec![entry]);
            }
        }
    }

    Buckets { order, map }
}
