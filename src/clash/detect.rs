//! Boat and blade clash detectors with display ordering.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use hashbrown::HashMap;

use crate::regatta::{BladeSet, SilencedBladeClash, SilencedBoatClash};

use super::{
    classify::{blades_required, classify_event},
    grouping::Buckets,
    BladeClash, BoatClash,
};

/// Rank used for days missing from a supplied day order.
const UNKNOWN_DAY_RANK: usize = 9999;

/// Finds boats used by more than one entry within a bucket.
///
/// Candidates are keyed by trimmed boat name; blank names never clash. All
/// candidates are returned, silenced ones included, tagged with their
/// silenced flag; filtering for display is the caller's choice. With a
/// `day_order` the output is sorted for display; without one it stays in
/// discovery order.
pub fn detect_boat_clashes(
    buckets: &Buckets<'_>,
    silences: &[SilencedBoatClash],
    day_order: Option<&[String]>,
) -> Vec<BoatClash> {
    let mut out = Vec::new();

    for (key, entries) in buckets.iter() {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();

        for entry in entries {
            let boat = entry.boat.trim();
            if boat.is_empty() {
                continue;
            }
            match counts.get_mut(boat) {
                Some(n) => *n += 1,
                None => {
                    counts.insert(boat, 1);
                    first_seen.push(boat);
                }
            }
        }

        for boat in first_seen {
            let count = counts.get(boat).copied().unwrap_or(0);
            if count < 2 {
                continue;
            }
            let silenced = silences
                .iter()
                .any(|s| s.day == key.day && s.group == key.group && s.boat == boat);
            out.push(BoatClash {
                day: key.day.clone(),
                group: key.group.clone(),
                boat: boat.to_string(),
                count,
                silenced,
            });
        }
    }

    if let Some(order) = day_order {
        out.sort_by(|a, b| {
            day_rank(order, &a.day)
                .cmp(&day_rank(order, &b.day))
                .then_with(|| compare_natural(&a.group, &b.group))
                .then_with(|| compare_natural(&a.boat, &b.boat))
        });
    }

    out
}

/// Finds blade sets whose accumulated oar demand exceeds finite inventory.
///
/// Per entry: the event text is classified to an oar requirement, then the
/// requirement is split across the entry's `+`-joined blade-set names with
/// the first `needed % n` parts taking one extra oar each. Demand is
/// accumulated per bucket; sets missing from the inventory, or listed with
/// no amount, are unlimited and never clash. Ordering rules match
/// [`detect_boat_clashes`].
pub fn detect_blade_clashes(
    buckets: &Buckets<'_>,
    blade_sets: &[BladeSet],
    silences: &[SilencedBladeClash],
    day_order: Option<&[String]>,
) -> Vec<BladeClash> {
    let inventory: HashMap<&str, Option<u32>> = blade_sets
        .iter()
        .map(|set| (set.name.as_str(), set.amount))
        .collect();

    let mut out = Vec::new();

    for (key, entries) in buckets.iter() {
        let mut used: HashMap<&str, u32> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();

        for entry in entries {
            let needed = blades_required(classify_event(&entry.event));
            if needed == 0 {
                continue;
            }

            let raw = entry.blades.trim();
            if raw.is_empty() {
                continue;
            }
            let parts: Vec<&str> = if raw.contains('+') {
                raw.split('+')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect()
            } else {
                vec![raw]
            };
            if parts.is_empty() {
                continue;
            }

            let n = parts.len() as u32;
            let base = needed / n;
            let extra = needed % n;
            for (idx, part) in parts.into_iter().enumerate() {
                let share = base + u32::from((idx as u32) < extra);
                match used.get_mut(part) {
                    Some(total) => *total += share,
                    None => {
                        used.insert(part, share);
                        first_seen.push(part);
                    }
                }
            }
        }

        for blades in first_seen {
            let total = used.get(blades).copied().unwrap_or(0);
            if total == 0 {
                continue;
            }
            let Some(Some(amount)) = inventory.get(blades).copied() else {
                continue;
            };
            if total <= amount {
                continue;
            }
            let silenced = silences
                .iter()
                .any(|s| s.day == key.day && s.group == key.group && s.blades == blades);
            out.push(BladeClash {
                day: key.day.clone(),
                group: key.group.clone(),
                blades: blades.to_string(),
                used: total,
                amount,
                silenced,
            });
        }
    }

    if let Some(order) = day_order {
        out.sort_by(|a, b| {
            day_rank(order, &a.day)
                .cmp(&day_rank(order, &b.day))
                .then_with(|| compare_natural(&a.group, &b.group))
                .then_with(|| compare_natural(&a.blades, &b.blades))
        });
    }

    out
}

fn day_rank(order: &[String], day: &str) -> usize {
    order
        .iter()
        .position(|d| d == day)
        .unwrap_or(UNKNOWN_DAY_RANK)
}

/// Case-insensitive comparison that orders digit runs numerically, so
/// `"Div 2"` sorts before `"Div 10"`.
pub fn compare_natural(a: &str, b: &str) -> Ordering {
    let mut ca = a.chars().peekable();
    let mut cb = b.chars().peekable();

    loop {
        match (ca.peek().copied(), cb.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let na = take_number(&mut ca);
                    let nb = take_number(&mut cb);
                    match na.cmp(&nb) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()) {
                        Ordering::Equal => {
                            ca.next();
                            cb.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(chars: &mut Peekable<Chars<'_>>) -> u64 {
    let mut value = 0u64;
    while let Some(c) = chars.peek().copied() {
        let Some(digit) = c.to_digit(10) else {
            break;
        };
        value = value.saturating_mul(10).saturating_add(u64::from(digit));
        chars.next();
    }
    value
}
