//! Zone aggregation and filter option discovery.
//!
//! This module filters complete records by Vocation/Mode and computes the
//! mean metric per zone.

use crate::models::{AggregationRow, FilterOptions, FilterSelection, Record, SortKey};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Records matching both filters.
pub fn filter_records<'a>(
    records: &'a [Record],
    filter: &'a FilterSelection,
) -> impl Iterator<Item = &'a Record> + 'a {
    records.iter().filter(move |r| filter.matches(r))
}

/// Mean metric per zone over the records matching `filter`.
///
/// Zones without a matching record produce no row. Rows come back in
/// ascending zone order.
pub fn aggregate_by_zone(records: &[Record], filter: &FilterSelection) -> Vec<AggregationRow> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();

    for record in filter_records(records, filter) {
        let entry = totals.entry(record.zone.as_str()).or_insert((0.0, 0));
        entry.0 += record.metric;
        entry.1 += 1;
    }

    totals
        .into_iter()
        .map(|(zone, (sum, count))| AggregationRow {
            zone: zone.to_string(),
            average: sum / count as f64,
            count,
        })
        .collect()
}

/// Reorder rows for display. Ties always fall back to zone name.
pub fn sort_rows(rows: &mut [AggregationRow], key: SortKey) {
    match key {
        SortKey::Zone => rows.sort_by(|a, b| a.zone.cmp(&b.zone)),
        SortKey::Average => rows.sort_by(|a, b| {
            b.average
                .partial_cmp(&a.average)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.zone.cmp(&b.zone))
        }),
        SortKey::Count => rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.zone.cmp(&b.zone))
        }),
    }
}

/// Sorted distinct vocations and modes among complete records.
pub fn filter_options(records: &[Record]) -> FilterOptions {
    let vocations: BTreeSet<&str> = records.iter().map(|r| r.vocation.as_str()).collect();
    let modes: BTreeSet<&str> = records.iter().map(|r| r.mode.as_str()).collect();

    FilterOptions {
        vocations: vocations.into_iter().map(String::from).collect(),
        modes: modes.into_iter().map(String::from).collect(),
    }
}

/// Sorted distinct modes among records of one vocation.
pub fn modes_for_vocation(records: &[Record], vocation: &str) -> Vec<String> {
    let modes: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.vocation == vocation)
        .map(|r| r.mode.as_str())
        .collect();

    modes.into_iter().map(String::from).collect()
}

/// Filter options with the mode list narrowed to `vocation`.
pub fn filter_options_for(records: &[Record], vocation: Option<&str>) -> FilterOptions {
    let mut options = filter_options(records);
    if let Some(vocation) = vocation {
        options.modes = modes_for_vocation(records, vocation);
    }
    options
}

/// Pick `preferred` if offered, otherwise the first option.
fn pick(options: &[String], preferred: &str) -> Option<String> {
    options
        .iter()
        .find(|o| o.as_str() == preferred)
        .or_else(|| options.first())
        .cloned()
}

/// Resolve a possibly partial selection against the data.
///
/// An explicit value is kept as-is even when no record carries it, which
/// simply yields an empty aggregation. A missing vocation defaults to
/// `preferred_vocation` (or the first one observed); a missing mode
/// defaults to `preferred_mode` among that vocation's modes.
pub fn resolve_filter(
    records: &[Record],
    vocation: Option<&str>,
    mode: Option<&str>,
    preferred_vocation: &str,
    preferred_mode: &str,
) -> FilterSelection {
    let vocation = match vocation {
        Some(v) => v.to_string(),
        None => pick(&filter_options(records).vocations, preferred_vocation).unwrap_or_default(),
    };

    let mode = match mode {
        Some(m) => m.to_string(),
        None => pick(&modes_for_vocation(records, &vocation), preferred_mode).unwrap_or_default(),
    };

    FilterSelection { vocation, mode }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceRef;

    fn record(vocation: &str, mode: &str, zone: &str, metric: f64) -> Record {
        Record {
            vocation: vocation.to_string(),
            mode: mode.to_string(),
            zone: zone.to_string(),
            metric,
            source: SourceRef {
                file: "test.json".to_string(),
                entry: 1,
            },
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record("Knight", "Hunting", "Cave", 10.0),
            record("Knight", "Hunting", "Cave", 20.0),
            record("Mage", "Hunting", "Cave", 999.0),
            record("Knight", "Hunting", "Asura Palace", 7.0),
            record("Knight", "Solo", "Lake", 3.0),
            record("Paladin", "Duo", "Lake", 4.0),
        ]
    }

    #[test]
    fn test_knight_hunting_scenario() {
        let records = vec![
            record("Knight", "Hunting", "Cave", 10.0),
            record("Knight", "Hunting", "Cave", 20.0),
            record("Mage", "Hunting", "Cave", 999.0),
        ];

        let rows = aggregate_by_zone(&records, &FilterSelection::new("Knight", "Hunting"));

        assert_eq!(
            rows,
            vec![AggregationRow {
                zone: "Cave".to_string(),
                average: 15.0,
                count: 2,
            }]
        );
    }

    #[test]
    fn test_no_match_yields_empty() {
        let rows = aggregate_by_zone(&sample(), &FilterSelection::new("Paladin", "PvP"));
        assert!(rows.is_empty());

        let rows = aggregate_by_zone(&[], &FilterSelection::new("Knight", "Hunting"));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rows_ordered_by_zone() {
        let rows = aggregate_by_zone(&sample(), &FilterSelection::new("Knight", "Hunting"));
        let zones: Vec<_> = rows.iter().map(|r| r.zone.as_str()).collect();
        assert_eq!(zones, vec!["Asura Palace", "Cave"]);
    }

    #[test]
    fn test_rows_only_reference_matching_records() {
        let records = sample();
        for vocation in ["Knight", "Mage", "Paladin", "Sorcerer"] {
            for mode in ["Hunting", "Solo", "Duo"] {
                let filter = FilterSelection::new(vocation, mode);
                for row in aggregate_by_zone(&records, &filter) {
                    let matching: Vec<f64> = records
                        .iter()
                        .filter(|r| filter.matches(r) && r.zone == row.zone)
                        .map(|r| r.metric)
                        .collect();
                    assert!(!matching.is_empty());
                    assert_eq!(row.count, matching.len());
                    let mean = matching.iter().sum::<f64>() / matching.len() as f64;
                    assert!((row.average - mean).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_sort_rows() {
        let mut rows = vec![
            AggregationRow { zone: "B".to_string(), average: 5.0, count: 1 },
            AggregationRow { zone: "A".to_string(), average: 5.0, count: 3 },
            AggregationRow { zone: "C".to_string(), average: 9.0, count: 1 },
        ];

        sort_rows(&mut rows, SortKey::Average);
        let zones: Vec<_> = rows.iter().map(|r| r.zone.as_str()).collect();
        assert_eq!(zones, vec!["C", "A", "B"]);

        sort_rows(&mut rows, SortKey::Count);
        let zones: Vec<_> = rows.iter().map(|r| r.zone.as_str()).collect();
        assert_eq!(zones, vec!["A", "B", "C"]);

        sort_rows(&mut rows, SortKey::Zone);
        let zones: Vec<_> = rows.iter().map(|r| r.zone.as_str()).collect();
        assert_eq!(zones, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_filter_options() {
        let options = filter_options(&sample());
        assert_eq!(options.vocations, vec!["Knight", "Mage", "Paladin"]);
        assert_eq!(options.modes, vec!["Duo", "Hunting", "Solo"]);

        let narrowed = filter_options_for(&sample(), Some("Knight"));
        assert_eq!(narrowed.modes, vec!["Hunting", "Solo"]);
    }

    #[test]
    fn test_resolve_filter_defaults() {
        let records = sample();

        let filter = resolve_filter(&records, None, None, "Knight", "Solo");
        assert_eq!(filter, FilterSelection::new("Knight", "Solo"));

        let filter = resolve_filter(&records, Some("Mage"), None, "Knight", "Solo");
        assert_eq!(filter, FilterSelection::new("Mage", "Hunting"));

        let filter = resolve_filter(&records, None, None, "Druid", "Solo");
        assert_eq!(filter.vocation, "Knight");

        let filter = resolve_filter(&records, Some("Paladin"), Some("PvP"), "Knight", "Solo");
        assert_eq!(filter, FilterSelection::new("Paladin", "PvP"));

        let filter = resolve_filter(&[], None, None, "Knight", "Solo");
        assert_eq!(filter, FilterSelection::default());
    }
}
