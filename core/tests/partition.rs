//! Partitioner tests: grouping, chunking and missing-control drops.

mod common;

use common::{control, in_area, treated};
use leasecontrols_core::{
    partition::{chunk_threshold, group_controls, group_treated, plan, split_even, split_into_chunks, ControlKey, TreatedKey},
    record::Transaction,
};
use std::collections::BTreeMap;

fn treated_batch(prefix: &str, n: usize) -> Vec<Transaction> {
    (0..n).map(|i| treated(&format!("{prefix}{i}"))).collect()
}

#[test]
fn split_even_matches_array_split_sizes() {
    let rows: Vec<usize> = (0..10).collect();
    let sizes: Vec<usize> = split_even(&rows, 3).iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![4, 3, 3]);

    let chunks = split_even(&rows, 3);
    assert_eq!(chunks[0], vec![0, 1, 2, 3]);
    assert_eq!(chunks[2], vec![7, 8, 9]);
}

#[test]
fn split_even_never_produces_empty_chunks() {
    let rows = vec![1, 2];
    let chunks = split_even(&rows, 5);
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| !c.is_empty()));
}

#[test]
fn threshold_is_worker_share_capped_at_max() {
    assert_eq!(chunk_threshold(100, 4, 500), 25.0);
    assert_eq!(chunk_threshold(10_000, 4, 500), 500.0);
    assert_eq!(chunk_threshold(3, 8, 500), 1.0);
}

#[test]
fn oversized_groups_are_split_near_equally() {
    let mut groups = BTreeMap::new();
    groups.insert("big", treated_batch("b", 7));
    groups.insert("small", treated_batch("s", 2));

    let chunks = split_into_chunks(groups, 3.0);
    let sizes: Vec<(&str, usize)> = chunks.iter().map(|(k, c)| (*k, c.len())).collect();
    assert_eq!(sizes, vec![("big", 3), ("big", 2), ("big", 2), ("small", 2)]);
}

#[test]
fn treated_groups_key_on_sale_year_purchase_year_and_area() {
    let mut other_year = treated("T2");
    other_year.l_year = Some(2008);
    let rows = vec![treated("T1"), other_year, in_area(treated("T3"), "B2"), treated("T4")];

    let groups = group_treated(&rows).unwrap();
    assert_eq!(groups.len(), 3);
    let key = TreatedKey { year: 2015, l_year: 2010, area: "A1".into() };
    assert_eq!(groups[&key].len(), 2);
}

#[test]
fn treated_without_purchase_year_is_rejected() {
    let mut t = treated("T");
    t.l_year = None;
    assert!(group_treated(&[t]).is_err());
}

#[test]
fn plan_pairs_chunks_with_sale_and_purchase_groups() {
    let treated_rows = treated_batch("T", 4);
    let controls = vec![
        control("P", 2010, 90.0, 0.1),
        control("S1", 2015, 86.0, 0.1),
        control("S2", 2015, 86.0, 0.2),
    ];
    let groups = group_controls(&controls);
    assert_eq!(groups[&ControlKey { year: 2015, area: "A1".into() }].len(), 2);

    let (tasks, missing) = plan(&treated_rows, &groups, 2, 500).unwrap();

    assert_eq!(missing.chunks, 0);
    assert_eq!(tasks.len(), 2, "4 rows over 2 workers -> chunks of 2");
    for task in &tasks {
        assert_eq!(task.treated.len(), 2);
        assert_eq!(task.sale_pool.len(), 2);
        assert_eq!(task.purchase_pool.len(), 1);
        assert_eq!(task.purchase_pool[0].property_id, "P");
    }
}

#[test]
fn chunks_without_a_control_group_are_dropped_and_counted() {
    let treated_rows = vec![
        treated("T1"),
        treated("T2"),
        in_area(treated("T3"), "B2"),
    ];
    // Area B2 has a sale-year group but no purchase-year group.
    let controls = vec![
        control("P", 2010, 90.0, 0.1),
        control("S", 2015, 86.0, 0.1),
        in_area(control("S-B2", 2015, 86.0, 0.1), "B2"),
    ];
    let groups = group_controls(&controls);

    let (tasks, missing) = plan(&treated_rows, &groups, 1, 500).unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].treated.len(), 2);
    assert_eq!(missing.chunks, 1);
    assert_eq!(missing.units, 1);
}

#[test]
fn task_order_follows_sorted_group_keys() {
    let mut late = treated("late");
    late.year = 2018;
    let treated_rows = vec![late, in_area(treated("b"), "B2"), treated("a")];
    let mut controls = vec![
        control("P", 2010, 90.0, 0.1),
        control("S", 2015, 86.0, 0.1),
        control("S18", 2018, 86.0, 0.1),
    ];
    controls.push(in_area(control("P-B2", 2010, 90.0, 0.1), "B2"));
    controls.push(in_area(control("S-B2", 2015, 86.0, 0.1), "B2"));
    let groups = group_controls(&controls);

    let (tasks, _) = plan(&treated_rows, &groups, 1, 500).unwrap();
    let order: Vec<&str> = tasks
        .iter()
        .map(|t| t.treated[0].property_id.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "late"]);
}
