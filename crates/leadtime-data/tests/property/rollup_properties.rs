use std::collections::HashMap;

use leadtime_core::models::{CategoryDefinition, MonthKey, Observation};
use leadtime_data::aggregator::Aggregator;
use leadtime_data::hierarchy::CategoryTree;
use leadtime_data::ranking::{rank, rank_counts};
use proptest::prelude::*;
use proptest::sample::Index;

/// Node `i` hangs under an earlier node, or is a root.
fn definitions(parents: &[Option<Index>]) -> Vec<CategoryDefinition> {
    let mut paths: Vec<String> = Vec::with_capacity(parents.len());
    for (i, parent) in parents.iter().enumerate() {
        let name = format!("c{i}");
        let path = match parent {
            Some(idx) if i > 0 => format!("{} > {}", paths[idx.index(i)], name),
            _ => name,
        };
        paths.push(path);
    }
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let level = path.split(" > ").count() as u32;
            CategoryDefinition::new(format!("c{i}"), level, path.clone())
        })
        .collect()
}

fn observation(category: usize, month: u32, tenths: u32) -> Observation {
    Observation {
        month: MonthKey::new(2024, month).unwrap(),
        category: format!("c{category}"),
        manufacturer: format!("m{}", tenths % 3),
        lead_time_weeks: f64::from(tenths) / 10.0,
        cost: 0.0,
        component_count: 1,
        project_name: String::new(),
        buyer_name: String::new(),
        seller_name: String::new(),
        source_record_id: String::new(),
    }
}

fn tree_strategy() -> impl Strategy<Value = Vec<Option<Index>>> {
    prop::collection::vec(prop::option::of(any::<Index>()), 1..12)
}

fn observations_strategy() -> impl Strategy<Value = Vec<Observation>> {
    prop::collection::vec((0usize..16, 1u32..=4, 0u32..=400), 0..60)
        .prop_map(|raw| raw.into_iter().map(|(c, m, t)| observation(c, m, t)).collect())
}

proptest! {
    #[test]
    fn rollup_count_is_direct_plus_descendants(
        parents in tree_strategy(),
        observations in observations_strategy(),
    ) {
        let tree = CategoryTree::build(&definitions(&parents)).unwrap();
        let mut direct: HashMap<&str, usize> = HashMap::new();
        for obs in &observations {
            *direct.entry(obs.category.as_str()).or_insert(0) += 1;
        }

        for rollup in Aggregator::rolled_up(&observations, &tree) {
            let own = direct.get(rollup.category.as_str()).copied().unwrap_or(0);
            let below: usize = tree
                .descendants(&rollup.category)
                .iter()
                .map(|d| direct.get(d).copied().unwrap_or(0))
                .sum();
            prop_assert_eq!(rollup.direct_count, own);
            prop_assert_eq!(rollup.descendant_count, below);
            prop_assert_eq!(rollup.stats.count, own + below);
            prop_assert!(rollup.stats.count >= rollup.direct_count);
        }
    }

    #[test]
    fn descendants_never_include_self_or_ancestors(parents in tree_strategy()) {
        let tree = CategoryTree::build(&definitions(&parents)).unwrap();
        for node in tree.nodes() {
            let descendants = tree.descendants(&node.name);
            prop_assert!(!descendants.contains(&node.name.as_str()));
            for ancestor in tree.ancestors(&node.name) {
                prop_assert!(!descendants.contains(&ancestor));
            }
        }
    }

    #[test]
    fn parent_loop_is_always_rejected(len in 1usize..8) {
        // c0 < c1 < ... < c{len-1} < c0
        let defs: Vec<CategoryDefinition> = (0..len)
            .map(|i| {
                let parent = (i + len - 1) % len;
                CategoryDefinition::new(format!("c{i}"), 1, format!("c{parent} > c{i}"))
            })
            .collect();
        let err = CategoryTree::build(&defs).unwrap_err();
        prop_assert_eq!(err.cycle.len(), len + 1);
        prop_assert_eq!(err.cycle.first(), err.cycle.last());
    }

    #[test]
    fn weighted_trend_matches_raw_monthly_mean(observations in observations_strategy()) {
        let trend = Aggregator::overall_trend(&Aggregator::category_series(&observations));
        let direct = Aggregator::by_month(&observations);

        prop_assert_eq!(trend.len(), direct.len());
        for point in &trend {
            let raw = &direct[&point.month];
            prop_assert_eq!(point.count, raw.count);
            prop_assert!((point.mean - raw.mean).abs() < 0.05);
        }
    }

    #[test]
    fn ranking_is_deterministic_and_ordered(
        totals in prop::collection::btree_map("[a-e]{1,2}", 0usize..20, 0..15),
        min_count in 0usize..20,
    ) {
        let forward: Vec<(String, usize)> = totals.clone().into_iter().collect();
        let reversed: Vec<(String, usize)> = totals.into_iter().rev().collect();

        prop_assert_eq!(rank(forward.clone(), min_count), rank(reversed, min_count));

        let ranked = rank_counts(forward, min_count);
        for pair in ranked.windows(2) {
            prop_assert!(
                pair[0].count > pair[1].count
                    || (pair[0].count == pair[1].count && pair[0].key < pair[1].key)
            );
        }
        prop_assert!(ranked.iter().all(|r| r.count >= min_count));
    }
}
