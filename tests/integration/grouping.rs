#![allow(missing_docs)]

mod support;

use quarry::{Graph, Schema, Store, StoreOptions};
use serde_json::{json, Value};
use support::run;

fn players(rows: &[(&str, &str, i64)]) -> Store {
    let schema = Schema::from_value(&json!({
        "resources": {
            "players": {
                "attributes": { "league": {}, "team": {}, "score": {} }
            }
        }
    }))
    .unwrap();
    let mut records = serde_json::Map::new();
    for (index, (league, team, score)) in rows.iter().enumerate() {
        records.insert(
            index.to_string(),
            json!({ "attributes": { "league": league, "team": team, "score": score } }),
        );
    }
    let graph = Graph::from_value(&json!({ "players": records })).unwrap();
    Store::new(schema, graph, StoreOptions::default())
}

fn query(store: &Store, group: Value) -> Value {
    store
        .query(&json!({ "type": "players", "group": group }))
        .expect("grouped query runs")
}

#[test]
fn sums_per_team() {
    let store = players(&[("east", "A", 3), ("east", "A", 5), ("east", "B", 1)]);
    assert_eq!(
        query(&store, json!({ "by": "team", "aggregates": { "total": { "$sum": "score" } } })),
        json!([{ "team": "A", "total": 8 }, { "team": "B", "total": 1 }])
    );
}

#[test]
fn aggregates_see_the_bucket_members() {
    let result = run(json!({
        "type": "bears",
        "group": {
            "by": "year_introduced",
            "aggregates": {
                "count": { "$count": null },
                "names": { "$map": { "$get": "name" } },
                "first": { "$min": "name" }
            }
        }
    }));
    assert_eq!(
        result,
        json!([
            {
                "year_introduced": 1982,
                "count": 3,
                "names": ["Tenderheart Bear", "Cheer Bear", "Wish Bear"],
                "first": "Cheer Bear"
            },
            {
                "year_introduced": 2005,
                "count": 1,
                "names": ["Smart Heart Bear"],
                "first": "Smart Heart Bear"
            }
        ])
    );
}

#[test]
fn by_paths_may_cross_relationships() {
    let result = run(json!({
        "type": "bears",
        "group": {
            "by": "home.name",
            "select": { "home": "home.name" },
            "aggregates": { "residents": { "$count": null } }
        }
    }));
    assert_eq!(
        result,
        json!([
            { "home": "Care-a-Lot", "residents": 3 },
            { "home": null, "residents": 1 }
        ])
    );
}

#[test]
fn group_where_order_and_limit_apply_to_bucket_rows() {
    let store = players(&[
        ("east", "A", 3),
        ("east", "B", 1),
        ("west", "C", 4),
        ("east", "A", 5),
        ("west", "C", 4),
    ]);
    let result = query(
        &store,
        json!({
            "by": "team",
            "aggregates": { "total": { "$sum": "score" } },
            "where": { "total": { "$gt": 2 } },
            "order": { "total": "desc" },
            "limit": 1
        }),
    );
    assert_eq!(result, json!([{ "team": "A", "total": 8 }]));
}

#[test]
fn query_where_filters_before_grouping() {
    let store = players(&[("east", "A", 3), ("west", "C", 4), ("east", "B", 1)]);
    let result = store
        .query(&json!({
            "type": "players",
            "where": { "league": "east" },
            "group": { "by": ["league"], "aggregates": { "mean": { "$mean": "score" } } }
        }))
        .unwrap();
    assert_eq!(result, json!([{ "league": "east", "mean": 2 }]));
}

#[test]
fn nested_groups_summarize_summaries() {
    let store = players(&[
        ("east", "A", 1),
        ("east", "B", 2),
        ("east", "A", 4),
        ("west", "C", 8),
    ]);
    let result = query(
        &store,
        json!({
            "by": ["league", "team"],
            "aggregates": { "total": { "$sum": "score" } },
            "group": {
                "by": "league",
                "aggregates": { "teams": { "$count": null }, "best": { "$max": "total" } }
            }
        }),
    );
    assert_eq!(
        result,
        json!([
            { "league": "east", "teams": 2, "best": 5 },
            { "league": "west", "teams": 1, "best": 8 }
        ])
    );
}

#[test]
fn grouped_subqueries_roll_up_related_records() {
    let result = run(json!({
        "type": "homes",
        "id": "1",
        "select": {
            "name": "name",
            "residents": {
                "group": { "by": "year_introduced", "aggregates": { "n": { "$count": null } } }
            }
        }
    }));
    assert_eq!(
        result,
        json!({ "name": "Care-a-Lot", "residents": [{ "year_introduced": 1982, "n": 3 }] })
    );
}

#[test]
fn empty_inputs_produce_no_buckets() {
    let store = players(&[]);
    assert_eq!(
        query(&store, json!({ "by": "team", "aggregates": { "n": { "$count": null } } })),
        json!([])
    );
}
