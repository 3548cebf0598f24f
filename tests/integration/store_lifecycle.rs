#![allow(missing_docs)]

mod support;

use std::sync::Arc;

use quarry::expr::{Engine, Evaluator, Operation, OperationSet};
use quarry::graph::Resource;
use quarry::query::{Direction, Engines, GroupBuilder, QueryBuilder, Validator};
use quarry::{QuarryError, Schema, Store, StoreOptions, ValidationIssue};
use serde_json::{json, Value};
use support::{care_bears_graph, care_bears_schema, store};

#[test]
fn relationships_materialize_only_when_read() {
    let store = store();
    store
        .query(&json!({ "type": "bears", "id": "1", "select": ["name"] }))
        .unwrap();
    assert_eq!(store.prepared().materialized(), 1);

    store
        .query(&json!({ "type": "bears", "id": "1", "select": { "home": { "select": ["name"] } } }))
        .unwrap();
    assert_eq!(store.prepared().materialized(), 2);
}

#[test]
fn mutations_rebuild_the_prepared_graph() {
    let mut store = store();
    let query = json!({ "type": "homes", "id": "2", "select": { "residents": { "select": ["name"] } } });
    assert_eq!(store.query(&query).unwrap(), json!({ "residents": [] }));
    let before = store.prepared();

    {
        let mut graph = store.graph_mut();
        graph.insert(
            "bears",
            "6",
            Resource {
                attributes: json!({ "name": "Grumpy Bear" }).as_object().cloned().unwrap(),
                ..Resource::default()
            },
        );
        let mut home = graph.get("homes", "2").cloned().unwrap();
        home.relationships.insert(
            "residents".into(),
            serde_json::from_value(json!([{ "type": "bears", "id": "6" }])).unwrap(),
        );
        graph.insert("homes", "2", home);
    }

    assert!(!Arc::ptr_eq(&before, &store.prepared()));
    assert_eq!(
        store.query(&query).unwrap(),
        json!({ "residents": [{ "name": "Grumpy Bear" }] })
    );
    // Snapshots handed out earlier keep their graph.
    assert!(before.graph().get("bears", "6").is_none());
}

#[test]
fn explicit_invalidation_drops_the_cache() {
    let store = store();
    let first = store.prepared();
    store.invalidate();
    assert!(!Arc::ptr_eq(&first, &store.prepared()));
}

#[test]
fn concurrent_readers_share_one_prepared_graph() {
    let store = store();
    let query = json!({
        "type": "bears",
        "select": { "name": "name", "home": { "select": ["name"] } },
        "order": "name"
    });
    let expected = store.query(&query).unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| store.query(&query).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn builder_documents_run_like_hand_written_ones() {
    let store = store();
    let built = QueryBuilder::new("bears")
        .select(["name"])
        .select_subquery("home", QueryBuilder::new("homes").select(["name"]))
        .where_expr(json!({ "$pipe": [{ "$get": "year_introduced" }, { "$lt": 2000 }] }))
        .order_by("name", Direction::Desc)
        .limit(2)
        .build()
        .unwrap();
    assert_eq!(
        store.query(&built).unwrap(),
        json!([
            { "name": "Wish Bear", "home": { "name": "Care-a-Lot" } },
            { "name": "Tenderheart Bear", "home": { "name": "Care-a-Lot" } }
        ])
    );

    let grouped = QueryBuilder::new("bears")
        .group(GroupBuilder::by(["fur_color"]).aggregate("n", json!({ "$count": null })))
        .where_eq("year_introduced", 1982)
        .build()
        .unwrap();
    assert_eq!(
        store.query(&grouped).unwrap(),
        json!([
            { "fur_color": "tan", "n": 1 },
            { "fur_color": "carnation pink", "n": 1 },
            { "fur_color": "turquoise", "n": 1 }
        ])
    );
}

fn shout(operand: Value, _ctx: &Evaluator<'_>) -> quarry::Result<Value> {
    match operand {
        Value::String(text) => Ok(Value::String(text.to_uppercase())),
        other => Err(QuarryError::Evaluation(format!("$shout expects a string, got {other}"))),
    }
}

#[test]
fn custom_operations_extend_the_select_vocabulary() {
    let mut ops = OperationSet::select_ops();
    ops.register("$shout", Operation::Eager(shout));
    let store = store().with_engines(Engines {
        where_engine: Engine::for_where(),
        select_engine: Engine::new(ops),
    });
    let result = store
        .query(&json!({
            "type": "bears",
            "id": "1",
            "select": { "loud": { "$shout": { "$get": "name" } } }
        }))
        .unwrap();
    assert_eq!(result, json!({ "loud": "TENDERHEART BEAR" }));

    let err = store
        .query(&json!({ "type": "bears", "where": { "name": { "$shout": "x" } } }))
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(issues) if issues[0].message.contains("$shout")));
}

struct ReadOnlyWindow;

impl Validator for ReadOnlyWindow {
    fn validate(&self, _schema: &Schema, query: &Value, _engines: &Engines) -> Vec<ValidationIssue> {
        if query.get("limit").is_some() {
            return Vec::new();
        }
        vec![ValidationIssue {
            message: "queries must set a limit".into(),
            path: Vec::new(),
            value: query.clone(),
        }]
    }
}

#[test]
fn custom_validators_gate_execution() {
    let store = Store::new(care_bears_schema(), care_bears_graph(), StoreOptions::default())
        .with_validator(ReadOnlyWindow);
    assert!(matches!(
        store.query(&json!({ "type": "bears" })),
        Err(QuarryError::Validation(issues)) if issues[0].message == "queries must set a limit"
    ));
    assert_eq!(
        store.query(&json!({ "type": "bears", "limit": 1 })).unwrap(),
        json!([{ "type": "bears", "id": "1" }])
    );
}

#[test]
fn normalized_queries_skip_validation_and_renormalization() {
    let store = store();
    let normal = store
        .normalize(&json!({ "type": "bears", "select": "name", "where": { "fur_color": "tan" } }))
        .unwrap();
    assert_eq!(
        quarry::normalize(store.schema(), &normal).unwrap(),
        normal
    );
    assert_eq!(
        store.query_normal(&normal).unwrap(),
        json!([{ "name": "Tenderheart Bear" }])
    );
}
