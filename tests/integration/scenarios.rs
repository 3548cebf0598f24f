#![allow(missing_docs)]

mod support;

use quarry::{QuarryError, Store, StoreOptions};
use serde_json::{json, Value};
use support::{care_bears_graph, care_bears_schema, run, store};

fn keys(value: &Value) -> Vec<&str> {
    value
        .as_object()
        .expect("object result")
        .keys()
        .map(String::as_str)
        .collect()
}

#[test]
fn one_to_one_projection() {
    let result = run(json!({
        "type": "bears",
        "id": "1",
        "select": ["name", { "home": { "select": ["name"] } }]
    }));
    assert_eq!(
        result,
        json!({ "name": "Tenderheart Bear", "home": { "name": "Care-a-Lot" } })
    );
}

#[test]
fn output_keys_follow_select_order() {
    let result = run(json!({
        "type": "bears",
        "id": "2",
        "select": ["year_introduced", "name", "belly_badge"]
    }));
    assert_eq!(keys(&result), ["year_introduced", "name", "belly_badge"]);
}

#[test]
fn explicit_keys_override_wildcard_in_place() {
    let result = run(json!({
        "type": "bears",
        "id": "3",
        "select": ["*", { "name": "fur_color" }]
    }));
    assert_eq!(
        keys(&result),
        ["name", "year_introduced", "belly_badge", "fur_color"]
    );
    assert_eq!(result["name"], json!("turquoise"));
    assert_eq!(result["belly_badge"], json!("shooting star"));
}

#[test]
fn many_subqueries_sort_within_the_related_collection() {
    let result = run(json!({
        "type": "bears",
        "id": "2",
        "select": {
            "name": "name",
            "powers": { "select": ["name"], "order": { "name": "desc" } }
        }
    }));
    assert_eq!(
        result,
        json!({
            "name": "Cheer Bear",
            "powers": [{ "name": "Make a Wish" }, { "name": "Care Bear Stare" }]
        })
    );
}

#[test]
fn cyclic_relationships_resolve_through_the_memo_table() {
    let result = run(json!({
        "type": "homes",
        "id": "1",
        "select": {
            "residents": {
                "select": { "name": "name", "home": { "select": ["name"] } },
                "where": { "fur_color": "tan" }
            }
        }
    }));
    assert_eq!(
        result,
        json!({ "residents": [{ "name": "Tenderheart Bear", "home": { "name": "Care-a-Lot" } }] })
    );

    let friends = run(json!({
        "type": "bears",
        "id": "1",
        "select": { "friend_of_friend": "best_friend.best_friend.name" }
    }));
    assert_eq!(friends, json!({ "friend_of_friend": "Tenderheart Bear" }));
}

#[test]
fn where_and_order_read_through_relationships() {
    let result = run(json!({
        "type": "bears",
        "select": ["name"],
        "where": { "home.name": "Care-a-Lot" },
        "order": "name"
    }));
    assert_eq!(
        result,
        json!([{ "name": "Cheer Bear" }, { "name": "Tenderheart Bear" }, { "name": "Wish Bear" }])
    );
}

#[test]
fn where_expressions_combine_with_attribute_maps() {
    let result = run(json!({
        "type": "bears",
        "select": ["name"],
        "where": {
            "$or": [
                { "year_introduced": { "$gt": 2000 } },
                { "fur_color": { "$in": ["tan", "turquoise"] } }
            ]
        },
        "order": [{ "year_introduced": "desc" }, { "name": "asc" }]
    }));
    assert_eq!(
        result,
        json!([{ "name": "Smart Heart Bear" }, { "name": "Tenderheart Bear" }, { "name": "Wish Bear" }])
    );
}

#[test]
fn null_one_refs_project_to_null() {
    let result = run(json!({
        "type": "bears",
        "id": "5",
        "select": ["name", { "home": { "select": ["name"] } }, { "friend": "best_friend.name" }]
    }));
    assert_eq!(
        result,
        json!({ "name": "Smart Heart Bear", "home": null, "friend": null })
    );
}

#[test]
fn bare_relationship_selects_emit_refs() {
    let result = run(json!({ "type": "bears", "id": "3", "select": ["home", "powers"] }));
    assert_eq!(
        result,
        json!({
            "home": { "type": "homes", "id": "1" },
            "powers": [
                { "type": "powers", "id": "careBearStare" },
                { "type": "powers", "id": "makeAWish" }
            ]
        })
    );
}

#[test]
fn expressions_compute_over_records() {
    let result = run(json!({
        "type": "bears",
        "id": "2",
        "select": {
            "name": "name",
            "power_count": { "$pipe": [{ "$get": "powers" }, { "$count": null }] },
            "era": {
                "$if": {
                    "if": { "$pipe": [{ "$get": "year_introduced" }, { "$lt": 2000 }] },
                    "then": "classic",
                    "else": "modern"
                }
            },
            "power_names": { "$get": "powers.$.name" }
        }
    }));
    assert_eq!(
        result,
        json!({
            "name": "Cheer Bear",
            "power_count": 2,
            "era": "classic",
            "power_names": ["Care Bear Stare", "Make a Wish"]
        })
    );
}

#[test]
fn custom_id_fields_are_readable() {
    let result = run(json!({
        "type": "powers",
        "select": ["power_id", { "wielder_count": { "$pipe": [{ "$get": "wielders" }, { "$count": null }] } }]
    }));
    assert_eq!(
        result,
        json!([
            { "power_id": "careBearStare", "wielder_count": 4 },
            { "power_id": "makeAWish", "wielder_count": 2 }
        ])
    );
}

#[test]
fn id_and_ids_shape_the_result() {
    assert_eq!(run(json!({ "type": "bears", "id": "404", "select": ["name"] })), Value::Null);
    assert_eq!(
        run(json!({ "type": "bears", "ids": ["3", "1", "404"], "select": ["name"] })),
        json!([{ "name": "Tenderheart Bear" }, { "name": "Wish Bear" }])
    );
    assert_eq!(
        run(json!({ "type": "bears", "where": { "name": "Grumpy Bear" } })),
        json!([])
    );
    assert_eq!(
        run(json!({ "type": "homes", "id": "2" })),
        json!({ "type": "homes", "id": "2" })
    );
}

#[test]
fn aggregates_are_rejected_in_where() {
    let store = store();
    let query = json!({
        "type": "bears",
        "where": { "$pipe": [{ "$get": "powers" }, { "$count": null }] }
    });
    assert!(matches!(store.query(&query), Err(QuarryError::Validation(_))));

    let unchecked = Store::new(
        care_bears_schema(),
        care_bears_graph(),
        StoreOptions {
            validate: false,
            ..StoreOptions::default()
        },
    );
    let err = unchecked.query(&query).unwrap_err();
    assert!(matches!(err, QuarryError::UnsupportedExpression { name } if name == "$count"));
}

#[test]
fn dangling_refs_fail_unless_tolerated() {
    let mut graph = support::care_bears_graph_value();
    graph["bears"]["2"]["relationships"]["home"] = json!({ "type": "homes", "id": "gone" });
    graph["bears"]["2"]["relationships"]["powers"] =
        json!([{ "type": "powers", "id": "makeAWish" }, { "type": "powers", "id": "gone" }]);
    let graph = quarry::Graph::from_value(&graph).unwrap();
    let query = json!({
        "type": "bears",
        "id": "2",
        "select": ["name", { "home": { "select": ["name"] } }, { "powers": { "select": ["name"] } }]
    });

    let strict = Store::new(care_bears_schema(), graph.clone(), StoreOptions::default());
    let err = strict.query(&query).unwrap_err();
    assert!(matches!(
        err,
        QuarryError::DanglingReference { ref resource_type, ref id } if resource_type == "homes" && id == "gone"
    ));

    let tolerant = Store::new(care_bears_schema(), graph, StoreOptions::tolerant());
    assert_eq!(
        tolerant.query(&query).unwrap(),
        json!({ "name": "Cheer Bear", "home": null, "powers": [{ "name": "Make a Wish" }] })
    );
}

#[test]
fn unknown_types_and_bad_shapes_are_errors() {
    let unchecked = Store::new(
        care_bears_schema(),
        care_bears_graph(),
        StoreOptions {
            validate: false,
            ..StoreOptions::default()
        },
    );
    assert!(matches!(
        unchecked.query(&json!({ "type": "cousins" })),
        Err(QuarryError::UnknownResourceType(name)) if name == "cousins"
    ));
    assert!(matches!(
        unchecked.query(&json!({ "type": "bears", "select": { "name": { "select": ["x"] } } })),
        Err(QuarryError::InvalidQuery(_))
    ));
}
