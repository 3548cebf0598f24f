#![allow(dead_code)]

use quarry::{Graph, Schema, Store, StoreOptions};
use serde_json::{json, Value};

pub fn care_bears_schema() -> Schema {
    Schema::from_value(&json!({
        "resources": {
            "bears": {
                "attributes": {
                    "name": { "type": "string" },
                    "year_introduced": { "type": "integer" },
                    "belly_badge": { "type": "string" },
                    "fur_color": { "type": "string" }
                },
                "relationships": {
                    "home": { "type": "homes", "cardinality": "one", "inverse": "residents" },
                    "powers": { "type": "powers", "cardinality": "many", "inverse": "wielders" },
                    "best_friend": { "type": "bears", "cardinality": "one" }
                }
            },
            "homes": {
                "attributes": {
                    "name": { "type": "string" },
                    "caring_meter": { "type": "number" },
                    "is_in_clouds": { "type": "boolean" }
                },
                "relationships": {
                    "residents": { "type": "bears", "cardinality": "many", "inverse": "home" }
                }
            },
            "powers": {
                "idField": "power_id",
                "attributes": {
                    "name": { "type": "string" },
                    "description": { "type": "string" }
                },
                "relationships": {
                    "wielders": { "type": "bears", "cardinality": "many", "inverse": "powers" }
                }
            }
        }
    }))
    .expect("schema document")
}

fn bear(name: &str, year: i64, badge: &str, fur: &str, home: Value, powers: &[&str], friend: Value) -> Value {
    json!({
        "attributes": {
            "name": name,
            "year_introduced": year,
            "belly_badge": badge,
            "fur_color": fur
        },
        "relationships": {
            "home": home,
            "powers": powers.iter().map(|id| json!({ "type": "powers", "id": id })).collect::<Vec<_>>(),
            "best_friend": friend
        }
    })
}

pub fn care_bears_graph_value() -> Value {
    let home = |id: &str| json!({ "type": "homes", "id": id });
    let friend = |id: &str| json!({ "type": "bears", "id": id });
    let residents = |ids: &[&str]| {
        ids.iter()
            .map(|id| json!({ "type": "bears", "id": id }))
            .collect::<Vec<_>>()
    };
    json!({
        "bears": {
            "1": bear("Tenderheart Bear", 1982, "red heart with pink outline", "tan", home("1"), &["careBearStare"], friend("2")),
            "2": bear("Cheer Bear", 1982, "rainbow", "carnation pink", home("1"), &["careBearStare", "makeAWish"], friend("1")),
            "3": bear("Wish Bear", 1982, "shooting star", "turquoise", home("1"), &["careBearStare", "makeAWish"], Value::Null),
            "5": bear("Smart Heart Bear", 2005, "red apple with a feather", "watermelon", Value::Null, &["careBearStare"], Value::Null)
        },
        "homes": {
            "1": {
                "attributes": { "name": "Care-a-Lot", "caring_meter": 1, "is_in_clouds": true },
                "relationships": { "residents": residents(&["1", "2", "3"]) }
            },
            "2": {
                "attributes": { "name": "Forest of Feelings", "caring_meter": 1, "is_in_clouds": false },
                "relationships": { "residents": [] }
            }
        },
        "powers": {
            "careBearStare": {
                "attributes": { "name": "Care Bear Stare", "description": "Purges evil." },
                "relationships": { "wielders": residents(&["1", "2", "3", "5"]) }
            },
            "makeAWish": {
                "attributes": { "name": "Make a Wish", "description": "Makes a wish on Twinkers." },
                "relationships": { "wielders": residents(&["2", "3"]) }
            }
        }
    })
}

pub fn care_bears_graph() -> Graph {
    Graph::from_value(&care_bears_graph_value()).expect("graph document")
}

pub fn store() -> Store {
    Store::new(care_bears_schema(), care_bears_graph(), StoreOptions::default())
}

pub fn run(query: Value) -> Value {
    store().query(&query).expect("query runs")
}

/// Schema with one resource type carrying only `age`, for pagination tests.
pub fn ages_schema() -> Schema {
    Schema::from_value(&json!({
        "resources": {
            "people": { "attributes": { "age": { "type": "integer" } } }
        }
    }))
    .expect("schema document")
}

/// One `people` record per age, ids `p0..`, in the given insertion order.
pub fn ages_store(ages: &[i64]) -> Store {
    let mut graph = Graph::new();
    for (index, age) in ages.iter().enumerate() {
        graph.insert(
            "people",
            format!("p{index}"),
            quarry::Resource {
                attributes: json!({ "age": age }).as_object().cloned().unwrap_or_default(),
                ..quarry::Resource::default()
            },
        );
    }
    Store::new(ages_schema(), graph, StoreOptions::default())
}

pub fn ages_of(result: &Value) -> Vec<i64> {
    result
        .as_array()
        .expect("array result")
        .iter()
        .map(|row| row["age"].as_i64().expect("integer age"))
        .collect()
}
