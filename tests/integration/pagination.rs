#![allow(missing_docs)]

mod support;

use quarry::QuarryError;
use serde_json::{json, Value};
use support::{ages_of, ages_store, run};

fn page(ages: &[i64], extra: Value) -> Vec<i64> {
    let mut query = json!({ "type": "people", "select": ["age"], "order": { "age": "asc" } });
    if let (Value::Object(base), Value::Object(extra)) = (&mut query, extra) {
        base.extend(extra);
    }
    let result = ages_store(ages).query(&query).expect("query runs");
    ages_of(&result)
}

const AGES: [i64; 5] = [2, 4, 5, 6, 3];

#[test]
fn after_cursor_excludes_the_anchor() {
    assert_eq!(page(&AGES, json!({})), [2, 3, 4, 5, 6]);
    assert_eq!(page(&AGES, json!({ "slice": { "after": { "age": 3 } } })), [4, 5, 6]);
}

#[test]
fn before_cursor_keeps_the_rows_nearest_the_anchor() {
    assert_eq!(
        page(&AGES, json!({ "slice": { "before": { "age": 5 }, "limit": 1 } })),
        [4]
    );
    assert_eq!(
        page(&AGES, json!({ "slice": { "before": { "age": 4 }, "limit": 1 } })),
        [3]
    );
    assert_eq!(
        page(&AGES, json!({ "slice": { "before": { "age": 6 }, "limit": 2, "offset": 1 } })),
        [3, 4]
    );
}

#[test]
fn both_cursors_slice_forward() {
    assert_eq!(
        page(
            &AGES,
            json!({ "slice": { "after": { "age": 2 }, "before": { "age": 6 }, "limit": 2 } })
        ),
        [3, 4]
    );
}

#[test]
fn offset_and_limit_page_through_sorted_rows() {
    assert_eq!(page(&AGES, json!({ "limit": 2 })), [2, 3]);
    assert_eq!(page(&AGES, json!({ "limit": 2, "offset": 2 })), [4, 5]);
    assert_eq!(page(&AGES, json!({ "limit": 2, "offset": 4 })), [6]);
    assert_eq!(page(&AGES, json!({ "offset": 9 })), Vec::<i64>::new());
}

#[test]
fn slice_values_take_precedence_over_top_level_shorthands() {
    assert_eq!(page(&AGES, json!({ "limit": 4, "slice": { "limit": 1 } })), [2]);
}

#[test]
fn descending_cursors_follow_the_sort_direction() {
    let store = ages_store(&AGES);
    let result = store
        .query(&json!({
            "type": "people",
            "select": ["age"],
            "order": { "age": "desc" },
            "slice": { "after": { "age": 4 } }
        }))
        .unwrap();
    assert_eq!(ages_of(&result), [3, 2]);
}

#[test]
fn cursors_without_order_use_the_id_field() {
    let store = ages_store(&AGES);
    let result = store
        .query(&json!({
            "type": "people",
            "select": ["id", "age"],
            "slice": { "after": { "id": "p2" } }
        }))
        .unwrap();
    assert_eq!(
        result,
        json!([{ "id": "p3", "age": 6 }, { "id": "p4", "age": 3 }])
    );
}

#[test]
fn multi_key_cursors_compare_tuples() {
    let result = run(json!({
        "type": "bears",
        "select": ["name"],
        "order": [{ "year_introduced": "desc" }, { "name": "asc" }],
        "slice": { "after": { "year_introduced": 1982, "name": "Cheer Bear" } }
    }));
    assert_eq!(
        result,
        json!([{ "name": "Tenderheart Bear" }, { "name": "Wish Bear" }])
    );
}

#[test]
fn subquery_windows_apply_across_the_related_collection() {
    let result = run(json!({
        "type": "homes",
        "id": "1",
        "select": { "residents": { "select": ["name"], "order": "name", "limit": 2 } }
    }));
    assert_eq!(
        result,
        json!({ "residents": [{ "name": "Cheer Bear" }, { "name": "Tenderheart Bear" }] })
    );
}

#[test]
fn out_of_range_bounds_fail() {
    let store = ages_store(&AGES);
    for bad in [json!({ "limit": 0 }), json!({ "offset": -1 }), json!({ "slice": { "limit": -3 } })] {
        let mut query = json!({ "type": "people" });
        if let (Value::Object(base), Value::Object(extra)) = (&mut query, bad) {
            base.extend(extra);
        }
        assert!(matches!(store.query(&query), Err(QuarryError::Range(_))));
    }
    assert!(matches!(
        store.query(&json!({ "type": "people", "limit": "ten" })),
        Err(QuarryError::Validation(_))
    ));
}
