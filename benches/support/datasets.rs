#![forbid(unsafe_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};

use quarry::{Graph, Schema, Store, StoreOptions};

const CITIES: [&str; 8] = [
    "Lisbon", "Osaka", "Quito", "Tromso", "Dakar", "Perth", "Tallinn", "Recife",
];

/// Synthetic social graph: users with friends, each living in a city.
pub struct SyntheticDataset {
    pub schema: Schema,
    pub graph: Graph,
    pub user_count: usize,
    pub friend_count: usize,
}

impl SyntheticDataset {
    pub fn generate(user_count: usize, friends_per_user: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);
        let mut users = Map::new();
        let mut residents: Vec<Vec<Value>> = vec![Vec::new(); CITIES.len()];
        for id in 0..user_count {
            let city = rng.gen_range(0..CITIES.len());
            residents[city].push(json!({ "type": "users", "id": id.to_string() }));
            let friends: Vec<Value> = (0..friends_per_user)
                .map(|_| json!({ "type": "users", "id": rng.gen_range(0..user_count).to_string() }))
                .collect();
            users.insert(
                id.to_string(),
                json!({
                    "attributes": {
                        "name": format!("user-{id}"),
                        "age": rng.gen_range(18..90),
                        "score": rng.gen_range(0.0..100.0),
                        "active": rng.gen_bool(0.7)
                    },
                    "relationships": {
                        "city": { "type": "cities", "id": city.to_string() },
                        "friends": friends
                    }
                }),
            );
        }
        let cities: Map<String, Value> = CITIES
            .iter()
            .zip(residents)
            .enumerate()
            .map(|(id, (name, residents))| {
                (
                    id.to_string(),
                    json!({
                        "attributes": { "name": name },
                        "relationships": { "residents": residents }
                    }),
                )
            })
            .collect();
        let graph = Graph::from_value(&json!({ "users": users, "cities": cities }))
            .expect("synthetic graph");
        Self {
            schema: schema(),
            graph,
            user_count,
            friend_count: user_count * friends_per_user,
        }
    }

    pub fn store(&self) -> Store {
        Store::new(self.schema.clone(), self.graph.clone(), StoreOptions::default())
    }
}

fn schema() -> Schema {
    Schema::from_value(&json!({
        "resources": {
            "users": {
                "attributes": { "name": {}, "age": {}, "score": {}, "active": {} },
                "relationships": {
                    "city": { "type": "cities", "cardinality": "one", "inverse": "residents" },
                    "friends": { "type": "users", "cardinality": "many" }
                }
            },
            "cities": {
                "attributes": { "name": {} },
                "relationships": {
                    "residents": { "type": "users", "cardinality": "many", "inverse": "city" }
                }
            }
        }
    }))
    .expect("synthetic schema")
}
