//! Column-oriented JSON tables.
//!
//! Both durable files share one shape:
//!
//! ```json
//! { "columns": ["filename", "rating", "Steps"],
//!   "rows": [["a.png", "general", 20], ["b.png", "sensitive", null]] }
//! ```
//!
//! The column set is the union of every row's keys, so rows with different
//! generation parameters live in one table. A cell a row does not have is `null`.
//! On the way back, `null` cells are dropped before a row is deserialized, so they
//! read as absent: `None` for optional fields, no key for dynamic columns.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StashError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn from_items<T: Serialize>(items: &[T]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut objects = Vec::with_capacity(items.len());

        for item in items {
            let Value::Object(map) = serde_json::to_value(item)? else {
                return Err(StashError::Persistence(
                    "table rows must serialize to objects".to_string(),
                ));
            };
            for key in map.keys() {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
            objects.push(map);
        }

        let rows = objects
            .into_iter()
            .map(|mut map| {
                columns
                    .iter()
                    .map(|c| map.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn into_items<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        let width = self.columns.len();
        let mut items = Vec::with_capacity(self.rows.len());

        for (n, row) in self.rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(StashError::Persistence(format!(
                    "row {} has {} cells, expected {}",
                    n,
                    row.len(),
                    width
                )));
            }
            let map: Map<String, Value> = self
                .columns
                .iter()
                .cloned()
                .zip(row)
                .filter(|(_, v)| !v.is_null())
                .collect();
            items.push(serde_json::from_value(Value::Object(map))?);
        }

        Ok(items)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
