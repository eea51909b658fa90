use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::document::DocumentStore;
use crate::error::{Result, StoreError};
use crate::tree::{get_in, merge_in, remove_in, set_in, split_path};

/// Whole-tree in-process store. Used for `database.backend = "memory"` and in tests.
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
        }
    }

    /// Seed the store from an existing tree, e.g. a JSON export.
    pub fn from_value(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let segs = split_path(path)?;
        let root = self.root.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(get_in(&root, &segs).filter(|v| !v.is_null()).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let segs = split_path(path)?;
        let mut root = self.root.write().map_err(|_| StoreError::LockPoisoned)?;
        if value.is_null() {
            remove_in(&mut root, &segs);
        } else {
            set_in(&mut root, &segs, value);
        }
        Ok(())
    }

    async fn update(&self, path: &str, partial: Value) -> Result<()> {
        let segs = split_path(path)?;
        let mut root = self.root.write().map_err(|_| StoreError::LockPoisoned)?;
        merge_in(&mut root, &segs, partial, path)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let segs = split_path(path)?;
        let mut root = self.root.write().map_err(|_| StoreError::LockPoisoned)?;
        remove_in(&mut root, &segs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_set_update_remove() {
        let store = MemoryStore::new();
        store
            .set("tasks/t1", json!({"title": "a", "userId": "u1"}))
            .await
            .unwrap();
        store.update("tasks/t1", json!({"completed": true})).await.unwrap();

        let doc = store.get("tasks/t1").await.unwrap().unwrap();
        assert_eq!(doc["completed"], json!(true));
        assert_eq!(doc["title"], json!("a"));

        let all = store.get("tasks").await.unwrap().unwrap();
        assert!(all.get("t1").is_some());

        store.remove("tasks/t1").await.unwrap();
        assert_eq!(store.get("tasks/t1").await.unwrap(), None);
        // Removing twice is not an error.
        store.remove("tasks/t1").await.unwrap();
    }

    #[tokio::test]
    async fn setting_null_removes() {
        let store = MemoryStore::new();
        store.set("users/u1", json!({"email": "a@b.c"})).await.unwrap();
        store.set("users/u1", Value::Null).await.unwrap();
        assert_eq!(store.get("users/u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn query_by_field_filters_children() {
        let store = MemoryStore::new();
        store.set("habits/h1", json!({"userId": "u1"})).await.unwrap();
        store.set("habits/h2", json!({"userId": "u2"})).await.unwrap();
        store.set("habits/h3", json!({"userId": "u1"})).await.unwrap();

        let found = store
            .query_by_field("habits", "userId", &json!("u1"))
            .await
            .unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["h1", "h3"]);

        let none = store
            .query_by_field("missing", "userId", &json!("u1"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
