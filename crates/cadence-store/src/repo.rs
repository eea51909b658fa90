//! Typed accessors for the `tasks`, `habits` and `users` collections.

use cadence_core::types::{Habit, Task, UserProfile};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use crate::document::DocumentStore;
use crate::error::Result;

pub const TASKS: &str = "tasks";
pub const HABITS: &str = "habits";
pub const USERS: &str = "users";

pub fn task_path(id: &str) -> String {
    format!("{TASKS}/{id}")
}

pub fn habit_path(id: &str) -> String {
    format!("{HABITS}/{id}")
}

pub fn user_path(id: &str) -> String {
    format!("{USERS}/{id}")
}

pub async fn load_task(store: &dyn DocumentStore, id: &str) -> Result<Option<Task>> {
    load(store, &task_path(id)).await
}

pub async fn save_task(store: &dyn DocumentStore, id: &str, task: &Task) -> Result<()> {
    store.set(&task_path(id), serde_json::to_value(task)?).await
}

pub async fn delete_task(store: &dyn DocumentStore, id: &str) -> Result<()> {
    store.remove(&task_path(id)).await
}

pub async fn tasks_for_user(store: &dyn DocumentStore, user_id: &str) -> Result<Vec<(String, Task)>> {
    owned_by(store, TASKS, user_id).await
}

pub async fn load_habit(store: &dyn DocumentStore, id: &str) -> Result<Option<Habit>> {
    load(store, &habit_path(id)).await
}

pub async fn save_habit(store: &dyn DocumentStore, id: &str, habit: &Habit) -> Result<()> {
    store.set(&habit_path(id), serde_json::to_value(habit)?).await
}

pub async fn delete_habit(store: &dyn DocumentStore, id: &str) -> Result<()> {
    store.remove(&habit_path(id)).await
}

pub async fn habits_for_user(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<Vec<(String, Habit)>> {
    owned_by(store, HABITS, user_id).await
}

pub async fn load_profile(store: &dyn DocumentStore, user_id: &str) -> Result<Option<UserProfile>> {
    load(store, &user_path(user_id)).await
}

pub async fn save_profile(
    store: &dyn DocumentStore,
    user_id: &str,
    profile: &UserProfile,
) -> Result<()> {
    store.update(&user_path(user_id), serde_json::to_value(profile)?).await
}

/// Every child of `collection` as raw JSON, so callers can decode each
/// entry independently and skip the ones that fail.
pub async fn list_raw(store: &dyn DocumentStore, collection: &str) -> Result<Vec<(String, Value)>> {
    match store.get(collection).await? {
        Some(Value::Object(children)) => Ok(children.into_iter().collect()),
        Some(other) => {
            warn!(collection, kind = %json_kind(&other), "collection is not an object; ignoring");
            Ok(Vec::new())
        }
        None => Ok(Vec::new()),
    }
}

async fn load<T: DeserializeOwned>(store: &dyn DocumentStore, path: &str) -> Result<Option<T>> {
    match store.get(path).await? {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

async fn owned_by<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    user_id: &str,
) -> Result<Vec<(String, T)>> {
    let rows = store
        .query_by_field(collection, "userId", &json!(user_id))
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, v)| match serde_json::from_value(v) {
            Ok(item) => Some((id, item)),
            Err(e) => {
                warn!(collection, id = %id, "skipping malformed document: {e}");
                None
            }
        })
        .collect())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
