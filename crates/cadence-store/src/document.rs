use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::tree::{get_in, split_path};

/// Key-path document store.
///
/// Paths are slash separated (`tasks/abc/title`). Reading a collection path
/// returns an object mapping child ids to their documents; writing `null`
/// is the same as removing the path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Value at `path`, or `None` if nothing is stored there.
    async fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Merge the keys of `partial` (a JSON object) into the value at `path`.
    async fn update(&self, path: &str, partial: Value) -> Result<()>;

    /// Delete the value at `path`. Removing a missing path is a no-op.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Children of `collection` whose `field` equals `value`, keyed by id.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<BTreeMap<String, Value>> {
        let field_segs = split_path(field)?;
        let Some(Value::Object(children)) = self.get(collection).await? else {
            return Ok(BTreeMap::new());
        };
        Ok(children
            .into_iter()
            .filter(|(_, child)| get_in(child, &field_segs) == Some(value))
            .collect())
    }
}
