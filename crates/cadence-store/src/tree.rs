//! Path helpers over a `serde_json::Value` tree, shared by both backends.

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Split `a/b/c` into segments. Leading and trailing slashes are ignored.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let segs: Vec<&str> = trimmed.split('/').collect();
    if segs.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segs)
}

pub fn get_in<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in segs {
        cur = cur.as_object()?.get(*seg)?;
    }
    Some(cur)
}

/// Write `value` at `segs`, creating intermediate objects. Non-object
/// intermediates are replaced.
pub fn set_in(root: &mut Value, segs: &[&str], value: Value) {
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return;
    };
    let mut cur = root;
    for seg in parents {
        cur = ensure_object(cur)
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(cur).insert(last.to_string(), value);
}

/// Detach and return the value at `segs`, if any.
pub fn remove_in(root: &mut Value, segs: &[&str]) -> Option<Value> {
    let Some((last, parents)) = segs.split_last() else {
        return Some(std::mem::take(root));
    };
    let mut cur = root;
    for seg in parents {
        cur = cur.as_object_mut()?.get_mut(*seg)?;
    }
    cur.as_object_mut()?.remove(*last)
}

/// Merge the keys of `partial` into the object at `segs`.
///
/// Keys may themselves be slash paths relative to `segs`; a `null` value
/// deletes the addressed child.
pub fn merge_in(root: &mut Value, segs: &[&str], partial: Value, path: &str) -> Result<()> {
    let Value::Object(entries) = partial else {
        return Err(StoreError::NotAnObject {
            path: path.to_string(),
        });
    };
    let mut target = root;
    for seg in segs {
        target = ensure_object(target)
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(target);
    for (key, value) in entries {
        let sub = split_path(&key)?;
        if value.is_null() {
            remove_in(target, &sub);
        } else {
            set_in(target, &sub, value);
        }
    }
    Ok(())
}

fn ensure_object(v: &mut Value) -> &mut Map<String, Value> {
    if !v.is_object() {
        *v = Value::Object(Map::new());
    }
    match v {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_rejects_empty_segments() {
        assert_eq!(split_path("/tasks/t1/").unwrap(), vec!["tasks", "t1"]);
        assert!(split_path("").is_err());
        assert!(split_path("tasks//t1").is_err());
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = json!({});
        set_in(&mut root, &["tasks", "t1", "title"], json!("Write"));
        assert_eq!(root, json!({"tasks": {"t1": {"title": "Write"}}}));
        assert_eq!(get_in(&root, &["tasks", "t1", "title"]), Some(&json!("Write")));
        assert_eq!(get_in(&root, &["tasks", "t2"]), None);
    }

    #[test]
    fn merge_deletes_null_keys_and_follows_nested_paths() {
        let mut root = json!({"tasks": {"t1": {"title": "a", "dueDate": "x"}}});
        merge_in(
            &mut root,
            &["tasks", "t1"],
            json!({"dueDate": null, "meta/flag": true}),
            "tasks/t1",
        )
        .unwrap();
        assert_eq!(
            root,
            json!({"tasks": {"t1": {"title": "a", "meta": {"flag": true}}}})
        );
    }

    #[test]
    fn merge_requires_object() {
        let mut root = json!({});
        let err = merge_in(&mut root, &["a"], json!(3), "a").unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject { .. }));
    }

    #[test]
    fn remove_returns_detached_value() {
        let mut root = json!({"habits": {"h1": {"name": "Run"}, "h2": {}}});
        let removed = remove_in(&mut root, &["habits", "h1"]);
        assert_eq!(removed, Some(json!({"name": "Run"})));
        assert_eq!(root, json!({"habits": {"h2": {}}}));
        assert_eq!(remove_in(&mut root, &["nope", "x"]), None);
    }
}
