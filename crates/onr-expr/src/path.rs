//! Restricted JSONPath (v0.1): write paths (`$.a.b`, no indices) and the
//! broader read-only subset (`$.a[0].b`, `$.a[*].b`) used for extraction.

use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path must start with \"$.\"")]
    MissingPrefix,
    #[error("empty path segment")]
    EmptySegment,
    #[error("array indices are not allowed in a write path: {0}")]
    IndexNotAllowed(String),
    #[error("malformed index in segment: {0}")]
    MalformedIndex(String),
    #[error("path has no segments")]
    EmptyPath,
    #[error("root value is not a JSON object")]
    RootNotObject,
}

/// A dot-separated path with no array indices, used for `set`/`del`/`rename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePath(pub Vec<String>);

impl WritePath {
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let rest = s.strip_prefix("$.").ok_or(PathError::MissingPrefix)?;
        if rest.is_empty() {
            return Err(PathError::EmptyPath);
        }
        let mut segs = Vec::new();
        for seg in rest.split('.') {
            if seg.is_empty() {
                return Err(PathError::EmptySegment);
            }
            if seg.contains('[') || seg.contains(']') {
                return Err(PathError::IndexNotAllowed(seg.to_string()));
            }
            segs.push(seg.to_string());
        }
        Ok(WritePath(segs))
    }

    pub fn as_str(&self) -> String {
        format!("$.{}", self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    Key(String),
    Index(String, u64),
    Wildcard(String),
}

/// The broader read-only path subset: each segment may carry a single
/// `[n]` or `[*]` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPath(pub Vec<PathSeg>);

impl ReadPath {
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let rest = s.strip_prefix("$.").ok_or(PathError::MissingPrefix)?;
        if rest.is_empty() {
            return Err(PathError::EmptyPath);
        }
        let mut segs = Vec::new();
        for raw in rest.split('.') {
            if raw.is_empty() {
                return Err(PathError::EmptySegment);
            }
            match raw.find('[') {
                None => segs.push(PathSeg::Key(raw.to_string())),
                Some(idx) => {
                    if !raw.ends_with(']') {
                        return Err(PathError::MalformedIndex(raw.to_string()));
                    }
                    let key = &raw[..idx];
                    let inner = &raw[idx + 1..raw.len() - 1];
                    if key.is_empty() || inner.is_empty() {
                        return Err(PathError::MalformedIndex(raw.to_string()));
                    }
                    if inner == "*" {
                        segs.push(PathSeg::Wildcard(key.to_string()));
                    } else {
                        let n: u64 = inner
                            .parse()
                            .map_err(|_| PathError::MalformedIndex(raw.to_string()))?;
                        segs.push(PathSeg::Index(key.to_string(), n));
                    }
                }
            }
        }
        Ok(ReadPath(segs))
    }
}

/// Single-path lookup following a write-shaped path (object keys only).
pub fn get<'a>(root: &'a Value, path: &WritePath) -> Option<&'a Value> {
    let mut cur = root;
    for seg in &path.0 {
        cur = cur.as_object()?.get(seg)?;
    }
    Some(cur)
}

/// `set`: creates intermediate objects as needed. Fails if the root (or an
/// intermediate value already present under a different type) is not an
/// object.
pub fn set(root: &mut Value, path: &WritePath, value: Value) -> Result<(), PathError> {
    if !root.is_object() {
        return Err(PathError::RootNotObject);
    }
    let (last, init) = path.0.split_last().ok_or(PathError::EmptyPath)?;
    let mut cur = root;
    for seg in init {
        let obj = cur.as_object_mut().ok_or(PathError::RootNotObject)?;
        let entry = obj
            .entry(seg.clone())
            .or_insert_with(|| Value::Object(Default::default()));
        if !entry.is_object() {
            *entry = Value::Object(Default::default());
        }
        cur = entry;
    }
    let obj = cur.as_object_mut().ok_or(PathError::RootNotObject)?;
    obj.insert(last.clone(), value);
    Ok(())
}

/// `set_if_absent`: leaves any existing value (including `null`) untouched.
pub fn set_if_absent(root: &mut Value, path: &WritePath, value: Value) -> Result<(), PathError> {
    if !root.is_object() {
        return Err(PathError::RootNotObject);
    }
    if get(root, path).is_some() {
        return Ok(());
    }
    set(root, path, value)
}

/// `del`: a no-op when any segment of the path is absent.
pub fn del(root: &mut Value, path: &WritePath) -> Result<(), PathError> {
    if !root.is_object() {
        return Err(PathError::RootNotObject);
    }
    let (last, init) = path.0.split_last().ok_or(PathError::EmptyPath)?;
    let mut cur = root;
    for seg in init {
        match cur.as_object_mut().and_then(|o| o.get_mut(seg)) {
            Some(next) => cur = next,
            None => return Ok(()),
        }
    }
    if let Some(obj) = cur.as_object_mut() {
        obj.remove(last);
    }
    Ok(())
}

/// `rename`: a no-op when the source path is absent.
pub fn rename(root: &mut Value, from: &WritePath, to: &WritePath) -> Result<(), PathError> {
    if !root.is_object() {
        return Err(PathError::RootNotObject);
    }
    let Some(value) = get(root, from).cloned() else {
        return Ok(());
    };
    del(root, from)?;
    set(root, to, value)
}

/// Evaluates a read path against `root`, returning every matching value.
/// A `Wildcard` segment fans out over array elements; later segments apply
/// to each fanned-out element independently.
pub fn eval_read<'a>(root: &'a Value, path: &ReadPath) -> Vec<&'a Value> {
    let mut cur: Vec<&Value> = vec![root];
    for seg in &path.0 {
        let mut next = Vec::new();
        for v in cur {
            let Some(obj) = v.as_object() else { continue };
            match seg {
                PathSeg::Key(k) => {
                    if let Some(val) = obj.get(k) {
                        next.push(val);
                    }
                }
                PathSeg::Index(k, n) => {
                    if let Some(val) = obj.get(k).and_then(|v| v.as_array()).and_then(|arr| arr.get(*n as usize)) {
                        next.push(val);
                    }
                }
                PathSeg::Wildcard(k) => {
                    if let Some(arr) = obj.get(k).and_then(|v| v.as_array()) {
                        next.extend(arr.iter());
                    }
                }
            }
        }
        cur = next;
    }
    cur
}

/// Sums numeric matches, treating non-numeric matches as 0.
pub fn sum_numeric(matches: &[&Value]) -> f64 {
    matches.iter().filter_map(|v| v.as_f64()).sum()
}

/// Returns the first non-empty string found by a depth-first traversal of
/// the matches, in match order.
pub fn first_nonempty_string(matches: &[&Value]) -> Option<String> {
    fn dfs(v: &Value) -> Option<String> {
        match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(obj) => obj.values().find_map(dfs),
            Value::Array(arr) => arr.iter().find_map(dfs),
            _ => None,
        }
    }
    matches.iter().find_map(|v| dfs(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_path_rejects_index() {
        assert!(WritePath::parse("$.a[0].b").is_err());
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = json!({});
        let path = WritePath::parse("$.a.b.c").unwrap();
        set(&mut root, &path, json!(1)).unwrap();
        assert_eq!(root, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn del_on_absent_path_is_noop() {
        let mut root = json!({"a": 1});
        let path = WritePath::parse("$.x.y").unwrap();
        del(&mut root, &path).unwrap();
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn rename_noop_when_source_absent() {
        let mut root = json!({"a": 1});
        let from = WritePath::parse("$.missing").unwrap();
        let to = WritePath::parse("$.renamed").unwrap();
        rename(&mut root, &from, &to).unwrap();
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn set_if_absent_preserves_null() {
        let mut root = json!({"a": null});
        let path = WritePath::parse("$.a").unwrap();
        set_if_absent(&mut root, &path, json!("new")).unwrap();
        assert_eq!(root, json!({"a": null}));
    }

    #[test]
    fn set_on_non_object_root_fails() {
        let mut root = json!([1, 2, 3]);
        let path = WritePath::parse("$.a").unwrap();
        assert!(set(&mut root, &path, json!(1)).is_err());
    }

    #[test]
    fn wildcard_sum_extraction() {
        let root = json!({"x": {"y": [{"z": 3}, {"z": 4}]}});
        let path = ReadPath::parse("$.x.y[*].z").unwrap();
        let matches = eval_read(&root, &path);
        assert_eq!(sum_numeric(&matches), 7.0);
    }
}
