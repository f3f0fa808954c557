//! Declarative JSON body transforms: `set`/`set_if_absent`/`del`/`rename` on
//! an object path, per §3 `JSONOp` and the §8 "JSON op safety" invariants.

use onr_expr::path::PathError;
use serde_json::Value;

use crate::model::{JsonOp, JsonOpKind};

#[derive(Debug, thiserror::Error)]
pub enum JsonOpsError {
    #[error("json op applied to a non-object root")]
    RootNotObject,
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Applies `ops` in order against `root`. Fails fast if `root` is not a JSON
/// object; individual `del`/`rename` ops are no-ops when their source path
/// is absent (never an error).
pub fn apply_json_ops(root: &mut Value, ops: &[JsonOp], eval: impl Fn(&onr_expr::Expr) -> String) -> Result<(), JsonOpsError> {
    if !root.is_object() {
        return Err(JsonOpsError::RootNotObject);
    }
    for op in ops {
        match op.kind {
            JsonOpKind::Set => {
                let value = op
                    .value
                    .as_ref()
                    .map(|e| Value::String(eval(e)))
                    .unwrap_or(Value::Null);
                onr_expr::path::set(root, &op.path, value)?;
            }
            JsonOpKind::SetIfAbsent => {
                let value = op
                    .value
                    .as_ref()
                    .map(|e| Value::String(eval(e)))
                    .unwrap_or(Value::Null);
                onr_expr::path::set_if_absent(root, &op.path, value)?;
            }
            JsonOpKind::Del => {
                onr_expr::path::del(root, &op.path)?;
            }
            JsonOpKind::Rename => {
                if let Some(to) = &op.rename_to {
                    onr_expr::path::rename(root, &op.path, to)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use onr_expr::WritePath;
    use serde_json::json;

    fn noop_eval(_: &onr_expr::Expr) -> String {
        String::new()
    }

    #[test]
    fn non_object_root_fails() {
        let mut root = json!([1, 2]);
        let ops = vec![JsonOp {
            kind: JsonOpKind::Set,
            path: WritePath::parse("$.a").unwrap(),
            value: Some(onr_expr::Expr::literal("x")),
            rename_to: None,
        }];
        assert!(apply_json_ops(&mut root, &ops, noop_eval).is_err());
    }

    #[test]
    fn del_absent_is_noop() {
        let mut root = json!({"a": 1});
        let ops = vec![JsonOp {
            kind: JsonOpKind::Del,
            path: WritePath::parse("$.missing").unwrap(),
            value: None,
            rename_to: None,
        }];
        apply_json_ops(&mut root, &ops, noop_eval).unwrap();
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn set_if_absent_preserves_null() {
        let mut root = json!({"a": null});
        let ops = vec![JsonOp {
            kind: JsonOpKind::SetIfAbsent,
            path: WritePath::parse("$.a").unwrap(),
            value: Some(onr_expr::Expr::literal("new")),
            rename_to: None,
        }];
        apply_json_ops(&mut root, &ops, noop_eval).unwrap();
        assert_eq!(root, json!({"a": null}));
    }
}
