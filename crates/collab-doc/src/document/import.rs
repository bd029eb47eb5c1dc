//! Rebuilding a document from `export()` output or plain JSON.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::containers::object_value;
use crate::document::{DocShared, DocState, Document, DocumentOptions, Storage, ROOT_ID};
use crate::error::{DocError, Result};
use crate::value::{ObjectId, ObjectKind, Value};

impl Document {
    /// Builds a document from JSON.
    ///
    /// Accepts the tagged format produced by [`Document::export`], including
    /// `{"$ref": n}` back-references, so shared and cyclic containers come
    /// back shared. Untagged JSON works too: objects become maps, arrays
    /// become lists and strings stay plain string values. The top level must
    /// describe a map. Nothing is recorded in the undo history.
    pub fn from_export(json: &Json, options: DocumentOptions) -> Result<Document> {
        let doc = Document::with_options(options);
        {
            let mut state = doc.shared.state.borrow_mut();
            let mut importer = Importer {
                doc: Rc::downgrade(&doc.shared),
                state: &mut *state,
                ids: HashMap::new(),
            };
            importer.root(json)?;
        }
        Ok(doc)
    }
}

struct Importer<'a> {
    doc: Weak<DocShared>,
    state: &'a mut DocState,
    /// Exported `$id` → container created for it.
    ids: HashMap<u64, (ObjectId, ObjectKind)>,
}

/// `{"$id": n, "$type": kind, "value": ...}` node.
struct Tagged<'j> {
    id: u64,
    kind: ObjectKind,
    value: &'j Json,
}

impl<'a> Importer<'a> {
    fn root(&mut self, json: &Json) -> Result<()> {
        let fields = match json {
            Json::Object(fields) => fields,
            other => return Err(invalid(format!("root must be a map, found {other}"))),
        };
        match tagged(fields)? {
            Some(node) if node.kind == ObjectKind::Map => {
                self.ids.insert(node.id, (ROOT_ID, ObjectKind::Map));
                self.fill(ROOT_ID, ObjectKind::Map, node.value)
            }
            Some(node) => Err(invalid(format!("root must be a map, found {}", node.kind))),
            None => self.fill(ROOT_ID, ObjectKind::Map, json),
        }
    }

    fn value(&mut self, json: &Json) -> Result<Value> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => Ok(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Json::String(s) => Ok(Value::Str(s.clone())),
            Json::Array(_) => self.container(ObjectKind::List, json),
            Json::Object(fields) => {
                if let Some(target) = back_reference(fields) {
                    let (id, kind) = self
                        .ids
                        .get(&target)
                        .copied()
                        .ok_or_else(|| invalid(format!("unresolved $ref {target}")))?;
                    return Ok(object_value(self.doc.clone(), id, kind));
                }
                match tagged(fields)? {
                    Some(node) => {
                        let id = self.state.create(Storage::empty(node.kind))?;
                        if self.ids.insert(node.id, (id, node.kind)).is_some() {
                            return Err(invalid(format!("duplicate $id {}", node.id)));
                        }
                        self.fill(id, node.kind, node.value)?;
                        Ok(object_value(self.doc.clone(), id, node.kind))
                    }
                    None => self.container(ObjectKind::Map, json),
                }
            }
        }
    }

    fn container(&mut self, kind: ObjectKind, json: &Json) -> Result<Value> {
        let id = self.state.create(Storage::empty(kind))?;
        self.fill(id, kind, json)?;
        Ok(object_value(self.doc.clone(), id, kind))
    }

    /// Converts `json` into storage of `kind` and installs it into `id`.
    fn fill(&mut self, id: ObjectId, kind: ObjectKind, json: &Json) -> Result<()> {
        let storage = match (kind, json) {
            (ObjectKind::Map, Json::Object(fields)) => {
                let mut entries = IndexMap::with_capacity(fields.len());
                for (key, item) in fields {
                    // Maps never store null; an absent key reads the same.
                    if !item.is_null() {
                        entries.insert(key.clone(), self.value(item)?);
                    }
                }
                Storage::Map(entries)
            }
            (ObjectKind::List, Json::Array(items)) => Storage::List(
                items
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<Result<_>>()?,
            ),
            (ObjectKind::Text, Json::String(text)) => Storage::Text(text.clone()),
            (kind, other) => {
                return Err(invalid(format!("{kind} container cannot hold {other}")));
            }
        };
        self.state.fill(id, storage)
    }
}

fn back_reference(fields: &serde_json::Map<String, Json>) -> Option<u64> {
    if fields.len() != 1 {
        return None;
    }
    fields.get("$ref").and_then(Json::as_u64)
}

fn tagged(fields: &serde_json::Map<String, Json>) -> Result<Option<Tagged<'_>>> {
    let (Some(id), Some(kind)) = (fields.get("$id"), fields.get("$type")) else {
        return Ok(None);
    };
    let id = id
        .as_u64()
        .ok_or_else(|| invalid(format!("$id must be an unsigned integer, found {id}")))?;
    let kind = match kind.as_str() {
        Some("map") => ObjectKind::Map,
        Some("list") => ObjectKind::List,
        Some("text") => ObjectKind::Text,
        _ => return Err(invalid(format!("unknown $type {kind}"))),
    };
    let value = fields
        .get("value")
        .ok_or_else(|| invalid(format!("container {id} has no value")))?;
    Ok(Some(Tagged { id, kind, value }))
}

fn invalid(message: String) -> DocError {
    DocError::InvalidExport(message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_json_becomes_containers() {
        let doc = Document::from_export(
            &json!({"name": "doc", "tags": ["a", 1, null], "meta": {"ok": true}, "gone": null}),
            DocumentOptions::default(),
        )
        .unwrap();
        let root = doc.root().unwrap();
        assert_eq!(root.get("name").unwrap(), Some(Value::Str("doc".into())));
        assert!(!root.has("gone").unwrap());
        let tags = root.get("tags").unwrap().unwrap();
        assert_eq!(tags.as_list().unwrap().len().unwrap(), 3);
        assert_eq!(tags.as_list().unwrap().parents().unwrap(), vec![ROOT_ID]);
        assert!(!doc.can_undo().unwrap());
    }

    #[test]
    fn back_references_share_one_container() {
        let doc = Document::from_export(
            &json!({"$id": 0, "$type": "map", "value": {
                "a": {"$id": 4, "$type": "text", "value": "hi"},
                "b": {"$ref": 4}
            }}),
            DocumentOptions::default(),
        )
        .unwrap();
        let root = doc.root().unwrap();
        let a = root.get("a").unwrap().unwrap();
        let b = root.get("b").unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_text().unwrap().text().unwrap(), "hi");
    }

    #[test]
    fn cycles_through_root_resolve() {
        let doc = Document::from_export(
            &json!({"$id": 7, "$type": "map", "value": {
                "items": {"$id": 8, "$type": "list", "value": [{"$ref": 7}]}
            }}),
            DocumentOptions::default(),
        )
        .unwrap();
        let root = doc.root().unwrap();
        let items = root.get("items").unwrap().unwrap();
        let first = items.as_list().unwrap().get(0).unwrap().unwrap();
        assert_eq!(first.as_map().unwrap(), &root);
        assert_eq!(root.parents().unwrap(), vec![items.object_id().unwrap()]);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let options = DocumentOptions::default;
        assert!(matches!(
            Document::from_export(&json!([1, 2]), options()),
            Err(DocError::InvalidExport(_))
        ));
        assert!(matches!(
            Document::from_export(&json!({"x": {"$ref": 3}}), options()),
            Err(DocError::InvalidExport(_))
        ));
        assert!(matches!(
            Document::from_export(
                &json!({"x": {"$id": 1, "$type": "text", "value": [1]}}),
                options()
            ),
            Err(DocError::InvalidExport(_))
        ));
    }
}
