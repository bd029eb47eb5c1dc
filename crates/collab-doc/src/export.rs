//! JSON serialization of container graphs.
//!
//! # Overview
//!
//! Two renderings are provided:
//!
//! - [`Export`] writes every container once as
//!   `{"$id": n, "$type": "map" | "list" | "text", "value": ...}` and any
//!   later occurrence as `{"$ref": n}`, so shared substructure and cycles
//!   survive a round trip through [`Document::from_export`].
//! - `to_json` on documents and handles is a plain view: maps become
//!   objects, lists become arrays, texts become strings. Shared containers are
//!   expanded at every occurrence; a container reached again while it is
//!   still being rendered renders as `null`.
//!
//! [`Document::from_export`]: crate::Document::from_export

use std::collections::HashSet;

use serde_json::{json, Value as Json};

use crate::containers::{ListRef, MapRef, TextRef};
use crate::document::{DocState, Storage};
use crate::error::Result;
use crate::value::{ObjectId, Value};

/// Serialization with container de-duplication.
pub trait Export {
    /// Serializes `self`. Containers already in `visited` become `$ref`
    /// back-references; every container written is added to it.
    fn export(&self, visited: &mut HashSet<ObjectId>) -> Result<Json>;
}

impl Export for MapRef {
    fn export(&self, visited: &mut HashSet<ObjectId>) -> Result<Json> {
        self.export_with(visited)
    }
}

impl Export for ListRef {
    fn export(&self, visited: &mut HashSet<ObjectId>) -> Result<Json> {
        self.export_with(visited)
    }
}

impl Export for TextRef {
    fn export(&self, visited: &mut HashSet<ObjectId>) -> Result<Json> {
        self.export_with(visited)
    }
}

impl DocState {
    pub(crate) fn export_object(&self, id: ObjectId, visited: &mut HashSet<ObjectId>) -> Result<Json> {
        if !visited.insert(id) {
            return Ok(json!({ "$ref": id.as_u64() }));
        }
        let storage = &self.slot(id)?.storage;
        let value = match storage {
            Storage::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.export_value(item, visited)?);
                }
                Json::Object(out)
            }
            Storage::List(list) => Json::Array(
                list.iter()
                    .map(|item| self.export_value(item, visited))
                    .collect::<Result<_>>()?,
            ),
            Storage::Text(text) => Json::String(text.clone()),
        };
        Ok(json!({
            "$id": id.as_u64(),
            "$type": storage.kind().as_str(),
            "value": value
        }))
    }

    fn export_value(&self, value: &Value, visited: &mut HashSet<ObjectId>) -> Result<Json> {
        match value.object_id() {
            Some(id) => self.export_object(id, visited),
            None => Ok(value.primitive_json().unwrap_or(Json::Null)),
        }
    }

    /// Plain rendering; `path` holds the containers currently being rendered.
    pub(crate) fn view_object(&self, id: ObjectId, path: &mut Vec<ObjectId>) -> Result<Json> {
        if path.contains(&id) {
            return Ok(Json::Null);
        }
        path.push(id);
        let rendered = self.view_storage(id, path);
        path.pop();
        rendered
    }

    fn view_storage(&self, id: ObjectId, path: &mut Vec<ObjectId>) -> Result<Json> {
        Ok(match &self.slot(id)?.storage {
            Storage::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.view_value(item, path)?);
                }
                Json::Object(out)
            }
            Storage::List(list) => Json::Array(
                list.iter()
                    .map(|item| self.view_value(item, path))
                    .collect::<Result<_>>()?,
            ),
            Storage::Text(text) => Json::String(text.clone()),
        })
    }

    fn view_value(&self, value: &Value, path: &mut Vec<ObjectId>) -> Result<Json> {
        match value.object_id() {
            Some(id) => self.view_object(id, path),
            None => Ok(value.primitive_json().unwrap_or(Json::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    #[test]
    fn shared_container_is_written_once() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        let shared = doc.create_text_with("hi").unwrap();
        let list = doc.create_list_with([Value::from(shared.clone()), Value::from(shared.clone())]).unwrap();
        root.set("list", list.clone()).unwrap();

        let exported = doc.export().unwrap();
        let sid = shared.id().as_u64();
        assert_eq!(
            exported,
            json!({
                "$id": 0,
                "$type": "map",
                "value": {
                    "list": {
                        "$id": list.id().as_u64(),
                        "$type": "list",
                        "value": [
                            {"$id": sid, "$type": "text", "value": "hi"},
                            {"$ref": sid}
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn export_trait_shares_visited_set() {
        let doc = Document::new();
        let text = doc.create_text_with("x").unwrap();
        let mut visited = HashSet::new();
        text.export(&mut visited).unwrap();
        assert_eq!(
            text.export(&mut visited).unwrap(),
            json!({ "$ref": text.id().as_u64() })
        );
    }

    #[test]
    fn plain_view_expands_diamonds_and_cuts_cycles() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        let leaf = doc.create_map_with([("n", 1)]).unwrap();
        let list = doc.create_list_with([Value::from(leaf.clone()), Value::from(leaf)]).unwrap();
        root.set("list", list.clone()).unwrap();
        list.push(root.clone()).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            json!({"list": [{"n": 1}, {"n": 1}, null]})
        );
    }
}
