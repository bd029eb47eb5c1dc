mod common;

use std::collections::HashSet;

use collab_doc::{DocError, Document, DocumentOptions, Export, Value};
use serde_json::json;

fn sample() -> Document {
    let doc = Document::new();
    let root = doc.root().unwrap();
    let shared = doc.create_map_with([("n", Value::from(1)), ("f", Value::from(0.5))]).unwrap();
    let left = doc.create_list_with([shared.clone()]).unwrap();
    let right = doc.create_list_with([Value::from(shared.clone()), Value::Null]).unwrap();
    let body = doc.create_text_with("héllo").unwrap();
    root.set("left", left).unwrap();
    root.set("right", right).unwrap();
    root.set("body", body).unwrap();
    root.set("flag", true).unwrap();
    shared.set("back", root.clone()).unwrap();
    doc
}

#[test]
fn export_round_trip_keeps_sharing() {
    common::setup_logging();
    let doc = sample();
    let exported = doc.export().unwrap();

    let copy = Document::from_export(&exported, DocumentOptions::default()).unwrap();
    assert_eq!(copy.export().unwrap()["value"]["flag"], json!(true));

    let root = copy.root().unwrap();
    let left = root.get("left").unwrap().unwrap();
    let right = root.get("right").unwrap().unwrap();
    let from_left = left.as_list().unwrap().get(0).unwrap().unwrap();
    let from_right = right.as_list().unwrap().get(0).unwrap().unwrap();
    assert_eq!(from_left, from_right);

    let shared = from_left.as_map().unwrap();
    assert_eq!(shared.get("back").unwrap().unwrap().as_map().unwrap(), &root);
    assert_eq!(shared.get("f").unwrap(), Some(Value::Float(0.5)));
    assert_eq!(
        root.get("body").unwrap().unwrap().as_text().unwrap().text().unwrap(),
        "héllo"
    );
    assert_eq!(copy.to_json().unwrap(), doc.to_json().unwrap());
    assert!(!copy.can_undo().unwrap());
}

#[test]
fn plain_view_expands_shared_containers() {
    let doc = sample();
    let view = doc.to_json().unwrap();
    assert_eq!(view["left"][0]["n"], json!(1));
    assert_eq!(view["right"][0]["n"], json!(1));
    assert_eq!(view["right"][1], json!(null));
    assert_eq!(view["flag"], json!(true));
    // The root is still being rendered when its own back link is reached.
    assert_eq!(view["left"][0]["back"], json!(null));
}

#[test]
fn handles_export_through_the_trait() {
    let doc = Document::new();
    let list = doc.create_list_with(["a", "b"]).unwrap();
    let exported = list.export(&mut HashSet::new()).unwrap();
    assert_eq!(
        exported,
        json!({"$id": list.id().as_u64(), "$type": "list", "value": ["a", "b"]})
    );
    assert_eq!(list.to_json().unwrap(), json!(["a", "b"]));
}

#[test]
fn closed_document_cannot_export() {
    let doc = sample();
    let root = doc.root().unwrap();
    doc.close();
    assert_eq!(doc.export().unwrap_err(), DocError::DocumentClosed);
    assert_eq!(
        root.export(&mut HashSet::new()).unwrap_err(),
        DocError::DocumentClosed
    );
}
