//! Property tests: a list container behaves like a `Vec` under any sequence
//! of edits, and undo/redo walk back and forth through the same states.

mod common;

use collab_doc::{Document, ListRef, Value};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Push(i64),
    Insert(usize, i64),
    InsertAll(usize, Vec<i64>),
    Set(usize, i64),
    Remove(usize),
    RemoveRange(usize, usize),
    RemoveValue(i64),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-20i64..20).prop_map(Op::Push),
        3 => (0usize..16, -20i64..20).prop_map(|(i, v)| Op::Insert(i, v)),
        2 => (0usize..16, prop::collection::vec(-20i64..20, 0..4))
            .prop_map(|(i, vs)| Op::InsertAll(i, vs)),
        2 => (0usize..16, -20i64..20).prop_map(|(i, v)| Op::Set(i, v)),
        2 => (0usize..16).prop_map(Op::Remove),
        2 => (0usize..16, 0usize..16).prop_map(|(a, b)| Op::RemoveRange(a.min(b), a.max(b))),
        1 => (-20i64..20).prop_map(Op::RemoveValue),
        1 => Just(Op::Clear),
    ]
}

/// Applies `op` to both sides; out-of-range ops must fail on the list and
/// leave the model untouched.
fn apply(list: &ListRef, model: &mut Vec<i64>, op: &Op) {
    let len = model.len();
    match op {
        Op::Push(v) => {
            list.push(*v).unwrap();
            model.push(*v);
        }
        Op::Insert(i, v) if *i <= len => {
            list.insert(*i, *v).unwrap();
            model.insert(*i, *v);
        }
        Op::Insert(i, v) => assert!(list.insert(*i, *v).is_err()),
        Op::InsertAll(i, vs) if *i <= len => {
            list.insert_all(*i, vs.iter().copied()).unwrap();
            model.splice(*i..*i, vs.iter().copied());
        }
        Op::InsertAll(i, vs) => assert!(list.insert_all(*i, vs.iter().copied()).is_err()),
        Op::Set(i, v) if *i < len => {
            list.set(*i, *v).unwrap();
            model[*i] = *v;
        }
        Op::Set(i, v) => assert!(list.set(*i, *v).is_err()),
        Op::Remove(i) if *i < len => {
            assert_eq!(list.remove(*i).unwrap(), Value::Int(model.remove(*i)));
        }
        Op::Remove(i) => assert!(list.remove(*i).is_err()),
        Op::RemoveRange(a, b) if *b <= len => {
            let removed: Vec<Value> = model.drain(*a..*b).map(Value::Int).collect();
            assert_eq!(list.remove_range(*a, *b).unwrap(), removed);
        }
        Op::RemoveRange(a, b) => assert!(list.remove_range(*a, *b).is_err()),
        Op::RemoveValue(v) => {
            let found = list.remove_value(&Value::Int(*v)).unwrap();
            match model.iter().position(|x| x == v) {
                Some(at) => {
                    assert!(found);
                    model.remove(at);
                }
                None => assert!(!found),
            }
        }
        Op::Clear => {
            list.clear().unwrap();
            model.clear();
        }
    }
}

fn snapshot(list: &ListRef) -> Vec<Value> {
    list.to_vec().unwrap()
}

fn as_values(model: &[i64]) -> Vec<Value> {
    model.iter().copied().map(Value::Int).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn list_matches_vec_model(ops in prop::collection::vec(op_strategy(), 0..40)) {
        common::setup_logging();
        let doc = Document::new();
        let list = doc.create_list().unwrap();
        let mut model = Vec::new();
        for op in &ops {
            apply(&list, &mut model, op);
            prop_assert_eq!(snapshot(&list), as_values(&model));
            prop_assert_eq!(list.len().unwrap(), model.len());
        }
    }

    #[test]
    fn undo_and_redo_walk_recorded_states(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let doc = Document::new();
        let list = doc.create_list().unwrap();
        let mut model = Vec::new();
        let mut states = vec![snapshot(&list)];
        for op in &ops {
            let before = doc.history_len().unwrap();
            apply(&list, &mut model, op);
            if doc.history_len().unwrap() > before {
                states.push(snapshot(&list));
            }
        }
        prop_assert_eq!(doc.history_len().unwrap(), states.len() - 1);

        for expected in states.iter().rev().skip(1) {
            prop_assert!(doc.undo().unwrap());
            prop_assert_eq!(&snapshot(&list), expected);
        }
        prop_assert!(!doc.can_undo().unwrap());

        for expected in states.iter().skip(1) {
            prop_assert!(doc.redo().unwrap());
            prop_assert_eq!(&snapshot(&list), expected);
        }
        prop_assert!(!doc.can_redo().unwrap());
    }
}

#[test]
fn lookup_helpers() {
    let doc = Document::new();
    let list = doc.create_list_with([3, 1, 3, 2]).unwrap();
    assert_eq!(list.index_of(&Value::Int(3)).unwrap(), Some(0));
    assert_eq!(list.last_index_of(&Value::Int(3)).unwrap(), Some(2));
    assert_eq!(list.index_of(&Value::Int(9)).unwrap(), None);
    let odd_after = |item: &Value, pivot: &Value| {
        item.as_i64().unwrap_or(0) % 2 == 1 && item.as_i64() > pivot.as_i64()
    };
    assert_eq!(list.index_of_by(&Value::Int(1), odd_after).unwrap(), Some(0));
    assert_eq!(list.last_index_of_by(&Value::Int(1), odd_after).unwrap(), Some(2));
}

#[test]
fn empty_edits_record_nothing() {
    let doc = Document::new();
    let list = doc.create_list_with([1, 2]).unwrap();
    list.insert_all(1, Vec::<i64>::new()).unwrap();
    list.remove_range(1, 1).unwrap();
    assert_eq!(doc.history_len().unwrap(), 0);
}
