//! List directive reconciliation.
//!
//! 1. Index writes past the end append; earlier items keep their nodes.
//! 2. Index writes inside the range rebuild that item only.
//! 3. Length writes truncate from the end.
//! 4. Replacing the array (or splicing it) rebuilds every item.
//! 5. After any operation sequence the rendered text matches the model.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use weft::{Dom, NodeId, Value, Vm, VmOptions};
use weft_runtime::Array;

// ── Helpers ───────────────────────────────────────────────────────────────

fn mount(markup: &str, model: serde_json::Value) -> (Dom, NodeId, Vm) {
    let dom = Dom::new();
    let root = dom.parse_element(markup).unwrap();
    let vm = Vm::new(dom.clone(), root, model, VmOptions::default()).unwrap();
    (dom, root, vm)
}

fn list(vm: &Vm, key: &str) -> Array {
    vm.data()
        .peek(key)
        .and_then(|v| v.as_array().cloned())
        .unwrap()
}

fn texts(dom: &Dom, root: NodeId) -> Vec<String> {
    dom.element_children(root)
        .into_iter()
        .map(|el| dom.text_content(el))
        .collect()
}

// ── Scenarios ─────────────────────────────────────────────────────────────

#[test]
fn index_write_past_end_appends() {
    let (dom, root, vm) = mount(
        "<section><div v-for='n in list'>{{n}}</div></section>",
        json!({"list": [1, 2, 3]}),
    );
    let before = dom.element_children(root);
    assert_eq!(texts(&dom, root), vec!["1", "2", "3"]);

    list(&vm, "list").set(3, 4).unwrap();

    let after = dom.element_children(root);
    assert_eq!(texts(&dom, root), vec!["1", "2", "3", "4"]);
    assert_eq!(after[..3], before[..]);
}

#[test]
fn index_write_rebuilds_one_item() {
    let (dom, root, vm) = mount(
        r#"<ul><li v-for="n in list">{{n}}</li></ul>"#,
        json!({"list": [1, 2, 3]}),
    );
    let before = dom.element_children(root);
    list(&vm, "list").set(1, 9).unwrap();
    let after = dom.element_children(root);

    assert_eq!(texts(&dom, root), vec!["1", "9", "3"]);
    assert_eq!(after[0], before[0]);
    assert_ne!(after[1], before[1]);
    assert_eq!(after[2], before[2]);
    assert!(!dom.contains_node(before[1]));
}

#[test]
fn length_write_truncates() {
    let (dom, root, vm) = mount(
        r#"<ul><li v-for="(n, i) in list">{{i}}:{{n}}</li></ul>"#,
        json!({"list": ["a", "b", "c"]}),
    );
    let first = dom.element_children(root)[0];
    list(&vm, "list").set_len(1).unwrap();
    assert_eq!(texts(&dom, root), vec!["0:a"]);
    assert_eq!(dom.element_children(root)[0], first);

    list(&vm, "list").pop().unwrap();
    assert_eq!(texts(&dom, root), Vec::<String>::new());
}

#[test]
fn whole_array_replace_rebuilds_everything() {
    let (dom, root, vm) = mount(
        r#"<ul><li v-for="n in list">{{n}}</li></ul>"#,
        json!({"list": [1, 2]}),
    );
    let old = list(&vm, "list");
    let before = dom.element_children(root);
    vm.data()
        .set("list", Value::from_json(json!([7, 8, 9])))
        .unwrap();
    let after = dom.element_children(root);

    assert_eq!(texts(&dom, root), vec!["7", "8", "9"]);
    assert!(before.iter().all(|n| !after.contains(n)));

    // The superseded array no longer drives the list.
    old.push(3).unwrap();
    assert_eq!(texts(&dom, root), vec!["7", "8", "9"]);
}

#[test]
fn splice_rebuilds_and_renumbers() {
    let (dom, root, vm) = mount(
        r#"<ol><li v-for="n in list">{{$index}}{{n}}</li></ol>"#,
        json!({"list": ["a", "b", "c"]}),
    );
    let items = list(&vm, "list");
    items.insert(1, "x").unwrap();
    assert_eq!(texts(&dom, root), vec!["0a", "1x", "2b", "3c"]);
    items.remove(0).unwrap();
    assert_eq!(texts(&dom, root), vec!["0x", "1b", "2c"]);
}

#[test]
fn nested_item_writes_patch_in_place() {
    let (dom, root, vm) = mount(
        r#"<ul><li v-for="row in rows">{{ row.name }}</li></ul>"#,
        json!({"rows": [{"name": "a"}, {"name": "b"}]}),
    );
    let before = dom.element_children(root);
    let row = list(&vm, "rows").peek(1).unwrap();
    row.as_object().unwrap().set("name", "B").unwrap();
    assert_eq!(texts(&dom, root), vec!["a", "B"]);
    assert_eq!(dom.element_children(root), before);
}

#[test]
fn nested_lists_and_siblings_keep_position() {
    let (dom, root, vm) = mount(
        r#"<div><h1>head</h1><p v-for="g in groups"><b v-for="x in g">{{x}}</b></p><h2>foot</h2></div>"#,
        json!({"groups": [[1, 2], [3]]}),
    );
    assert_eq!(
        dom.inner_html(root),
        "<h1>head</h1><p><b>1</b><b>2</b></p><p><b>3</b></p><h2>foot</h2>"
    );
    let inner = list(&vm, "groups").peek(1).unwrap();
    inner.as_array().unwrap().push(4).unwrap();
    list(&vm, "groups").push(Value::from_json(json!([5]))).unwrap();
    assert_eq!(
        dom.inner_html(root),
        "<h1>head</h1><p><b>1</b><b>2</b></p><p><b>3</b><b>4</b></p><p><b>5</b></p><h2>foot</h2>"
    );
}

#[test]
fn list_item_conditionals() {
    let (dom, root, vm) = mount(
        r#"<ul><li v-for="t in todos" v-if="!t.done">{{ t.title }}</li></ul>"#,
        json!({"todos": [{"title": "a", "done": false}, {"title": "b", "done": true}]}),
    );
    assert_eq!(texts(&dom, root), vec!["a"]);
    let second = list(&vm, "todos").peek(1).unwrap();
    second.as_object().unwrap().set("done", false).unwrap();
    assert_eq!(texts(&dom, root), vec!["a", "b"]);
}

// ── Properties ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Set(usize, i32),
    Push(i32),
    Pop,
    Truncate(usize),
    Insert(usize, i32),
    Remove(usize),
    Replace(Vec<i32>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8, -50i32..50).prop_map(|(i, v)| Op::Set(i, v)),
        (-50i32..50).prop_map(Op::Push),
        Just(Op::Pop),
        (0usize..6).prop_map(Op::Truncate),
        (0usize..6, -50i32..50).prop_map(|(i, v)| Op::Insert(i, v)),
        (0usize..6).prop_map(Op::Remove),
        proptest::collection::vec(-50i32..50, 0..5).prop_map(Op::Replace),
    ]
}

fn expected(model: &[Option<i32>]) -> Vec<String> {
    model
        .iter()
        .map(|v| v.map(|n| n.to_string()).unwrap_or_default())
        .collect()
}

proptest! {
    #[test]
    fn rendered_items_track_the_array(
        initial in proptest::collection::vec(-50i32..50, 0..5),
        ops in proptest::collection::vec(op_strategy(), 1..25),
    ) {
        let (dom, root, vm) = mount(
            r#"<ul><li v-for="n in list">{{n}}</li></ul>"#,
            json!({"list": initial}),
        );
        let mut model: Vec<Option<i32>> = initial.iter().copied().map(Some).collect();

        for op in ops {
            let array = list(&vm, "list");
            match op {
                Op::Set(i, v) => {
                    array.set(i, v).unwrap();
                    if i >= model.len() {
                        model.resize(i + 1, None);
                    }
                    model[i] = Some(v);
                }
                Op::Push(v) => {
                    array.push(v).unwrap();
                    model.push(Some(v));
                }
                Op::Pop => {
                    array.pop().unwrap();
                    model.pop();
                }
                Op::Truncate(n) => {
                    array.set_len(n).unwrap();
                    model.resize(n, None);
                }
                Op::Insert(i, v) => {
                    array.insert(i, v).unwrap();
                    model.insert(i.min(model.len()), Some(v));
                }
                Op::Remove(i) => {
                    array.remove(i).unwrap();
                    if i < model.len() {
                        model.remove(i);
                    }
                }
                Op::Replace(values) => {
                    vm.data().set("list", Value::from_json(json!(values))).unwrap();
                    model = values.into_iter().map(Some).collect();
                }
            }
            prop_assert_eq!(texts(&dom, root), expected(&model));
        }
    }
}
