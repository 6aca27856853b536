//! Property-based invariants for the observation layer.
//!
//! 1. Observing is idempotent: the same handle comes back, paths unchanged.
//! 2. Every nested container of an observed tree is observed.
//! 3. A watcher re-renders for writes to paths it read, and only those.
//! 4. Writing a strictly equal value never re-renders.
//! 5. After any write sequence a watcher's value equals a fresh evaluation.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use serde_json::json;
use weft_runtime::{
    BindError, Expression, Methods, Object, Scope, Update, Value, WatchOptions, Watcher, observe,
};

// ── Strategies ────────────────────────────────────────────────────────────

fn json_strategy() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        (-1000i32..1000).prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(serde_json::Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(serde_json::Value::Array),
            proptest::collection::btree_map("[a-z]{1,4}", inner, 0..6)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

const KEYS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn model() -> Object {
    let value = observe(
        Value::from_json(json!({"a": 0, "b": 0, "c": 0, "d": 0, "e": 0, "f": 0})),
        "",
    );
    value.as_object().cloned().unwrap_or_default()
}

fn counting_watcher(scope: &Scope, src: &str) -> (Rc<Watcher>, Rc<Cell<usize>>) {
    let renders = Rc::new(Cell::new(0));
    let counter = Rc::clone(&renders);
    let watcher = Watcher::new(
        Expression::parse(src).unwrap(),
        scope.clone(),
        WatchOptions::new("prop"),
        move |_: &Update<'_>| -> Result<(), BindError> {
            counter.set(counter.get() + 1);
            Ok(())
        },
    );
    (watcher, renders)
}

fn assert_all_observed(value: &Value) {
    match value {
        Value::Object(o) => {
            assert!(o.is_observed());
            for (_, v) in o.peek_entries() {
                assert_all_observed(&v);
            }
        }
        Value::Array(a) => {
            assert!(a.is_observed());
            for v in a.peek_items() {
                assert_all_observed(&v);
            }
        }
        _ => {}
    }
}

// ── Properties ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn observe_is_idempotent(src in json_strategy()) {
        let first = observe(Value::from_json(src.clone()), "root");
        let second = observe(first.clone(), "elsewhere");
        prop_assert!(first.same(&second));
        assert_all_observed(&second);
        prop_assert_eq!(second.to_json(), src);
        if let Value::Object(o) = &second {
            let path = o.path();
            prop_assert_eq!(path.as_deref(), Some("root"));
        }
    }

    #[test]
    fn renders_only_for_read_paths(
        read in proptest::collection::btree_set(0usize..6, 1..4),
        writes in proptest::collection::vec((0usize..6, 1i32..50), 1..20),
    ) {
        let model = model();
        let scope = Scope::root(model.clone(), Methods::new());
        let src = read.iter().map(|i| KEYS[*i]).collect::<Vec<_>>().join(" + ");
        let (watcher, renders) = counting_watcher(&scope, &src);
        watcher.render_initial().unwrap();

        let mut expected = 1;
        for (key, n) in writes {
            let before = model.peek(KEYS[key]).unwrap_or_default();
            model.set(KEYS[key], n).unwrap();
            let changed = !before.same(&Value::from(n));
            if changed && read.contains(&key) {
                expected += 1;
            }
            prop_assert_eq!(renders.get(), expected);
        }

        let fresh = Expression::parse(&src).unwrap().evaluate(&scope).unwrap();
        prop_assert!(watcher.value().same(&fresh));
    }

    #[test]
    fn equal_writes_are_silent(value in -100i32..100, repeats in 1usize..5) {
        let model = model();
        let scope = Scope::root(model.clone(), Methods::new());
        let (watcher, renders) = counting_watcher(&scope, "a");
        model.set("a", value).unwrap();
        watcher.render_initial().unwrap();
        for _ in 0..repeats {
            model.set("a", value).unwrap();
        }
        prop_assert_eq!(renders.get(), 1);
    }
}

#[test]
fn unread_keys_do_not_subscribe() {
    let model = model();
    let scope = Scope::root(model.clone(), Methods::new());
    let (watcher, _) = counting_watcher(&scope, "a ? b : c");
    watcher.render_initial().unwrap();
    assert_eq!(watcher.dependency_paths(), vec!["", "a", "c"]);
    model.set("a", 1).unwrap();
    assert_eq!(watcher.dependency_paths(), vec!["", "a", "b"]);
}
