//! Editing, dirty tracking, patches and registries through `ValueTree`.

mod common;

use std::sync::{Arc, Mutex};

use common::{factory, plain_tree, schema};
use proptest::prelude::*;
use serde_json::{json, Value};
use value_tree::{
    Change, ChangeHandlerRegistry, DefaultValueRegistry, IdGenerator, NodeFactory, NodeId, PrimitiveValue,
    SchemaDefinition, Severity, TreeError, ValueNode, ValueTree,
};

fn inventory_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "active": {"type": "boolean", "default": true},
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "sku": {"type": "string"},
                        "qty": {"type": "number"}
                    }
                }
            }
        }
    })
}

fn inventory() -> ValueTree {
    plain_tree(
        inventory_schema(),
        json!({
            "name": "depot",
            "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}, {"sku": "c", "qty": 3}]
        }),
    )
}

fn skus(tree: &ValueTree) -> Vec<Value> {
    match tree.value_at("items") {
        Some(Value::Array(items)) => items.iter().map(|item| item["sku"].clone()).collect(),
        _ => Vec::new(),
    }
}

// ── Dirty tracking ────────────────────────────────────────────────────────

#[test]
fn test_fresh_tree_is_clean() {
    let tree = inventory();
    assert!(!tree.is_dirty());
    assert!(tree.changes().is_empty());
    assert_eq!(tree.value_at("active"), Some(json!(true)));
}

#[test]
fn test_set_back_to_baseline_is_clean() {
    let mut tree = inventory();
    tree.set_value("name", "hub").unwrap();
    assert!(tree.is_dirty());
    tree.set_value("name", "depot").unwrap();
    assert!(!tree.is_dirty());
    // The log still holds both writes.
    assert_eq!(tree.changes().len(), 2);
}

#[test]
fn test_commit_then_revert_keeps_committed_state() {
    let mut tree = inventory();
    tree.set_value("items[0].qty", 10).unwrap();
    tree.push_value("items", json!({"sku": "d"})).unwrap();
    tree.commit();
    assert!(!tree.is_dirty());
    assert!(tree.patches().is_empty());

    tree.remove_at("items", 3).unwrap();
    tree.set_value("items[0].qty", 99).unwrap();
    tree.revert();
    assert_eq!(skus(&tree), vec![json!("a"), json!("b"), json!("c"), json!("d")]);
    assert_eq!(tree.value_at("items[0].qty"), Some(json!(10)));
    assert_eq!(tree.value_at("items[3].qty"), Some(json!(0)));
}

#[test]
fn test_revert_restores_order_and_parents() {
    let mut tree = inventory();
    let first = tree.get("items[0]").unwrap().id().clone();
    tree.move_item("items", 0, 2).unwrap();
    tree.clear_array("items").unwrap();
    assert_eq!(tree.value_at("items"), Some(json!([])));

    tree.revert();
    assert_eq!(skus(&tree), vec![json!("a"), json!("b"), json!("c")]);
    assert_eq!(tree.path_of(&first).to_string(), "items[0]");
    assert_eq!(
        tree.store().node(&first).unwrap().parent(),
        Some(tree.get("items").unwrap().id())
    );
    assert!(!tree.is_dirty());
}

// ── Patches ───────────────────────────────────────────────────────────────

#[test]
fn test_every_operation_renders_a_patch() {
    let schema = json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}},
            "extra": {"type": "object", "additionalProperties": {"type": "number"}}
        }
    });
    let mut tree = plain_tree(schema, json!({"title": "t", "tags": ["x", "y"]}));

    tree.set_value("title", "u").unwrap();
    tree.push_value("tags", "z").unwrap();
    tree.insert_value_at("tags", 0, "w").unwrap();
    tree.move_item("tags", 0, 3).unwrap();
    tree.replace_value_at("tags", 1, "Y").unwrap();
    tree.remove_at("tags", 0).unwrap();
    tree.add_property("extra", "n", None, 4).unwrap();
    tree.remove_property("extra", "n").unwrap();
    tree.clear_array("tags").unwrap();

    assert_eq!(
        tree.patches_json(),
        json!([
            {"op": "replace", "path": "/title", "value": "u"},
            {"op": "add", "path": "/tags/-", "value": "z"},
            {"op": "add", "path": "/tags/0", "value": "w"},
            {"op": "move", "from": "/tags/0", "path": "/tags/3"},
            {"op": "replace", "path": "/tags/1", "value": "Y"},
            {"op": "remove", "path": "/tags/0"},
            {"op": "add", "path": "/extra/n", "value": 4},
            {"op": "remove", "path": "/extra/n"},
            {"op": "replace", "path": "/tags", "value": []}
        ])
    );
    assert!(matches!(
        &tree.changes()[5],
        Change::ArrayRemove { index: 0, old_value, .. } if old_value == &json!("x")
    ));
}

#[test]
fn test_pointer_escaping_in_patches() {
    let schema = json!({
        "type": "object",
        "additionalProperties": {"type": "string"}
    });
    let mut tree = plain_tree(schema, json!({"a/b": "1", "m~n": "2"}));
    tree.set_value("a/b", "3").unwrap();
    tree.set_value("m~n", "4").unwrap();
    assert_eq!(
        tree.patches_json(),
        json!([
            {"op": "replace", "path": "/a~1b", "value": "3"},
            {"op": "replace", "path": "/m~0n", "value": "4"}
        ])
    );
}

#[test]
fn test_failed_operations_record_nothing() {
    let mut tree = inventory();
    assert!(matches!(
        tree.remove_at("items", 7),
        Err(TreeError::IndexOutOfBounds { index: 7, len: 3 })
    ));
    assert!(tree.move_item("items", 0, 3).is_err());
    assert!(tree.insert_value_at("items", 4, json!({})).is_err());
    assert!(matches!(
        tree.remove_property("", "nope"),
        Err(TreeError::PropertyNotFound(_))
    ));
    assert!(tree.changes().is_empty());
    assert!(!tree.is_dirty());
}

// ── Index ─────────────────────────────────────────────────────────────────

#[test]
fn test_paths_follow_structural_edits() {
    let mut tree = inventory();
    let ids: Vec<NodeId> = (0..3)
        .map(|i| tree.get(&format!("items[{i}]")).unwrap().id().clone())
        .collect();
    let qty_of_c = tree.get("items[2].qty").unwrap().id().clone();
    assert_eq!(tree.path_of(&qty_of_c).to_string(), "items[2].qty");

    let inserted = tree.insert_value_at("items", 0, json!({"sku": "z"})).unwrap();
    assert_eq!(tree.path_of(&inserted).to_string(), "items[0]");
    assert_eq!(tree.path_of(&ids[0]).to_string(), "items[1]");
    assert_eq!(tree.path_of(&qty_of_c).to_string(), "items[3].qty");

    tree.remove_at("items", 1).unwrap();
    assert_eq!(tree.path_of(&ids[1]).to_string(), "items[1]");
    assert!(tree.node_by_id(&ids[0]).is_none());

    tree.move_item("items", 2, 0).unwrap();
    assert_eq!(tree.path_of(&ids[2]).to_string(), "items[0]");
    assert_eq!(tree.path_of(&qty_of_c).to_string(), "items[0].qty");
    assert_eq!(tree.path_of(&inserted).to_string(), "items[1]");
}

#[test]
fn test_index_tracks_new_and_removed_nodes() {
    let mut tree = inventory();
    let before = tree.index().len();
    let pushed = tree.push_value("items", json!({"sku": "d", "qty": 4})).unwrap();
    // The item object plus its two members.
    assert_eq!(tree.index().len(), before + 3);
    assert!(tree.index().contains(&pushed));
    assert_eq!(tree.node_by_id(&pushed).map(ValueNode::name), Some("3"));

    tree.clear_array("items").unwrap();
    assert_eq!(tree.index().len(), before - 9);
    assert!(!tree.index().contains(&pushed));
}

// ── Schema features ───────────────────────────────────────────────────────

#[test]
fn test_references_resolve_through_factory() {
    let address = SchemaDefinition::object([
        ("street", SchemaDefinition::string()),
        ("zip", SchemaDefinition::string().with_default("00000")),
    ]);
    let factory = Arc::new(
        NodeFactory::new()
            .with_id_generator(IdGenerator::isolated())
            .with_ref_schema("#/definitions/address", address),
    );
    let root_schema = schema(json!({
        "type": "object",
        "properties": {
            "home": {"$ref": "#/definitions/address"},
            "others": {"type": "array", "items": {"$ref": "#/definitions/address"}}
        }
    }));
    let mut tree = ValueTree::from_factory(&factory, &root_schema, &json!({"home": {"street": "Main"}})).unwrap();
    assert_eq!(tree.value_at("home"), Some(json!({"street": "Main", "zip": "00000"})));

    tree.push_value("others", json!({"street": "Side"})).unwrap();
    assert_eq!(tree.value_at("others[0].zip"), Some(json!("00000")));
}

#[test]
fn test_default_registry_fills_missing_values() {
    let defaults = DefaultValueRegistry::new().with(
        "date",
        |s| s.format.as_deref() == Some("date"),
        |_| json!("1970-01-01"),
    );
    let factory = Arc::new(
        NodeFactory::new()
            .with_id_generator(IdGenerator::isolated())
            .with_defaults(defaults),
    );
    let root_schema = schema(json!({
        "type": "object",
        "properties": {
            "born": {"type": "string", "format": "date"},
            "due": {"type": "string", "format": "date", "default": "2000-01-01"},
            "note": {"type": "string"}
        }
    }));
    let tree = ValueTree::from_factory(&factory, &root_schema, &json!({})).unwrap();
    assert_eq!(
        tree.plain_value(),
        json!({"born": "1970-01-01", "due": "2000-01-01", "note": ""})
    );
}

#[test]
fn test_null_write_resets_to_registry_default() {
    let defaults = DefaultValueRegistry::new().with(
        "date",
        |s| s.format.as_deref() == Some("date"),
        |_| json!("1970-01-01"),
    );
    let factory = Arc::new(
        NodeFactory::new()
            .with_id_generator(IdGenerator::isolated())
            .with_defaults(defaults),
    );
    let root_schema = schema(json!({
        "type": "object",
        "properties": {
            "born": {"type": "string", "format": "date"},
            "due": {"type": "string", "format": "date", "default": "2000-01-01"}
        }
    }));
    let mut tree = ValueTree::from_factory(&factory, &root_schema, &json!({})).unwrap();
    tree.set_value("born", json!("2020-05-05")).unwrap();
    tree.set_value("due", json!("2021-06-06")).unwrap();

    tree.set_value("born", Value::Null).unwrap();
    tree.set_value("due", Value::Null).unwrap();
    assert_eq!(tree.value_at("born"), Some(json!("1970-01-01")));
    assert_eq!(tree.value_at("due"), Some(json!("2000-01-01")));
    assert!(!tree.is_dirty());
}

#[test]
fn test_custom_build_rule_takes_precedence() {
    let factory = Arc::new(
        NodeFactory::new()
            .with_id_generator(IdGenerator::isolated())
            .register(
                "upper",
                |s| s.format.as_deref() == Some("upper"),
                |_factory, store, req| {
                    let text = req.value.and_then(Value::as_str).unwrap_or_default().to_uppercase();
                    let id = req.id.clone();
                    store.insert(ValueNode::primitive(
                        req.id,
                        req.name,
                        req.schema,
                        PrimitiveValue::String(text),
                    ))?;
                    Ok(id)
                },
            ),
    );
    let root_schema = schema(json!({
        "type": "object",
        "properties": {
            "code": {"type": "string", "format": "upper"},
            "label": {"type": "string"}
        }
    }));
    let tree = ValueTree::from_factory(&factory, &root_schema, &json!({"code": "ab", "label": "ab"})).unwrap();
    assert_eq!(tree.plain_value(), json!({"code": "AB", "label": "ab"}));
}

#[test]
fn test_read_only_rejects_external_writes() {
    let tree_schema = json!({
        "type": "object",
        "properties": {"id": {"type": "string", "readOnly": true}}
    });
    let mut tree = plain_tree(tree_schema, json!({"id": "fixed"}));
    assert!(matches!(tree.set_value("id", "other"), Err(TreeError::ReadOnly(_))));
    assert_eq!(tree.value_at("id"), Some(json!("fixed")));
}

#[test]
fn test_unknown_schema_type_is_an_error() {
    let result = ValueTree::from_factory(&factory(), &schema(json!({"type": "date"})), &json!(null));
    assert!(matches!(result, Err(TreeError::UnknownSchemaType(t)) if t == "date"));
}

// ── Validation ────────────────────────────────────────────────────────────

#[test]
fn test_validation_reports_rule_failures() {
    let tree_schema = json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string"},
            "age": {"type": "number", "minimum": 0, "maximum": 150},
            "code": {"type": "string", "pattern": "^[A-Z]{3}$", "maxLength": 3},
            "size": {"type": "string", "enum": ["s", "m", "l"]},
            "owner": {"type": "string", "foreignKey": "users"}
        }
    });
    let mut tree = plain_tree(
        tree_schema,
        json!({"name": "x", "age": 30, "code": "ABC", "size": "m", "owner": "u1"}),
    );
    assert!(tree.is_valid());

    tree.set_value("name", "").unwrap();
    tree.set_value("age", -1).unwrap();
    tree.set_value("code", "abcd").unwrap();
    tree.set_value("size", "xl").unwrap();
    tree.set_value("owner", "").unwrap();

    let errors = tree.all_errors();
    assert!(errors.iter().all(|e| e.severity == Severity::Error));
    let kinds: Vec<(&str, &str)> = errors.iter().map(|e| (e.path.as_str(), e.type_.as_str())).collect();
    assert_eq!(
        kinds,
        vec![
            ("name", "required"),
            ("age", "minimum"),
            ("code", "maxLength"),
            ("code", "pattern"),
            ("size", "enum"),
            ("owner", "foreignKey"),
        ]
    );
    assert_eq!(errors[1].params, Some(json!({"minimum": 0})));

    let grouped = tree.errors_by_path();
    assert_eq!(grouped["code"].len(), 2);
    assert!(!tree.is_valid());
    assert!(!tree.has_warnings());
}

// ── Change handlers ───────────────────────────────────────────────────────

#[test]
fn test_change_handlers_get_array_schema_for_array_ops() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let handlers = ChangeHandlerRegistry::new().with(
        "arrays",
        |s| s.schema_type() == "array",
        move |change, schema| {
            let items_type = schema.items.as_ref().map(|i| i.schema_type().to_string());
            sink.lock()
                .unwrap()
                .push(format!("{}:{}", change.kind(), items_type.unwrap_or_default()));
        },
    );
    let mut tree = inventory().with_change_handlers(handlers);
    tree.push_value("items", json!({})).unwrap();
    tree.set_value("name", "n").unwrap();
    tree.remove_at("items", 0).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["arrayPush:object".to_string(), "arrayRemove:object".to_string()]
    );
}

// ── Properties ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Edit {
    SetQty(usize, i64),
    SetName(String),
    Push(i64),
    Remove(usize),
    Move(usize, usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..6, -50i64..50).prop_map(|(i, q)| Edit::SetQty(i, q)),
        "[a-z]{0,6}".prop_map(Edit::SetName),
        (-50i64..50).prop_map(Edit::Push),
        (0usize..6).prop_map(Edit::Remove),
        (0usize..6, 0usize..6).prop_map(|(a, b)| Edit::Move(a, b)),
    ]
}

fn apply(tree: &mut ValueTree, edit: &Edit) {
    // Out-of-range edits fail and leave the tree untouched.
    let _ = match edit {
        Edit::SetQty(i, q) => tree.set_value(&format!("items[{i}].qty"), *q),
        Edit::SetName(name) => tree.set_value("name", name.as_str()),
        Edit::Push(q) => tree.push_value("items", json!({"sku": "p", "qty": q})).map(|_| ()),
        Edit::Remove(i) => tree.remove_at("items", *i),
        Edit::Move(from, to) => tree.move_item("items", *from, *to),
    };
}

proptest! {
    #[test]
    fn revert_restores_the_baseline(edits in prop::collection::vec(edit(), 0..24)) {
        let mut tree = inventory();
        let original = tree.plain_value();
        for edit in &edits {
            apply(&mut tree, edit);
        }
        tree.revert();
        prop_assert_eq!(tree.plain_value(), original);
        prop_assert!(!tree.is_dirty());
        prop_assert!(tree.changes().is_empty());
    }

    #[test]
    fn commit_makes_current_state_the_baseline(
        before in prop::collection::vec(edit(), 0..12),
        after in prop::collection::vec(edit(), 0..12),
    ) {
        let mut tree = inventory();
        for edit in &before {
            apply(&mut tree, edit);
        }
        tree.commit();
        prop_assert!(!tree.is_dirty());
        let committed = tree.plain_value();
        for edit in &after {
            apply(&mut tree, edit);
        }
        tree.revert();
        prop_assert_eq!(tree.plain_value(), committed);
    }

    #[test]
    fn cached_paths_match_fresh_paths(edits in prop::collection::vec(edit(), 0..16)) {
        let mut tree = inventory();
        // Warm the cache before editing.
        for id in tree.store().subtree(tree.root_id()) {
            let _ = tree.path_of(&id);
        }
        for edit in &edits {
            apply(&mut tree, edit);
        }
        for id in tree.store().subtree(tree.root_id()) {
            prop_assert_eq!(tree.path_of(&id), tree.store().path_of(&id));
        }
    }
}
