//! Correspondence-graph export.
//!
//! The finalized generator is handed to code emission as a JSON document;
//! key order follows declaration order (`preserve_order`).
use serde_json::{json, Map, Value};

use crate::field::{FieldArena, FieldId};
use crate::generator::{Function, Generator};
use crate::options::{Depth, MatchMethod};

pub fn graph_to_json(generator: &Generator) -> Value {
    json!({
        "custom": generator.custom,
        "functions": generator.functions.iter().map(function_to_json).collect::<Vec<_>>(),
    })
}

fn function_to_json(function: &Function) -> Value {
    let arena = &function.arena;
    let tree = |roots: &[FieldId]| roots.iter().map(|&r| field_to_json(arena, r)).collect::<Vec<_>>();
    let pairs = function
        .matched_pairs()
        .into_iter()
        .map(|(to, from)| {
            json!({
                "to": arena.path(to),
                "from": arena.path(from),
                "convert": arena[to].options.convert,
                "cast": arena[to].options.cast,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "name": function.name,
        "manual": function.manual,
        "custom": function.custom,
        "rules": function.rules.iter().map(|r| r.text.as_str()).collect::<Vec<_>>(),
        "to": tree(&function.to),
        "from": tree(&function.from),
        "pairs": pairs,
    })
}

fn field_to_json(arena: &FieldArena, id: FieldId) -> Value {
    let field = &arena[id];
    let mut o = Map::new();
    o.insert("name".into(), json!(field.name));
    if field.is_root() {
        o.insert("variable".into(), json!(field.variable));
    }
    o.insert("path".into(), json!(arena.path(id)));
    o.insert("type".into(), json!(field.signature.to_string()));
    if field.signature.is_contract() {
        o.insert("contract".into(), json!(true));
    }
    if let Some(original) = arena.alias_of(id) {
        o.insert("alias_of".into(), json!(arena.path(original)));
    }
    if let Some(to) = field.matched_to {
        o.insert("matched_to".into(), json!(arena.path(to)));
    }
    if let Some(from) = field.matched_from {
        o.insert("matched_from".into(), json!(arena.path(from)));
    }

    // ---- options ----
    let opts = &field.options;
    let mut options = Map::new();
    match &opts.method {
        Some(MatchMethod::Automatch) => {
            options.insert("automatch".into(), json!(true));
        }
        Some(MatchMethod::Map(target)) => {
            options.insert("map".into(), json!(target));
        }
        Some(MatchMethod::Tag { key, value }) => {
            options.insert("tag".into(), json!({ "key": key, "value": value }));
        }
        None => {}
    }
    if let Some(convert) = &opts.convert {
        options.insert("convert".into(), json!(convert));
    }
    if let Some(cast) = &opts.cast {
        options.insert("cast".into(), json!(cast));
    }
    if opts.deepcopy {
        options.insert("deepcopy".into(), json!(true));
    }
    match opts.depth {
        Some(Depth::Limited(n)) => {
            options.insert("depth".into(), json!(n));
        }
        Some(Depth::Unlimited) | None => {}
    }
    if !opts.custom.is_empty() {
        options.insert("custom".into(), json!(opts.custom));
    }
    if !options.is_empty() {
        o.insert("options".into(), Value::Object(options));
    }

    if !field.children.is_empty() {
        let children = field.children.iter().map(|&c| field_to_json(arena, c)).collect();
        o.insert("children".into(), Value::Array(children));
    }
    Value::Object(o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::Setup;
    use pretty_assertions::assert_eq;

    #[test]
    fn exports_pruned_trees_and_pairs() {
        let setup = Setup::from_yaml_str(
            r#"
types:
  - { namespace: a, name: T, kind: struct, members: [ { name: ID, type: int }, { name: Skip, type: bool } ] }
  - { namespace: b, name: T, kind: struct, members: [ { name: ID, type: int } ] }
contracts:
  - name: Copygen
    options: [ "license MIT", "license BSD" ]
    functions:
      - name: AToB
        options: [ "deepcopy .*" ]
        params: [ { name: x, type: "*a.T", options: [ "skipnil x" ] } ]
        results: [ { name: y, type: "*b.T" } ]
"#,
        )
        .unwrap();
        let generator = Generator::run(&setup, &setup.catalog()).unwrap();
        let value = graph_to_json(&generator);

        assert_eq!(value["custom"], json!({ "license": ["MIT", "BSD"] }));
        let f = &value["functions"][0];
        assert_eq!(f["name"], "AToB");
        assert_eq!(f["pairs"], json!([{ "to": "b.T.ID", "from": "a.T.ID", "convert": null, "cast": null }]));
        assert_eq!(f["from"][0]["variable"], "x");
        assert_eq!(f["from"][0]["options"]["custom"], json!({ "skipnil": ["x"] }));
        assert_eq!(f["custom"], json!({}));
        assert_eq!(f["from"][0]["children"].as_array().map(Vec::len), Some(1));
        assert_eq!(f["to"][0]["children"][0]["matched_from"], "a.T.ID");
        assert_eq!(f["to"][0]["children"][0]["options"]["deepcopy"], true);
    }
}
