//! Readiness-driven emission.
//!
//! `schedule` linearizes one step greedily: it scans the pending nodes in
//! list order, emits the first ready one, propagates readiness along its
//! outgoing edges and restarts the scan from the top. Input and Output nodes
//! get a variable name and propagate but produce no code; legacy Parameter
//! nodes are dropped without propagating. A full scan that makes no progress
//! is a dependency cycle.

use super::ir::{Arg, Expr, Stmt};
use super::params::{invalid, list_items, map_entries};
use crate::core::error::{Error, Result};
use crate::core::graph::{Node, NodeIdx, NodeRole, Step};
use crate::core::types::{json_value_to_string, GeneratorConfig, Origin, Param, ParamType};
use serde_json::Value;
use std::collections::HashMap;

/// Emit every node of `step` in readiness order.
///
/// `base_name` gives the un-suffixed variable name of a node; repeats get
/// `_2`, `_3`, ... Names in `reserved` are taken before the first node, so a
/// node whose base matches one starts at `_2`. `visit` runs for every node
/// that produces code, after its variable name is assigned and before
/// readiness is propagated. Returns the emitted order, boundary nodes
/// included.
pub fn schedule<N, V>(
    step: &mut Step,
    reserved: &[&str],
    base_name: N,
    mut visit: V,
) -> Result<Vec<NodeIdx>>
where
    N: Fn(&Node) -> String,
    V: FnMut(&Step, NodeIdx) -> Result<()>,
{
    let mut remaining: Vec<NodeIdx> = (0..step.nodes.len()).collect();
    let mut counters: HashMap<String, usize> =
        reserved.iter().map(|name| (name.to_string(), 1)).collect();
    let mut order = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let mut progressed = false;
        let mut i = 0;
        while i < remaining.len() {
            let idx = remaining[i];
            let node = &step.nodes[idx];
            let role = node.role();

            if role == NodeRole::Parameter {
                tracing::debug!(step = %step.id, node = %node.id, "dropping legacy parameter node");
                remaining.remove(i);
                progressed = true;
                continue;
            }
            if !node.is_ready() {
                i += 1;
                continue;
            }

            let base = base_name(node);
            let count = counters.entry(base.clone()).or_insert(0);
            *count += 1;
            let var = match *count {
                1 => base,
                n => format!("{}_{}", base, n),
            };
            tracing::debug!(step = %step.id, node = %node.id, var = %var, "emitting node");
            step.nodes[idx].variable_name = Some(var);

            remaining.remove(i);
            order.push(idx);
            progressed = true;

            if role.is_boundary() {
                step.propagate_from(idx);
                continue;
            }
            visit(&*step, idx)?;
            step.propagate_from(idx);
            break;
        }

        if !progressed {
            if let Some(err) = parameter_fed(step, &remaining) {
                return Err(err);
            }
            return Err(Error::DependencyCycle {
                step: step.id.clone(),
                nodes: remaining.iter().map(|&i| step.nodes[i].id.clone()).collect(),
            });
        }
    }
    Ok(order)
}

/// A stalled node waiting on a legacy Parameter node, which never becomes
/// ready.
fn parameter_fed(step: &Step, remaining: &[NodeIdx]) -> Option<Error> {
    remaining.iter().find_map(|&i| {
        let node = &step.nodes[i];
        node.dependencies
            .iter()
            .find(|dep| step.nodes[dep.source].role() == NodeRole::Parameter)
            .map(|dep| Error::ParameterFed {
                step: step.id.clone(),
                node: node.id.clone(),
                source_node: step.nodes[dep.source].id.clone(),
            })
    })
}

/// Locals of a generated `__init__` that node variables must not shadow.
pub const STEP_RESERVED: &[&str] = &["self"];

/// Local holding the root orchestrator inside `main()`.
pub const MAIN_ROOT: &str = "root";

/// Variable base of a node inside a step: its kind, snake-cased.
pub fn kind_var_name(node: &Node) -> String {
    node.kind.replace(' ', "_").to_lowercase()
}

/// Statements for one emitted node: optional description comment, the
/// constructor call and its registration with the step's orchestrator.
pub fn node_statements(step: &Step, idx: NodeIdx, config: &GeneratorConfig) -> Result<Vec<Stmt>> {
    let node = &step.nodes[idx];
    if node.is_stub() {
        return Ok(vec![Stmt::Comment(format!("{} not implemented yet", node.kind))]);
    }

    let var = node.variable_name.clone().unwrap_or_default();
    let mut stmts = Vec::new();
    if let Some(description) = node.description() {
        stmts.push(Stmt::Comment(description));
    }

    let mut args = Vec::new();
    let origin_param = match node.origin() {
        Some(Origin::Parameter(label)) => Some(label.as_str()),
        _ => None,
    };
    for (label, param) in &node.params {
        if let Some(loader_label) = &param.indirection {
            let address = format!("{}.{}", step.name, loader_label);
            let load = Expr::name(&config.param_loader)
                .method("load", vec![Arg::Positional(Expr::Str(address))]);
            args.push(Arg::keyword(label, load));
            continue;
        }
        if label == "description"
            || param.param_type == ParamType::Description
            || Some(label.as_str()) == origin_param
        {
            continue;
        }
        args.push(Arg::keyword(label, param_literal(node, &step.id, label, param)?));
    }
    args.extend(dependency_args(step, node));

    stmts.push(Stmt::assign(
        var.clone(),
        Expr::name(&node.origin_label).call(args),
    ));
    stmts.push(Stmt::Expr(
        Expr::name("self")
            .attr("orchestrator")
            .method("add", vec![Arg::Positional(Expr::Name(var))]),
    ));
    Ok(stmts)
}

/// One keyword argument per incoming edge, in declared order.
fn dependency_args(step: &Step, node: &Node) -> Vec<Arg> {
    node.dependencies
        .iter()
        .map(|dep| {
            let source = &step.nodes[dep.source];
            let value = match source.role() {
                NodeRole::Input => input_step(&source.param_string("key")),
                _ => Expr::Tuple(vec![
                    Expr::name(source.variable_name.clone().unwrap_or_default()),
                    Expr::str(&dep.source_port),
                ]),
            };
            Arg::keyword(&dep.target_port, value)
        })
        .collect()
}

fn input_step(key: &str) -> Expr {
    Expr::name("self").method("_get_input_step", vec![Arg::Positional(Expr::str(key))])
}

/// Type-directed literal for a parameter value.
pub fn param_literal(node: &Node, step: &str, label: &str, param: &Param) -> Result<Expr> {
    let value = &param.value;
    let expr = match &param.param_type {
        ParamType::String
        | ParamType::Option
        | ParamType::OptionOfOptions
        | ParamType::Description => Expr::Str(json_value_to_string(value)),
        ParamType::Number => match value {
            Value::Null => Expr::literal("None"),
            v => Expr::Literal(json_value_to_string(v)),
        },
        ParamType::Boolean => match value {
            Value::Null => Expr::literal("None"),
            v => Expr::Literal(json_value_to_string(v).to_lowercase()),
        },
        ParamType::List => Expr::List(
            list_items(value)
                .map_err(|reason| invalid(node, step, label, reason))?
                .into_iter()
                .map(|v| Expr::Str(json_value_to_string(v)))
                .collect(),
        ),
        ParamType::Map => Expr::Dict(
            map_entries(value)
                .map_err(|reason| invalid(node, step, label, reason))?
                .into_iter()
                .map(|(k, v)| (Expr::Str(k), Expr::Str(json_value_to_string(v))))
                .collect(),
        ),
        ParamType::Unknown(tag) => {
            return Err(Error::UnknownParamType {
                step: step.to_string(),
                node: node.id.clone(),
                param: label.to_string(),
                param_type: tag.clone(),
            })
        }
    };
    Ok(expr)
}

/// `_set_output` registrations for every Output node of the step.
pub fn output_statements(step: &Step) -> Result<Vec<Stmt>> {
    let mut stmts = Vec::new();
    for node in step.nodes.iter().filter(|n| n.role() == NodeRole::Output) {
        let dep = node.dependencies.first().ok_or_else(|| Error::DanglingOutput {
            step: step.id.clone(),
            node: node.id.clone(),
        })?;
        let producer = &step.nodes[dep.source];
        let value = match producer.role() {
            NodeRole::Input => input_step(&producer.param_string("key")),
            _ => Expr::name("self").attr("orchestrator").method(
                "get_step_output",
                vec![
                    Arg::Positional(Expr::str(producer.variable_name.clone().unwrap_or_default())),
                    Arg::Positional(Expr::str(&dep.source_port)),
                ],
            ),
        };
        stmts.push(Stmt::Expr(Expr::name("self").method(
            "_set_output",
            vec![
                Arg::Positional(Expr::Str(node.param_string("key"))),
                Arg::Positional(value),
            ],
        )));
    }
    Ok(stmts)
}

/// Step instantiation in the main module: `var = Class(input = (src, 'key'))`
/// followed by `root.add(var)`. Authored parameters are not passed.
pub fn proxy_statements(root: &Step, idx: NodeIdx, class_name: &str) -> Vec<Stmt> {
    let node = &root.nodes[idx];
    let var = node.variable_name.clone().unwrap_or_default();
    vec![
        Stmt::assign(
            var.clone(),
            Expr::name(class_name).call(dependency_args(root, node)),
        ),
        Stmt::Expr(Expr::name(MAIN_ROOT).method("add", vec![Arg::Positional(Expr::Name(var))])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::render::Renderer;
    use crate::core::graph::Pipeline;
    use crate::core::loader::tests::{load, TWO_STEPS};

    fn render(stmts: &[Stmt]) -> String {
        let r = Renderer::new(&GeneratorConfig::default());
        let mut out = String::new();
        for s in stmts {
            r.stmt(s, 0, &mut out);
        }
        out
    }

    fn emit_step(p: &mut Pipeline, id: &str) -> Result<(Vec<NodeIdx>, String)> {
        let config = GeneratorConfig::default();
        let step = p.get_step_mut(id)?;
        let mut stmts = Vec::new();
        let order = schedule(step, STEP_RESERVED, kind_var_name, |s, idx| {
            stmts.extend(node_statements(s, idx, &config)?);
            Ok(())
        })?;
        stmts.extend(output_statements(step)?);
        Ok((order, render(&stmts)))
    }

    #[test]
    fn test_input_double_output() {
        let mut p = load(TWO_STEPS).unwrap();
        let (order, text) = emit_step(&mut p, "scale").unwrap();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(
            text,
            "double = Double(value = self._get_input_step('x'))\n\
             self.orchestrator.add(double)\n\
             self._set_output('y', self.orchestrator.get_step_output('double', 'out'))\n"
        );
    }

    #[test]
    fn test_chain_order_and_reference() {
        let mut p = load(TWO_STEPS).unwrap();
        let (_, text) = emit_step(&mut p, "prep").unwrap();
        assert!(text.starts_with("load = CSVLoader(path = 'data.csv', header = true)\n"));
        assert!(text.contains("get_step_output('load', 'out')"));
    }

    const CHAIN: &str = r#"{
        "s": {
            "nodes": [
                {"id": "b", "kind": "Double", "params": {
                    "description": {"type": "description", "value": "second"}
                }},
                {"id": "a", "kind": "Double", "params": {}},
                {"id": "legacy", "kind": "Parameter", "params": {}}
            ],
            "connections": [
                {"source": "a", "target": "b", "sourceOutput": "out", "targetInput": "value"}
            ]
        },
        "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}], "connections": []}
    }"#;

    #[test]
    fn test_upstream_first_and_dedupe() {
        let mut p = load(CHAIN).unwrap();
        let (order, text) = emit_step(&mut p, "s").unwrap();
        assert_eq!(order, vec![1, 0]);
        let step = p.get_step("s").unwrap();
        assert_eq!(step.nodes[1].variable_name.as_deref(), Some("double"));
        assert_eq!(step.nodes[0].variable_name.as_deref(), Some("double_2"));
        assert!(step.nodes[2].variable_name.is_none());
        assert!(text.contains("# second\ndouble_2 = Double(value = (double, 'out'))\n"));
    }

    #[test]
    fn test_three_node_cycle() {
        let json = r#"{
            "s": {
                "nodes": [
                    {"id": "a", "kind": "Double", "params": {}},
                    {"id": "b", "kind": "Double", "params": {}},
                    {"id": "c", "kind": "Double", "params": {}}
                ],
                "connections": [
                    {"source": "a", "target": "b", "sourceOutput": "out", "targetInput": "value"},
                    {"source": "b", "target": "c", "sourceOutput": "out", "targetInput": "value"},
                    {"source": "c", "target": "a", "sourceOutput": "out", "targetInput": "value"}
                ]
            },
            "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}], "connections": []}
        }"#;
        let mut p = load(json).unwrap();
        let err = emit_step(&mut p, "s").unwrap_err();
        match err {
            Error::DependencyCycle { step, nodes } => {
                assert_eq!(step, "s");
                assert_eq!(nodes, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {}", other),
        }
    }

    #[test]
    fn test_parameter_fed_node_names_source() {
        let json = r#"{
            "s": {
                "nodes": [
                    {"id": "legacy", "kind": "Parameter", "params": {}},
                    {"id": "m", "kind": "Double", "params": {}}
                ],
                "connections": [
                    {"source": "legacy", "target": "m", "sourceOutput": "out", "targetInput": "value"}
                ]
            },
            "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}], "connections": []}
        }"#;
        let mut p = load(json).unwrap();
        let err = emit_step(&mut p, "s").unwrap_err();
        match &err {
            Error::ParameterFed { step, node, source_node } => {
                assert_eq!(step, "s");
                assert_eq!(node, "m");
                assert_eq!(source_node, "legacy");
            }
            other => panic!("expected parameter-fed error, got {}", other),
        }
        assert!(err.to_string().contains("legacy Parameter node 'legacy'"));
    }

    #[test]
    fn test_reserved_names_are_suffixed() {
        let json = r#"{
            "s": {"nodes": [{"id": "x", "kind": "Self", "params": {}}]},
            "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}]}
        }"#;
        let mut p = load(json).unwrap();
        emit_step(&mut p, "s").unwrap();
        assert_eq!(
            p.get_step("s").unwrap().nodes[0].variable_name.as_deref(),
            Some("self_2")
        );
    }

    #[test]
    fn test_origin_parameter_names_callee() {
        use crate::core::registry::TemplateRegistry;
        use crate::core::types::{GraphDocument, TemplateFeed};

        let feed: TemplateFeed = serde_json::from_str(
            r#"[{
                "name": "Model",
                "parameters": [
                    {"label": "model_type", "type": "option"},
                    {"label": "alpha", "type": "number"}
                ],
                "module_dependencies": {
                    "models": {"cls": {"tag": "parameter", "value": "model_type"}}
                },
                "origin": {"parameter": "model_type"}
            }]"#,
        )
        .unwrap();
        let registry = TemplateRegistry::load(&feed.into_records()).unwrap();
        let doc: GraphDocument = serde_json::from_str(
            r#"{
                "s": {"nodes": [{"id": "m", "kind": "Model", "params": {
                    "model_type": {"type": "option", "value": "Lasso"},
                    "alpha": {"type": "number", "value": 0.1}
                }}]},
                "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}]}
            }"#,
        )
        .unwrap();
        let mut p = crate::core::loader::load_pipeline(&doc, &registry).unwrap();
        let (_, text) = emit_step(&mut p, "s").unwrap();
        assert_eq!(text, "model = Lasso(alpha = 0.1)
self.orchestrator.add(model)
");
        assert!(!text.contains("model_type"));
    }

    #[test]
    fn test_stub_placeholder() {
        let json = r#"{
            "s": {"nodes": [{"id": "m", "kind": "Mystery Box", "params": {}}], "connections": []},
            "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}], "connections": []}
        }"#;
        let mut p = load(json).unwrap();
        let (_, text) = emit_step(&mut p, "s").unwrap();
        assert_eq!(text, "# Mystery Box not implemented yet\n");
        assert_eq!(
            p.get_step("s").unwrap().nodes[0].variable_name.as_deref(),
            Some("mystery_box")
        );
    }

    #[test]
    fn test_indirected_param_uses_loader() {
        let json = TWO_STEPS.replace(
            r#""path": {"type": "string", "value": "data.csv"}"#,
            r#""path": {"type": "string", "value": "data.csv", "indirection": {"label": "source"}}"#,
        );
        let mut p = load(&json).unwrap();
        let (_, text) = emit_step(&mut p, "prep").unwrap();
        assert!(text.contains("path = ParamLoader.load('data_prep.source')"));
        assert!(!text.contains("data.csv"));
    }

    #[test]
    fn test_dangling_output() {
        let json = r#"{
            "s": {"nodes": [{"id": "o", "kind": "Output", "params": {"key": {"type": "string", "value": "y"}}}]},
            "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}]}
        }"#;
        let mut p = load(json).unwrap();
        assert!(matches!(
            emit_step(&mut p, "s"),
            Err(Error::DanglingOutput { ref node, .. }) if node == "o"
        ));
    }

    #[test]
    fn test_output_reading_input_directly() {
        let json = r#"{
            "s": {
                "nodes": [
                    {"id": "i", "kind": "Input", "params": {"key": {"type": "string", "value": "x"}}},
                    {"id": "o", "kind": "Output", "params": {"key": {"type": "string", "value": "y"}}}
                ],
                "connections": [{"source": "i", "target": "o", "sourceOutput": "out", "targetInput": "in"}]
            },
            "root": {"nodes": [{"id": "s", "kind": "Step", "params": {}}]}
        }"#;
        let mut p = load(json).unwrap();
        let (_, text) = emit_step(&mut p, "s").unwrap();
        assert_eq!(text, "self._set_output('y', self._get_input_step('x'))\n");
    }

    fn node_with(ty: &str, value: Value) -> (Node, Param) {
        let mut node = Node::stub("T");
        node.id = "n".to_string();
        let param = Param {
            value,
            param_type: ParamType::from(ty.to_string()),
            indirection: None,
        };
        (node, param)
    }

    #[test]
    fn test_param_literals() {
        let r = Renderer::new(&GeneratorConfig::default());
        let cases = [
            ("string", serde_json::json!("a'b"), r"'a\'b'"),
            ("option", serde_json::json!("Lasso"), "'Lasso'"),
            ("number", serde_json::json!("0.25"), "0.25"),
            ("number", serde_json::json!(3), "3"),
            ("boolean", serde_json::json!("True"), "true"),
            ("boolean", serde_json::json!(false), "false"),
            ("list", serde_json::json!([]), "[]"),
            ("map", serde_json::json!([]), "{}"),
        ];
        for (ty, value, expected) in cases {
            let (node, param) = node_with(ty, value);
            let expr = param_literal(&node, "s", "p", &param).unwrap();
            assert_eq!(r.expr(&expr, 0, 0), expected, "type {}", ty);
        }

        let (node, param) = node_with(
            "map",
            serde_json::json!([{"key": "a", "value": 1}, {"key": "b", "value": "x"}]),
        );
        let expr = param_literal(&node, "s", "p", &param).unwrap();
        assert_eq!(r.expr(&expr, 0, 0), "{\n    'a': '1',\n    'b': 'x',\n}");
    }

    #[test]
    fn test_unknown_param_type_fails() {
        let (node, param) = node_with("rgba", serde_json::json!("red"));
        let err = param_literal(&node, "s", "tint", &param).unwrap_err();
        assert!(matches!(err, Error::UnknownParamType { ref param_type, .. } if param_type == "rgba"));
    }

    #[test]
    fn test_main_proxy_order() {
        let mut p = load(TWO_STEPS).unwrap();
        let names: HashMap<String, String> = p
            .steps
            .values()
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect();
        let root = p.get_step_mut(crate::core::graph::ROOT_STEP).unwrap();
        let mut stmts = Vec::new();
        let order = schedule(root, &[MAIN_ROOT], |n| names[&n.id].clone(), |r, idx| {
            stmts.extend(proxy_statements(r, idx, "Cls"));
            Ok(())
        })
        .unwrap();
        assert_eq!(order, vec![1, 0]);
        let text = render(&stmts);
        assert_eq!(
            text,
            "data_prep = Cls()\nroot.add(data_prep)\n\
             scale_data = Cls(x = (data_prep, 'data'))\nroot.add(scale_data)\n"
        );
    }
}
