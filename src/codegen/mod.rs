//! Code generation: one module per step plus `main`, and the parameter
//! table the generated code loads its indirected values from.

pub mod digest;
pub mod emit;
pub mod imports;
pub mod ir;
pub mod params;
pub mod render;

use crate::core::error::{Error, Result};
use crate::core::graph::{Node, Pipeline, ROOT_STEP};
use crate::core::types::GeneratorConfig;
use emit::{
    kind_var_name, node_statements, output_statements, proxy_statements, schedule, MAIN_ROOT,
    STEP_RESERVED,
};
use indexmap::IndexMap;
use ir::{Arg, ClassDef, Expr, FunctionDef, Import, Module, Stmt};
use params::ParamTable;
use render::Renderer;
use serde::Serialize;
use std::collections::HashMap;

/// Name of the entry-point module.
pub const MAIN_MODULE: &str = "main";

/// One entry of an emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedNode {
    pub id: String,
    pub kind: String,
    pub variable: String,
}

/// Everything one generation run produces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedPackage {
    /// module name → source text
    pub modules: IndexMap<String, String>,

    /// step name → loader label → value
    pub params: ParamTable,

    /// module name → nodes in the order they were emitted
    #[serde(skip)]
    pub order: IndexMap<String, Vec<EmittedNode>>,
}

impl GeneratedPackage {
    /// module name → `blake3:` digest of its text
    pub fn module_digests(&self) -> IndexMap<String, String> {
        self.modules
            .iter()
            .map(|(name, text)| (name.clone(), digest::text_digest(text)))
            .collect()
    }

    /// Digest over every module, in generation order.
    pub fn digest(&self) -> String {
        digest::package_digest(self.modules.iter().map(|(n, t)| (n.as_str(), t.as_str())))
    }
}

/// Drives emission over a loaded pipeline.
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    config: GeneratorConfig,
}

impl CodeGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate every step module, then `main`, then the parameter table.
    ///
    /// Emission mutates variable names and readiness on the pipeline, so a
    /// pipeline is generated once.
    pub fn generate(&self, pipeline: &mut Pipeline) -> Result<GeneratedPackage> {
        let mut package = GeneratedPackage::default();

        for id in pipeline.step_ids() {
            let (name, text, order) = self.generate_step(pipeline, &id)?;
            insert_module(&mut package, name, text, order)?;
        }
        let (text, order) = self.generate_main(pipeline)?;
        insert_module(&mut package, MAIN_MODULE.to_string(), text, order)?;

        package.params = params::build_param_table(pipeline)?;

        tracing::info!(
            modules = package.modules.len(),
            param_steps = package.params.len(),
            "generation complete"
        );
        Ok(package)
    }

    /// Module for one step: `(module name, text, emission order)`.
    pub fn generate_step(
        &self,
        pipeline: &mut Pipeline,
        id: &str,
    ) -> Result<(String, String, Vec<EmittedNode>)> {
        let config = &self.config;
        let step = pipeline.get_step_mut(id)?;

        let mut blocks: Vec<Vec<Stmt>> = Vec::new();
        let order = schedule(step, STEP_RESERVED, kind_var_name, |s, idx| {
            blocks.push(node_statements(s, idx, config)?);
            Ok(())
        })?;

        let mut init = vec![
            Stmt::Expr(
                Expr::name("super")
                    .call(vec![])
                    .method("__init__", vec![Arg::Splat("kwargs".to_string())]),
            ),
            Stmt::assign(
                "self.orchestrator",
                Expr::name(&config.orchestrator_class).call(vec![]),
            ),
        ];
        for block in blocks {
            init.push(Stmt::Blank);
            init.extend(block);
        }

        let mut execute = vec![Stmt::Expr(
            Expr::name("self")
                .attr("orchestrator")
                .method("execute", vec![]),
        )];
        execute.extend(output_statements(step)?);

        let module = Module {
            docstring: Some(format!("{}.py", step.name)),
            imports: imports::step_imports(step, config),
            body: vec![Stmt::Class(ClassDef {
                name: step.class_name.clone(),
                bases: vec![config.step_class.clone()],
                methods: vec![
                    FunctionDef {
                        name: "__init__".to_string(),
                        params: vec!["self".to_string(), "**kwargs".to_string()],
                        body: init,
                    },
                    FunctionDef {
                        name: "execute".to_string(),
                        params: vec!["self".to_string()],
                        body: execute,
                    },
                ],
            })],
        };

        let emitted = order
            .iter()
            .map(|&i| emitted_node(&step.nodes[i]))
            .collect::<Vec<_>>();
        tracing::info!(step = %step.id, module = %step.name, nodes = emitted.len(), "generated step module");
        Ok((
            step.name.clone(),
            Renderer::new(config).module(&module),
            emitted,
        ))
    }

    /// The entry-point module: instantiate every step in readiness order on a
    /// root orchestrator and run it.
    pub fn generate_main(&self, pipeline: &mut Pipeline) -> Result<(String, Vec<EmittedNode>)> {
        let config = &self.config;
        let mut names: HashMap<String, (String, String)> = HashMap::new();
        let mut imports = vec![Import {
            module: format!("{}.{}", config.library, config.orchestration_module),
            symbols: vec![config.orchestrator_class.clone()],
        }];
        for id in pipeline.step_ids() {
            let step = pipeline.get_step(&id)?;
            imports.push(Import {
                module: step.name.clone(),
                symbols: vec![step.class_name.clone()],
            });
            names.insert(id, (step.name.clone(), step.class_name.clone()));
        }

        let root = pipeline.get_step_mut(ROOT_STEP)?;
        let mut body = vec![Stmt::assign(
            MAIN_ROOT,
            Expr::name(&config.orchestrator_class).call(vec![]),
        )];
        let order = schedule(
            root,
            &[MAIN_ROOT],
            |n| names.get(&n.id).map(|(name, _)| name.clone()).unwrap_or_default(),
            |r, idx| {
                let class = names
                    .get(&r.nodes[idx].id)
                    .map(|(_, class)| class.as_str())
                    .ok_or_else(|| Error::StepNotFound(r.nodes[idx].id.clone()))?;
                body.push(Stmt::Blank);
                body.extend(proxy_statements(r, idx, class));
                Ok(())
            },
        )?;
        body.push(Stmt::Blank);
        body.push(Stmt::Expr(Expr::name(MAIN_ROOT).method("execute", vec![])));

        let module = Module {
            docstring: None,
            imports,
            body: vec![
                Stmt::Def(FunctionDef {
                    name: "main".to_string(),
                    params: vec![],
                    body,
                }),
                Stmt::Blank,
                Stmt::If {
                    cond: Expr::Eq(
                        Box::new(Expr::name("__name__")),
                        Box::new(Expr::str("__main__")),
                    ),
                    body: vec![Stmt::Expr(Expr::name("main").call(vec![]))],
                },
            ],
        };

        let emitted = order.iter().map(|&i| emitted_node(&root.nodes[i])).collect();
        Ok((Renderer::new(config).module(&module), emitted))
    }
}

fn emitted_node(node: &Node) -> EmittedNode {
    EmittedNode {
        id: node.id.clone(),
        kind: node.kind.clone(),
        variable: node.variable_name.clone().unwrap_or_default(),
    }
}

fn insert_module(
    package: &mut GeneratedPackage,
    name: String,
    text: String,
    order: Vec<EmittedNode>,
) -> Result<()> {
    if package.modules.contains_key(&name) {
        return Err(Error::MalformedGraph(format!(
            "more than one module would be named '{}'",
            name
        )));
    }
    package.order.insert(name.clone(), order);
    package.modules.insert(name, text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::tests::{load, TWO_STEPS};

    fn generate(json: &str) -> Result<GeneratedPackage> {
        let mut p = load(json)?;
        CodeGenerator::default().generate(&mut p)
    }

    #[test]
    fn test_step_module_text() {
        let package = generate(TWO_STEPS).unwrap();
        assert_eq!(
            package.modules["data_prep"],
            "\"\"\" data_prep.py \"\"\"\n\
             \n\
             from mls_lib.data import CSVLoader\n\
             from mls_lib.orchestration import Orchestrator, Step\n\
             \n\
             class DataPrep(Step):\n\
             \x20   def __init__(self, **kwargs):\n\
             \x20       super().__init__(**kwargs)\n\
             \x20       self.orchestrator = Orchestrator()\n\
             \n\
             \x20       load = CSVLoader(path = 'data.csv', header = true)\n\
             \x20       self.orchestrator.add(load)\n\
             \n\
             \x20   def execute(self):\n\
             \x20       self.orchestrator.execute()\n\
             \x20       self._set_output('data', self.orchestrator.get_step_output('load', 'out'))\n"
        );
    }

    #[test]
    fn test_main_module_text() {
        let package = generate(TWO_STEPS).unwrap();
        assert_eq!(
            package.modules[MAIN_MODULE],
            "from mls_lib.orchestration import Orchestrator\n\
             from scale_data import ScaleData\n\
             from data_prep import DataPrep\n\
             \n\
             def main():\n\
             \x20   root = Orchestrator()\n\
             \n\
             \x20   data_prep = DataPrep()\n\
             \x20   root.add(data_prep)\n\
             \n\
             \x20   scale_data = ScaleData(x = (data_prep, 'data'))\n\
             \x20   root.add(scale_data)\n\
             \n\
             \x20   root.execute()\n\
             \n\
             if __name__ == '__main__':\n\
             \x20   main()\n"
        );
    }

    #[test]
    fn test_module_order_and_emission_order() {
        let package = generate(TWO_STEPS).unwrap();
        let names: Vec<&str> = package.modules.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["scale_data", "data_prep", "main"]);
        let main: Vec<&str> = package.order[MAIN_MODULE]
            .iter()
            .map(|e| e.variable.as_str())
            .collect();
        assert_eq!(main, vec!["data_prep", "scale_data"]);
        assert_eq!(package.order["scale_data"][0].variable, "input");
    }

    #[test]
    fn test_params_and_digests() {
        let json = TWO_STEPS.replace(
            r#""path": {"type": "string", "value": "data.csv"}"#,
            r#""path": {"type": "string", "value": "data.csv", "indirection": true}"#,
        );
        let package = generate(&json).unwrap();
        assert_eq!(package.params["data_prep"]["path"], serde_json::json!("data.csv"));
        assert!(package.modules["data_prep"].contains("ParamLoader.load('data_prep.path')"));
        assert!(package.modules["data_prep"].contains("import Orchestrator, ParamLoader, Step"));

        let digests = package.module_digests();
        assert_eq!(digests.len(), 3);
        assert!(digests.values().all(|d| d.starts_with("blake3:")));
        assert_eq!(package.digest(), generate(&json).unwrap().digest());
        assert_ne!(package.digest(), generate(TWO_STEPS).unwrap().digest());
    }

    #[test]
    fn test_serialized_shape() {
        let package = generate(TWO_STEPS).unwrap();
        let value = serde_json::to_value(&package).unwrap();
        assert!(value["modules"]["main"].is_string());
        assert!(value["params"].as_object().unwrap().is_empty());
        assert!(value.get("order").is_none());
    }

    #[test]
    fn test_duplicate_module_names() {
        let json = TWO_STEPS.replace("\"Scale Data\"", "\"Data Prep\"");
        let err = generate(&json).unwrap_err();
        assert!(err.to_string().contains("data_prep"));
    }

    #[test]
    fn test_step_named_root_keeps_orchestrator() {
        let json = TWO_STEPS.replace("\"Data-Prep\"", "\"Root\"");
        let package = generate(&json).unwrap();
        let main = &package.modules[MAIN_MODULE];
        assert!(main.contains("    root = Orchestrator()\n"));
        assert!(main.contains("    root_2 = Root()\n    root.add(root_2)\n"));
        assert!(main.contains("ScaleData(x = (root_2, 'data'))"));
        assert!(!main.contains("root = Root()"));
        assert_eq!(package.order[MAIN_MODULE][0].variable, "root_2");
    }

    #[test]
    fn test_custom_library_root() {
        let mut p = load(TWO_STEPS).unwrap();
        let config = GeneratorConfig {
            library: "acme_ml".to_string(),
            ..GeneratorConfig::default()
        };
        let package = CodeGenerator::new(config).generate(&mut p).unwrap();
        assert!(package.modules["main"].starts_with("from acme_ml.orchestration import Orchestrator\n"));
        assert!(package.modules["scale_data"].contains("from acme_ml.math import Double\n"));
    }
}
