//! Per-step import aggregation.

use super::ir::Import;
use crate::core::graph::Step;
use crate::core::types::GeneratorConfig;
use std::collections::{BTreeMap, BTreeSet};

/// Union of every node's import contribution plus the orchestration symbols,
/// one sorted import per module.
pub fn step_imports(step: &Step, config: &GeneratorConfig) -> Vec<Import> {
    let mut modules: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for node in &step.nodes {
        for (module, symbols) in node.module_symbols() {
            modules.entry(module).or_default().extend(symbols);
        }
    }

    let core = modules
        .entry(config.orchestration_module.clone())
        .or_default();
    core.insert(config.orchestrator_class.clone());
    core.insert(config.step_class.clone());

    if step.nodes.iter().any(|n| n.indirect_param_count() > 0) {
        modules
            .entry(config.orchestration_module.clone())
            .or_default()
            .insert(config.param_loader.clone());
    }

    to_imports(&config.library, modules)
}

/// Turn `module → symbols` into import statements under the library root.
pub fn to_imports(library: &str, modules: BTreeMap<String, BTreeSet<String>>) -> Vec<Import> {
    modules
        .into_iter()
        .filter(|(_, symbols)| !symbols.is_empty())
        .map(|(module, symbols)| Import {
            module: format!("{}.{}", library, module),
            symbols: symbols.into_iter().collect(),
        })
        .collect()
}
