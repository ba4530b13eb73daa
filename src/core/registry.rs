//! Node template registry.
//!
//! Templates are immutable and shared behind `Arc`; every node instance gets
//! its own copy of the mutable parts (parameters, edges, readiness).

use super::error::{Error, Result};
use super::graph::Node;
use super::types::{Origin, ParamType, PortDecl, SymbolSource, TemplateRecord};
use indexmap::IndexMap;
use std::sync::Arc;

/// A reusable node prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
    pub name: String,

    /// Declared parameters in authoring order
    pub params: IndexMap<String, ParamType>,

    pub inputs: Vec<PortDecl>,
    pub outputs: Vec<PortDecl>,

    /// module → symbol sources
    pub module_dependencies: IndexMap<String, Vec<SymbolSource>>,

    pub origin: Option<Origin>,
}

impl NodeTemplate {
    pub fn from_record(record: &TemplateRecord) -> Self {
        Self {
            name: record.name.clone(),
            params: record
                .parameters
                .iter()
                .map(|p| (p.label.clone(), p.param_type.clone()))
                .collect(),
            inputs: record.inputs.clone(),
            outputs: record.outputs.clone(),
            module_dependencies: record
                .module_dependencies
                .iter()
                .map(|(module, dep)| (module.clone(), dep.sources().into_iter().cloned().collect()))
                .collect(),
            origin: record.origin.clone(),
        }
    }

    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p.port_label == port)
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p.port_label == port)
    }
}

/// Name-keyed table of templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Arc<NodeTemplate>>,
}

impl TemplateRegistry {
    /// Build the registry from feed records. A name declared twice is an error.
    pub fn load(records: &[TemplateRecord]) -> Result<Self> {
        let mut templates = IndexMap::with_capacity(records.len());
        for record in records {
            if templates.contains_key(&record.name) {
                return Err(Error::DuplicateTemplate(record.name.clone()));
            }
            templates.insert(
                record.name.clone(),
                Arc::new(NodeTemplate::from_record(record)),
            );
        }
        tracing::debug!(count = templates.len(), "loaded node templates");
        Ok(Self { templates })
    }

    pub fn get(&self, name: &str) -> Result<&Arc<NodeTemplate>> {
        self.templates
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Fresh node instance of the named template.
    pub fn clone_node(&self, name: &str) -> Result<Node> {
        self.get(name).map(|t| Node::from_template(Arc::clone(t)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<NodeTemplate>> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TemplateFeed;

    fn feed() -> Vec<TemplateRecord> {
        let json = r#"[
            {
                "name": "Split train test",
                "parameters": [
                    {"label": "description", "type": "description"},
                    {"label": "train_percentage", "type": "number"}
                ],
                "inputs": [{"port_label": "features", "port_type": "DataFrame"}],
                "outputs": [{"port_label": "features_train", "port_type": "DataFrame"}],
                "module_dependencies": {
                    "model_training": {"splitter": {"tag": "literal", "value": "TrainTestSplitter"}}
                },
                "origin": {"literal": "TrainTestSplitter"}
            },
            {"name": "Output", "parameters": [{"label": "key", "type": "description"}], "origin": {"literal": ""}}
        ]"#;
        serde_json::from_str::<TemplateFeed>(json)
            .unwrap()
            .into_records()
    }

    #[test]
    fn test_load_and_get() {
        let registry = TemplateRegistry::load(&feed()).unwrap();
        assert_eq!(registry.len(), 2);
        let t = registry.get("Split train test").unwrap();
        assert_eq!(t.params.len(), 2);
        assert!(t.has_input("features"));
        assert!(t.has_output("features_train"));
        assert!(!t.has_output("nope"));
    }

    #[test]
    fn test_template_equality_covers_ports() {
        let records = feed();
        let a = NodeTemplate::from_record(&records[0]);
        assert_eq!(a, NodeTemplate::from_record(&records[0]));

        let mut renamed = records[0].clone();
        renamed.outputs[0].port_label = "features_test".to_string();
        assert_ne!(a, NodeTemplate::from_record(&renamed));
    }

    #[test]
    fn test_get_missing() {
        let registry = TemplateRegistry::load(&feed()).unwrap();
        let err = registry.get("Ghost").unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(ref n) if n == "Ghost"));
    }

    #[test]
    fn test_duplicate_template() {
        let mut records = feed();
        records.push(records[0].clone());
        let err = TemplateRegistry::load(&records).unwrap_err();
        assert!(err.to_string().contains("Split train test"));
    }

    #[test]
    fn test_clone_shares_template_not_state() {
        let registry = TemplateRegistry::load(&feed()).unwrap();
        let mut a = registry.clone_node("Split train test").unwrap();
        let b = registry.clone_node("Split train test").unwrap();

        a.params
            .get_mut("train_percentage")
            .unwrap()
            .value = serde_json::json!("0.3");

        assert!(b.params["train_percentage"].value.is_null());
        let (ta, tb) = (a.template.unwrap(), b.template.unwrap());
        assert!(Arc::ptr_eq(&ta, &tb));
    }
}
