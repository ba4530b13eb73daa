//! Pipeline graph model: nodes, steps and the pipeline that owns them.
//!
//! Edges are stored as indices into the owning step's node list: connections
//! never cross step boundaries. Inter-step wiring lives on the proxy nodes of
//! the reserved `root` step and uses the same edge and readiness machinery.

use super::error::{Error, Result};
use super::registry::NodeTemplate;
use super::types::{
    json_value_to_string, ConnectionRecord, NodeRecord, Origin, Param, ParamType, SymbolTag,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Id of the step whose nodes stand for the pipeline's real steps.
pub const ROOT_STEP: &str = "root";

/// Position of a node inside its step.
pub type NodeIdx = usize;

/// What a node means to the generator, derived from its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Step input boundary; its value comes from another step
    Input,
    /// Step output boundary; exposes a producer's port under a key
    Output,
    /// Legacy parameter holder; dropped from generation
    Parameter,
    /// Anything that becomes a call
    Operation,
}

impl NodeRole {
    pub fn of_kind(kind: &str) -> Self {
        match kind {
            "Input" => Self::Input,
            "Output" => Self::Output,
            "Parameter" => Self::Parameter,
            _ => Self::Operation,
        }
    }

    pub fn is_boundary(self) -> bool {
        matches!(self, Self::Input | Self::Output)
    }
}

/// Incoming edge: `source.source_port → self.target_port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub source: NodeIdx,
    pub source_port: String,
    pub target_port: String,
}

/// Outgoing edge endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub node: NodeIdx,
    pub port: String,
}

/// A step output another step consumes: `(step id, output key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    pub step: String,
    pub key: String,
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step, self.key)
    }
}

// ============================================================================
// Node
// ============================================================================

/// One operation instance inside a step.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,

    /// Template name (`nodeName` in editor exports)
    pub kind: String,

    /// `None` for stub nodes whose kind has no template
    pub template: Option<Arc<NodeTemplate>>,

    /// Resolved parameters, template declaration order first
    pub params: IndexMap<String, Param>,

    pub dependencies: Vec<Dependency>,

    /// Index-aligned with `dependencies`
    pub ready: Vec<bool>,

    /// Outgoing edges per source port
    pub sources: IndexMap<String, Vec<Target>>,

    /// Callee name in generated code
    pub origin_label: String,

    /// Assigned during emission
    pub variable_name: Option<String>,

    /// Owning step id, attached once loading completes
    pub step: Option<String>,

    /// The authored record, kept so a step can read its proxy's data
    pub record: Option<NodeRecord>,
}

impl Node {
    /// Placeholder for a kind with no template.
    pub fn stub(kind: &str) -> Self {
        Self {
            id: String::new(),
            kind: kind.to_string(),
            template: None,
            params: IndexMap::new(),
            dependencies: Vec::new(),
            ready: Vec::new(),
            sources: IndexMap::new(),
            origin_label: String::new(),
            variable_name: None,
            step: None,
            record: None,
        }
    }

    pub fn from_template(template: Arc<NodeTemplate>) -> Self {
        let mut node = Self::stub(&template.name);
        node.params = template
            .params
            .iter()
            .map(|(label, ty)| (label.clone(), Param::declared(ty.clone())))
            .collect();
        node.template = Some(template);
        node
    }

    /// Apply an authored instance on top of the template defaults.
    pub fn apply_record(&mut self, record: &NodeRecord) {
        self.id.clone_from(&record.id);
        if self.template.is_none() {
            self.kind.clone_from(&record.kind);
        }
        for (label, param) in &record.params {
            self.params.insert(label.clone(), param.to_param(label));
        }
        self.origin_label = match self.origin() {
            Some(Origin::Literal(name)) => name.clone(),
            Some(Origin::Parameter(label)) => self
                .get_param(label)
                .map(json_value_to_string)
                .unwrap_or_default(),
            None => String::new(),
        };
        self.record = Some(record.clone());
    }

    pub fn role(&self) -> NodeRole {
        NodeRole::of_kind(&self.kind)
    }

    pub fn is_stub(&self) -> bool {
        self.template.is_none()
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.template.as_ref().and_then(|t| t.origin.as_ref())
    }

    pub fn add_dependency(&mut self, source: NodeIdx, source_port: &str, target_port: &str) {
        self.dependencies.push(Dependency {
            source,
            source_port: source_port.to_string(),
            target_port: target_port.to_string(),
        });
        self.ready.push(false);
    }

    pub fn add_source(&mut self, port: &str, target: NodeIdx, target_port: &str) {
        self.sources.entry(port.to_string()).or_default().push(Target {
            node: target,
            port: target_port.to_string(),
        });
    }

    pub fn is_ready(&self) -> bool {
        self.ready.iter().all(|r| *r)
    }

    /// Mark the first pending incoming edge matching `source.source_port →
    /// target_port` as satisfied. Returns whether one was found.
    pub fn mark_ready(&mut self, source: NodeIdx, source_port: &str, target_port: &str) -> bool {
        let slot = self.dependencies.iter().enumerate().position(|(i, d)| {
            !self.ready[i]
                && d.source == source
                && d.source_port == source_port
                && d.target_port == target_port
        });
        match slot {
            Some(i) => {
                self.ready[i] = true;
                true
            }
            None => false,
        }
    }

    /// Producer of the named input port.
    pub fn input_source(&self, port: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.target_port == port)
    }

    /// The port, if the template declares it as an output.
    pub fn get_output<'a>(&self, port: &'a str) -> Option<&'a str> {
        self.template
            .as_ref()
            .filter(|t| t.has_output(port))
            .map(|_| port)
    }

    pub fn get_param(&self, label: &str) -> Option<&Value> {
        self.params.get(label).map(|p| &p.value)
    }

    pub fn get_param_type(&self, label: &str) -> Option<&ParamType> {
        self.params.get(label).map(|p| &p.param_type)
    }

    /// String value of a parameter, empty when unset.
    pub fn param_string(&self, label: &str) -> String {
        self.get_param(label)
            .map(json_value_to_string)
            .unwrap_or_default()
    }

    /// Boundary key of an Input/Output node.
    pub fn key(&self) -> Option<String> {
        self.get_param("key")
            .map(json_value_to_string)
            .filter(|k| !k.is_empty())
    }

    /// Non-empty authored description.
    pub fn description(&self) -> Option<String> {
        self.get_param("description")
            .map(json_value_to_string)
            .filter(|d| !d.is_empty())
    }

    /// Whether more than one edge leaves the given port.
    pub fn port_is_multiple(&self, port: &str) -> bool {
        self.sources.get(port).is_some_and(|t| t.len() > 1)
    }

    pub fn indirect_param_count(&self) -> usize {
        self.params.values().filter(|p| p.is_indirected()).count()
    }

    /// Import contribution: module → symbols, with parameter-tagged symbols
    /// resolved against this node's current values.
    pub fn module_symbols(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let Some(template) = &self.template else {
            return out;
        };
        for (module, sources) in &template.module_dependencies {
            for source in sources {
                let symbol = match source.tag {
                    SymbolTag::Literal => source.value.clone(),
                    SymbolTag::Parameter => self.param_string(&source.value),
                };
                if symbol.is_empty() {
                    tracing::warn!(
                        node = %self.id,
                        module = %module,
                        param = %source.value,
                        "import symbol resolved to an empty name, skipping"
                    );
                    continue;
                }
                out.entry(module.clone()).or_default().insert(symbol);
            }
        }
        out
    }

    /// Drop every parameter except `key`.
    pub fn strip_to_key(&mut self) {
        self.params.retain(|label, _| label == "key");
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

// ============================================================================
// Step
// ============================================================================

/// A named unit of the pipeline; compiles to one generated module.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub nodes: Vec<Node>,

    /// Display name as authored
    pub original_name: String,

    /// snake_case, used for module names and parameter addresses
    pub name: String,

    /// PascalCase class name
    pub class_name: String,

    /// Output key → Output node
    pub outputs: IndexMap<String, NodeIdx>,

    /// Input key → producing step output
    pub inputs: IndexMap<String, OutputRef>,
}

impl Step {
    pub fn new(id: &str) -> Self {
        let mut step = Self {
            id: id.to_string(),
            nodes: Vec::new(),
            original_name: String::new(),
            name: String::new(),
            class_name: String::new(),
            outputs: IndexMap::new(),
            inputs: IndexMap::new(),
        };
        step.set_names(id);
        step
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_STEP
    }

    pub fn position(&self, node_id: &str) -> Option<NodeIdx> {
        self.nodes.iter().position(|n| n.id == node_id)
    }

    pub fn get_node(&self, node_id: &str) -> Result<&Node> {
        self.position(node_id)
            .map(|i| &self.nodes[i])
            .ok_or_else(|| Error::NodeNotFound(node_id.to_string()))
    }

    pub fn add_node(&mut self, node: Node) -> Result<NodeIdx> {
        if self.position(&node.id).is_some() {
            return Err(Error::DuplicateNode {
                step: self.id.clone(),
                id: node.id,
            });
        }
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    /// Record an edge between two nodes of this step.
    pub fn add_connection(&mut self, conn: &ConnectionRecord) -> Result<()> {
        let unresolved = |node: &str, end| Error::UnresolvedConnection {
            step: self.id.clone(),
            node: node.to_string(),
            end,
        };
        let target = self
            .position(&conn.target)
            .ok_or_else(|| unresolved(&conn.target, "target"))?;
        let source = self
            .position(&conn.source)
            .ok_or_else(|| unresolved(&conn.source, "source"))?;

        self.nodes[target].add_dependency(source, &conn.source_output, &conn.target_input);
        self.nodes[source].add_source(&conn.source_output, target, &conn.target_input);
        Ok(())
    }

    /// Take display and class names from the proxy node's authored data.
    pub fn set_data(&mut self, data: &NodeRecord) {
        let authored = data.params.get("description").or_else(|| {
            data.params
                .values()
                .find(|p| p.param_type == ParamType::Description)
        });
        let display = authored
            .map(|p| json_value_to_string(&p.value))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.id.clone());
        self.set_names(&display);
    }

    fn set_names(&mut self, display: &str) {
        let spaced = display.replace('-', " ");
        let words: Vec<&str> = spaced.split_whitespace().collect();
        self.original_name = display.to_string();
        self.name = words
            .iter()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("_");
        self.class_name = words.iter().map(|w| capitalize(w)).collect();
        // module and class names must be identifiers; editor ids are hex
        if self.name.starts_with(|c: char| c.is_ascii_digit()) {
            self.name = format!("step_{}", self.name);
            self.class_name = format!("Step{}", self.class_name);
        }
    }

    /// Route a step input to another step's output. The matching Input node
    /// keeps only its key. Returns whether such an Input node exists.
    pub fn set_input_origin(&mut self, key: &str, origin: OutputRef) -> bool {
        let found = self
            .nodes
            .iter_mut()
            .find(|n| n.role() == NodeRole::Input && n.param_string("key") == key);
        let Some(node) = found else {
            return false;
        };
        node.strip_to_key();
        self.inputs.insert(key.to_string(), origin);
        true
    }

    /// Whether the producer feeding `port` of node `idx` fans out.
    pub fn is_output_multiple(&self, idx: NodeIdx, port: &str) -> Option<bool> {
        let dep = self.nodes.get(idx)?.input_source(port)?;
        Some(self.nodes[dep.source].port_is_multiple(&dep.source_port))
    }

    /// Mark every edge leaving `idx` as satisfied on its target.
    pub fn propagate_from(&mut self, idx: NodeIdx) {
        let edges: Vec<(String, Target)> = self.nodes[idx]
            .sources
            .iter()
            .flat_map(|(port, targets)| targets.iter().map(move |t| (port.clone(), t.clone())))
            .collect();
        for (port, target) in edges {
            self.nodes[target.node].mark_ready(idx, &port, &target.port);
        }
    }
}

/// Upper-case the first character, lower-case the rest.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Where a node lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocation {
    pub step: String,
    pub index: NodeIdx,
}

/// All steps of a pipeline plus a global node index.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub steps: IndexMap<String, Step>,
    pub nodes: IndexMap<String, NodeLocation>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Empty pipeline holding only the root step.
    pub fn new() -> Self {
        let mut steps = IndexMap::new();
        steps.insert(ROOT_STEP.to_string(), Step::new(ROOT_STEP));
        Self {
            steps,
            nodes: IndexMap::new(),
        }
    }

    pub fn get_step(&self, id: &str) -> Result<&Step> {
        self.steps
            .get(id)
            .ok_or_else(|| Error::StepNotFound(id.to_string()))
    }

    pub fn get_step_mut(&mut self, id: &str) -> Result<&mut Step> {
        self.steps
            .get_mut(id)
            .ok_or_else(|| Error::StepNotFound(id.to_string()))
    }

    pub fn get_node(&self, id: &str) -> Result<&Node> {
        let loc = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        Ok(&self.get_step(&loc.step)?.nodes[loc.index])
    }

    pub fn root(&self) -> &Step {
        &self.steps[ROOT_STEP]
    }

    /// Ids of the real steps, in root proxy order.
    pub fn step_ids(&self) -> Vec<String> {
        self.root().nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Insert a node into a step and the global index.
    pub fn add_node(&mut self, step_id: &str, node: Node) -> Result<NodeIdx> {
        if self.nodes.contains_key(&node.id) {
            return Err(Error::DuplicateNode {
                step: step_id.to_string(),
                id: node.id,
            });
        }
        let id = node.id.clone();
        let index = self.get_step_mut(step_id)?.add_node(node)?;
        self.nodes.insert(
            id,
            NodeLocation {
                step: step_id.to_string(),
                index,
            },
        );
        Ok(index)
    }
}
