//! Wire types for the template feed, the normalized graph and generator
//! configuration, plus the resolved parameter record shared by nodes.
//!
//! Everything that arrives from the editor derives `Deserialize`; field
//! aliases keep older editor exports loadable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// Parameter types
// ============================================================================

/// Declared type tag of a node parameter.
///
/// Tags the renderer does not know are kept as `Unknown` so the loader can
/// accept any graph; rendering such a parameter is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    String,
    Option,
    OptionOfOptions,
    Number,
    Boolean,
    List,
    Map,
    /// Free text shown in the editor; never rendered as an argument.
    Description,
    Unknown(String),
}

impl From<String> for ParamType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "string" => Self::String,
            "option" => Self::Option,
            "option_of_options" => Self::OptionOfOptions,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "list" => Self::List,
            "map" => Self::Map,
            "description" => Self::Description,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<ParamType> for String {
    fn from(ty: ParamType) -> Self {
        ty.to_string()
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Option => write!(f, "option"),
            Self::OptionOfOptions => write!(f, "option_of_options"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::List => write!(f, "list"),
            Self::Map => write!(f, "map"),
            Self::Description => write!(f, "description"),
            Self::Unknown(tag) => write!(f, "{}", tag),
        }
    }
}

/// A resolved parameter on a node instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Authored value (`Null` when neither template nor instance set one)
    pub value: Value,

    /// Declared type tag
    pub param_type: ParamType,

    /// Parameter-loader label when the value is supplied at run time
    pub indirection: Option<String>,
}

impl Param {
    /// An unset parameter as declared by a template.
    pub fn declared(param_type: ParamType) -> Self {
        Self {
            value: Value::Null,
            param_type,
            indirection: None,
        }
    }

    pub fn is_indirected(&self) -> bool {
        self.indirection.is_some()
    }
}

// ============================================================================
// Template feed
// ============================================================================

/// The template feed: either a bare list or the editor's `{nodes: [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplateFeed {
    List(Vec<TemplateRecord>),
    Wrapped { nodes: Vec<TemplateRecord> },
}

impl TemplateFeed {
    pub fn into_records(self) -> Vec<TemplateRecord> {
        match self {
            Self::List(records) | Self::Wrapped { nodes: records } => records,
        }
    }
}

/// One node prototype as served by the editor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    #[serde(alias = "node")]
    pub name: String,

    #[serde(default, alias = "params")]
    pub parameters: Vec<ParamDecl>,

    #[serde(default)]
    pub inputs: Vec<PortDecl>,

    #[serde(default)]
    pub outputs: Vec<PortDecl>,

    /// module → symbols to import when a node of this kind is emitted
    #[serde(default, alias = "dependencies")]
    pub module_dependencies: IndexMap<String, ModuleDependency>,

    #[serde(default)]
    pub origin: Option<Origin>,
}

/// Parameter declaration on a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    #[serde(alias = "param_label")]
    pub label: String,

    #[serde(rename = "type", alias = "param_type")]
    pub param_type: ParamType,
}

/// Port declaration on a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    pub port_label: String,

    #[serde(default)]
    pub port_type: String,
}

/// How a node's generated callee name is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Fixed callee name
    #[serde(alias = "custom")]
    Literal(String),
    /// Callee name is the value of the named parameter
    Parameter(String),
}

/// Where an imported symbol name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolTag {
    #[serde(alias = "custom")]
    Literal,
    Parameter,
}

/// One import symbol: a literal name, or the name of a parameter whose value
/// is the symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSource {
    #[serde(alias = "origin")]
    pub tag: SymbolTag,
    pub value: String,
}

/// Symbols imported from one module. Older feeds carry a single symbol per
/// module instead of a keyed table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleDependency {
    Symbols(IndexMap<String, SymbolSource>),
    Single(SymbolSource),
}

impl ModuleDependency {
    pub fn sources(&self) -> Vec<&SymbolSource> {
        match self {
            Self::Symbols(table) => table.values().collect(),
            Self::Single(source) => vec![source],
        }
    }
}

// ============================================================================
// Normalized graph
// ============================================================================

/// The normalized graph: step id → step record, including `root`.
pub type GraphDocument = IndexMap<String, StepRecord>;

/// Nodes and connections authored inside one step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,

    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

/// One node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,

    #[serde(alias = "nodeName")]
    pub kind: String,

    #[serde(default)]
    pub params: IndexMap<String, ParamRecord>,
}

/// Authored parameter value on a node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamRecord {
    #[serde(default)]
    pub value: Value,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indirection: Option<IndirectionRecord>,

    /// Legacy spelling: `"parameter"` marks an indirected value
    #[serde(default, rename = "isParam", skip_serializing_if = "Option::is_none")]
    pub is_param: Option<String>,

    /// Legacy spelling of the loader label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_label: Option<String>,
}

/// `indirection: true` or `indirection: {label: "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndirectionRecord {
    Flag(bool),
    Named { label: String },
}

impl ParamRecord {
    /// Resolve the parameter-loader label, if this value is indirected.
    /// Falls back to the parameter's own label.
    pub fn indirection_label(&self, own_label: &str) -> Option<String> {
        let legacy_label = self
            .param_label
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(own_label);
        match &self.indirection {
            Some(IndirectionRecord::Flag(true)) => Some(own_label.to_string()),
            Some(IndirectionRecord::Named { label }) => Some(label.clone()),
            Some(IndirectionRecord::Flag(false)) => None,
            None if self.is_param.as_deref() == Some("parameter") => {
                Some(legacy_label.to_string())
            }
            None => None,
        }
    }

    pub fn to_param(&self, own_label: &str) -> Param {
        Param {
            value: self.value.clone(),
            param_type: self.param_type.clone(),
            indirection: self.indirection_label(own_label),
        }
    }
}

/// A directed edge between two nodes of the same step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub source: String,
    pub target: String,

    #[serde(rename = "sourceOutput")]
    pub source_output: String,

    #[serde(rename = "targetInput")]
    pub target_input: String,
}

// ============================================================================
// Generator configuration
// ============================================================================

/// Call shapes into the runtime library and text layout knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Import root of the runtime library
    pub library: String,

    /// Module that provides the orchestration primitives
    pub orchestration_module: String,

    /// Orchestrator class every generated module instantiates
    pub orchestrator_class: String,

    /// Base class of generated step classes
    pub step_class: String,

    /// Symbol of the run-time parameter loader
    pub param_loader: String,

    /// Indentation unit
    pub indent: String,

    /// Widest call rendered on a single line
    pub line_width: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            library: "mls_lib".to_string(),
            orchestration_module: "orchestration".to_string(),
            orchestrator_class: "Orchestrator".to_string(),
            step_class: "Step".to_string(),
            param_loader: "ParamLoader".to_string(),
            indent: "    ".to_string(),
            line_width: 88,
        }
    }
}

// ============================================================================
// Value helper
// ============================================================================

/// Stringify a JSON value the way it appears inside generated literals.
pub fn json_value_to_string(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
